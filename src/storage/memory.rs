use super::{Repository, Table};
use crate::core::{Entity, EntityTypeId, FixtureError, KeyTuple, Result};
use crate::schema::{Catalog, EntityDescriptor};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
enum PendingChange {
    Insert(Entity),
    Update(Entity),
}

/// In-memory repository enforcing primary key uniqueness and foreign keys.
///
/// Changes are staged by `add`/`update` and applied by `save` only after
/// every staged change has been validated, so a failed save leaves the
/// committed tables untouched.
#[derive(Debug)]
pub struct InMemoryRepository {
    catalog: Catalog,
    tables: HashMap<EntityTypeId, Table>,
    pending: Vec<PendingChange>,
    /// Tables as they were when the open batch started.
    batch_snapshot: Option<HashMap<EntityTypeId, Table>>,
}

impl InMemoryRepository {
    pub fn new(catalog: Catalog) -> Self {
        let mut tables = HashMap::with_capacity(catalog.len());
        for id in catalog.entity_types() {
            if let Ok(descriptor) = catalog.get(id) {
                tables.insert(id.clone(), Table::new(descriptor.clone()));
            }
        }

        Self {
            catalog,
            tables,
            pending: Vec::new(),
            batch_snapshot: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn in_batch(&self) -> bool {
        self.batch_snapshot.is_some()
    }

    fn table(&self, entity_type: &EntityTypeId) -> Result<&Table> {
        self.tables
            .get(entity_type)
            .ok_or_else(|| FixtureError::UnknownEntityType(entity_type.clone()))
    }

    fn table_mut(&mut self, entity_type: &EntityTypeId) -> Result<&mut Table> {
        self.tables
            .get_mut(entity_type)
            .ok_or_else(|| FixtureError::UnknownEntityType(entity_type.clone()))
    }

    fn key_exists(
        &self,
        entity_type: &EntityTypeId,
        key: &KeyTuple,
        staged: &HashMap<EntityTypeId, HashSet<KeyTuple>>,
    ) -> Result<bool> {
        if self.table(entity_type)?.contains_key(key) {
            return Ok(true);
        }
        Ok(staged.get(entity_type).is_some_and(|keys| keys.contains(key)))
    }

    fn check_foreign_keys(
        &self,
        descriptor: &EntityDescriptor,
        entity: &Entity,
        staged: &HashMap<EntityTypeId, HashSet<KeyTuple>>,
    ) -> Result<()> {
        for fk in descriptor.foreign_keys() {
            let parent = self.table(&fk.references)?;
            let reference = parent.schema().coerce_key(&entity.project(&fk.fields));
            // NULL references are not checked.
            if reference.has_null() {
                continue;
            }
            if !self.key_exists(&fk.references, &reference, staged)? {
                return Err(FixtureError::ConstraintViolation(format!(
                    "Foreign key {:?} on '{}' references non-existent key {} in '{}'",
                    fk.fields,
                    descriptor.id(),
                    reference,
                    fk.references
                )));
            }
        }
        Ok(())
    }

    /// Validate every staged change against committed rows plus the
    /// changes staged before it.
    fn validate_pending(&self, pending: &[PendingChange]) -> Result<()> {
        let mut staged: HashMap<EntityTypeId, HashSet<KeyTuple>> = HashMap::new();

        for change in pending {
            match change {
                PendingChange::Insert(entity) => {
                    let table = self.table(entity.entity_type())?;
                    let key = table.validate_row(entity)?;
                    if self.key_exists(entity.entity_type(), &key, &staged)? {
                        return Err(table.duplicate_key(&key));
                    }
                    self.check_foreign_keys(table.schema(), entity, &staged)?;
                    staged
                        .entry(entity.entity_type().clone())
                        .or_default()
                        .insert(key);
                }
                PendingChange::Update(entity) => {
                    let table = self.table(entity.entity_type())?;
                    let key = table.validate_row(entity)?;
                    if !self.key_exists(entity.entity_type(), &key, &staged)? {
                        return Err(FixtureError::ConstraintViolation(format!(
                            "Cannot update '{}': no row with key {}",
                            entity.entity_type(),
                            key
                        )));
                    }
                    self.check_foreign_keys(table.schema(), entity, &staged)?;
                }
            }
        }
        Ok(())
    }
}

impl Repository for InMemoryRepository {
    fn find(&self, entity_type: &EntityTypeId, key: &KeyTuple) -> Result<Option<Entity>> {
        Ok(self.table(entity_type)?.get(key).cloned())
    }

    fn add(&mut self, mut entity: Entity) -> Result<()> {
        self.table(entity.entity_type())?.schema().coerce_entity(&mut entity);
        self.pending.push(PendingChange::Insert(entity));
        Ok(())
    }

    fn update(&mut self, mut entity: Entity) -> Result<()> {
        self.table(entity.entity_type())?.schema().coerce_entity(&mut entity);
        self.pending.push(PendingChange::Update(entity));
        Ok(())
    }

    fn save(&mut self) -> Result<usize> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(0);
        }

        self.validate_pending(&pending)?;

        let applied = pending.len();
        for change in pending {
            match change {
                PendingChange::Insert(entity) => {
                    let table = self.table_mut(entity.entity_type())?;
                    table.insert(entity)?;
                }
                PendingChange::Update(entity) => {
                    let table = self.table_mut(entity.entity_type())?;
                    table.update(entity)?;
                }
            }
        }

        trace!("Committed {} staged change(s)", applied);
        Ok(applied)
    }

    fn discard_pending(&mut self) {
        self.pending.clear();
    }

    fn keys(&self, entity_type: &EntityTypeId) -> Result<Vec<KeyTuple>> {
        Ok(self.table(entity_type)?.keys())
    }

    fn rows(&self, entity_type: &EntityTypeId) -> Result<Vec<Entity>> {
        Ok(self.table(entity_type)?.scan())
    }

    fn row_count(&self, entity_type: &EntityTypeId) -> Result<usize> {
        Ok(self.table(entity_type)?.row_count())
    }

    fn begin_batch(&mut self) -> Result<()> {
        if self.batch_snapshot.is_some() {
            return Err(FixtureError::UnsupportedOperation(
                "nested batches are not supported".into(),
            ));
        }
        debug!("Opening batch over {} table(s)", self.tables.len());
        self.batch_snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<()> {
        if self.batch_snapshot.take().is_none() {
            return Err(FixtureError::UnsupportedOperation("no open batch to commit".into()));
        }
        Ok(())
    }

    fn rollback_batch(&mut self) -> Result<()> {
        let snapshot = self.batch_snapshot.take().ok_or_else(|| {
            FixtureError::UnsupportedOperation("no open batch to roll back".into())
        })?;
        debug!("Rolling back batch");
        self.tables = snapshot;
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::schema::{FieldDef, ForeignKey};

    fn catalog() -> Catalog {
        Catalog::from_descriptors([
            EntityDescriptor::new("users")
                .field(FieldDef::new("id", DataType::Integer).not_null())
                .field(FieldDef::new("name", DataType::Text))
                .primary_key(["id"]),
            EntityDescriptor::new("posts")
                .field(FieldDef::new("id", DataType::Integer).not_null())
                .field(FieldDef::new("user_id", DataType::Integer))
                .primary_key(["id"])
                .foreign_key(ForeignKey::single("user_id", "users")),
        ])
        .unwrap()
    }

    fn row(repo: &InMemoryRepository, ty: &str, values: &[(&str, i64)]) -> Entity {
        let mut entity = repo.catalog().get(&ty.into()).unwrap().blank();
        for (field, value) in values {
            entity.set(field, *value);
        }
        entity
    }

    #[test]
    fn save_commits_staged_rows() {
        let mut repo = InMemoryRepository::new(catalog());
        repo.add(row(&repo, "users", &[("id", 1)])).unwrap();
        assert_eq!(repo.row_count(&"users".into()).unwrap(), 0);
        assert!(repo.find(&"users".into(), &KeyTuple::single(1i64)).unwrap().is_none());

        assert_eq!(repo.save().unwrap(), 1);
        assert_eq!(repo.row_count(&"users".into()).unwrap(), 1);
        assert!(repo.find(&"users".into(), &KeyTuple::single(1i64)).unwrap().is_some());
    }

    #[test]
    fn foreign_key_must_resolve() {
        let mut repo = InMemoryRepository::new(catalog());
        repo.add(row(&repo, "users", &[("id", 1)])).unwrap();
        repo.add(row(&repo, "posts", &[("id", 100), ("user_id", 1)])).unwrap();
        repo.save().unwrap();

        repo.add(row(&repo, "posts", &[("id", 102), ("user_id", 999)])).unwrap();
        match repo.save() {
            Err(FixtureError::ConstraintViolation(msg)) => {
                assert!(msg.contains("references non-existent key"));
            }
            other => panic!("Expected ConstraintViolation, got {:?}", other),
        }
        assert_eq!(repo.row_count(&"posts".into()).unwrap(), 1);
        assert_eq!(repo.pending_count(), 0);
    }

    #[test]
    fn null_foreign_key_skips_check() {
        let mut repo = InMemoryRepository::new(catalog());
        repo.add(row(&repo, "posts", &[("id", 1)])).unwrap();
        repo.save().unwrap();
        assert_eq!(repo.row_count(&"posts".into()).unwrap(), 1);
    }

    #[test]
    fn failed_save_applies_nothing() {
        let mut repo = InMemoryRepository::new(catalog());
        repo.add(row(&repo, "users", &[("id", 1)])).unwrap();
        repo.add(row(&repo, "users", &[("id", 1)])).unwrap();

        assert!(repo.save().is_err());
        assert_eq!(repo.row_count(&"users".into()).unwrap(), 0);
    }

    #[test]
    fn update_requires_existing_row() {
        let mut repo = InMemoryRepository::new(catalog());
        repo.update(row(&repo, "users", &[("id", 5)])).unwrap();
        let err = repo.save().unwrap_err();
        assert!(err.to_string().contains("no row with key (5)"));
    }

    #[test]
    fn rollback_restores_tables() {
        let mut repo = InMemoryRepository::new(catalog());
        repo.add(row(&repo, "users", &[("id", 1)])).unwrap();
        repo.save().unwrap();

        repo.begin_batch().unwrap();
        assert!(repo.begin_batch().is_err());
        repo.add(row(&repo, "users", &[("id", 2)])).unwrap();
        repo.save().unwrap();
        assert_eq!(repo.row_count(&"users".into()).unwrap(), 2);

        repo.rollback_batch().unwrap();
        assert_eq!(repo.row_count(&"users".into()).unwrap(), 1);
        assert!(!repo.in_batch());
        assert!(repo.commit_batch().is_err());
    }

    #[test]
    fn unknown_type_is_reported() {
        let repo = InMemoryRepository::new(catalog());
        assert!(matches!(
            repo.row_count(&"ghost".into()),
            Err(FixtureError::UnknownEntityType(_))
        ));
    }

    #[test]
    fn float_keys_are_unique_by_number() {
        let mut repo = InMemoryRepository::new(
            Catalog::from_descriptors([
                EntityDescriptor::new("readings")
                    .field(FieldDef::new("at", DataType::Float).not_null())
                    .primary_key(["at"]),
                EntityDescriptor::new("notes")
                    .field(FieldDef::new("id", DataType::Integer).not_null())
                    .field(FieldDef::new("reading_at", DataType::Float))
                    .primary_key(["id"])
                    .foreign_key(ForeignKey::single("reading_at", "readings")),
            ])
            .unwrap(),
        );
        repo.add(row(&repo, "readings", &[("at", 1)])).unwrap();
        repo.add(row(&repo, "notes", &[("id", 1), ("reading_at", 1)])).unwrap();
        repo.save().unwrap();

        let mut duplicate = repo.catalog().get(&"readings".into()).unwrap().blank();
        duplicate.set("at", 1.0f64);
        repo.add(duplicate).unwrap();
        let err = repo.save().unwrap_err();
        assert!(err.to_string().contains("Unique constraint violation"));

        assert_eq!(repo.keys(&"readings".into()).unwrap(), vec![KeyTuple::single(1.0f64)]);
        assert!(repo.find(&"readings".into(), &KeyTuple::single(1i64)).unwrap().is_some());
    }
}
