use crate::core::{Entity, FixtureError, KeyTuple, Result};
use crate::schema::EntityDescriptor;
use std::collections::{BTreeMap, HashMap};

/// Committed rows of one entity type.
#[derive(Debug, Clone)]
pub struct Table {
    schema: EntityDescriptor,
    rows: BTreeMap<usize, Entity>,
    next_row_id: usize,
    key_index: HashMap<KeyTuple, usize>,
}

impl Table {
    pub fn new(schema: EntityDescriptor) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 0,
            key_index: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &EntityDescriptor {
        &self.schema
    }

    /// Column checks plus a fully set, NULL-free primary key. The key comes
    /// back in its stored form.
    pub fn validate_row(&self, entity: &Entity) -> Result<KeyTuple> {
        self.schema.validate_entity(entity)?;
        let key = entity.key_tuple(self.schema.key_fields()).ok_or_else(|| {
            FixtureError::ConstraintViolation(format!(
                "Primary key {:?} of '{}' is not fully set",
                self.schema.key_fields(),
                self.schema.id()
            ))
        })?;
        if key.has_null() {
            return Err(FixtureError::ConstraintViolation(format!(
                "Primary key {} of '{}' contains NULL",
                key,
                self.schema.id()
            )));
        }
        Ok(self.schema.coerce_key(&key))
    }

    pub fn insert(&mut self, mut entity: Entity) -> Result<usize> {
        self.schema.coerce_entity(&mut entity);
        let key = self.validate_row(&entity)?;
        if self.key_index.contains_key(&key) {
            return Err(self.duplicate_key(&key));
        }

        let id = self.next_row_id;
        self.next_row_id += 1;

        self.rows.insert(id, entity);
        self.key_index.insert(key, id);

        Ok(id)
    }

    /// Replace the row sharing `entity`'s primary key. Returns false when
    /// there is no such row.
    pub fn update(&mut self, mut entity: Entity) -> Result<bool> {
        self.schema.coerce_entity(&mut entity);
        let key = self.validate_row(&entity)?;
        match self.key_index.get(&key) {
            Some(id) => {
                self.rows.insert(*id, entity);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn get(&self, key: &KeyTuple) -> Option<&Entity> {
        self.key_index
            .get(&self.schema.coerce_key(key))
            .and_then(|id| self.rows.get(id))
    }

    pub fn contains_key(&self, key: &KeyTuple) -> bool {
        self.key_index.contains_key(&self.schema.coerce_key(key))
    }

    pub fn scan(&self) -> Vec<Entity> {
        self.rows.values().cloned().collect()
    }

    pub fn keys(&self) -> Vec<KeyTuple> {
        let key_fields = self.schema.key_fields();
        self.rows.values().map(|row| row.project(key_fields)).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn duplicate_key(&self, key: &KeyTuple) -> FixtureError {
        FixtureError::ConstraintViolation(format!(
            "Unique constraint violation: '{}' already contains key {}",
            self.schema.id(),
            key
        ))
    }
}
