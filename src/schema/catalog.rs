use std::collections::HashMap;
use std::sync::Arc;
use crate::core::{EntityTypeId, FixtureError, Result};
use super::EntityDescriptor;

/// Catalog holds the entity descriptors of one schema.
/// Immutable once built: cloning is cheap and needs no locks.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Copy-on-Write: registering a type builds a new map.
    entities: Arc<HashMap<EntityTypeId, Arc<EntityDescriptor>>>,
    /// Registration order, used for deterministic tie-breaking.
    order: Arc<Vec<EntityTypeId>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            entities: Arc::new(HashMap::new()),
            order: Arc::new(Vec::new()),
        }
    }

    /// Build a catalog from descriptors in registration order and run
    /// the cross-type checks.
    pub fn from_descriptors<I>(descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = EntityDescriptor>,
    {
        let mut catalog = Self::new();
        for descriptor in descriptors {
            catalog = catalog.with_entity(descriptor)?;
        }
        catalog.validate()?;
        Ok(catalog)
    }

    /// Add an entity type - returns a NEW Catalog, the old one is untouched.
    pub fn with_entity(self, descriptor: EntityDescriptor) -> Result<Self> {
        descriptor.validate()?;
        let id = descriptor.id().clone();

        if self.entities.contains_key(&id) {
            return Err(FixtureError::SchemaError(format!(
                "Entity type '{}' already registered",
                id
            )));
        }

        let mut entities = (*self.entities).clone();
        entities.insert(id.clone(), Arc::new(descriptor));
        let mut order = (*self.order).clone();
        order.push(id);

        Ok(Self {
            entities: Arc::new(entities),
            order: Arc::new(order),
        })
    }

    /// Checks that span several entity types: foreign key and navigation
    /// targets exist, foreign key arity matches the target's primary key.
    pub fn validate(&self) -> Result<()> {
        for id in self.order.iter() {
            let descriptor = self.get(id)?;

            for fk in descriptor.foreign_keys() {
                let target = self.entities.get(&fk.references).ok_or_else(|| {
                    FixtureError::SchemaError(format!(
                        "Entity '{}' references unknown entity type '{}'",
                        id, fk.references
                    ))
                })?;
                if target.key_fields().len() != fk.fields.len() {
                    return Err(FixtureError::SchemaError(format!(
                        "Foreign key {:?} on '{}' has {} field(s) but '{}' has a {}-part primary key",
                        fk.fields,
                        id,
                        fk.fields.len(),
                        fk.references,
                        target.key_fields().len()
                    )));
                }
            }

            for navigation in descriptor.navigations() {
                if !self.entities.contains_key(&navigation.target) {
                    return Err(FixtureError::SchemaError(format!(
                        "Navigation '{}.{}' targets unknown entity type '{}'",
                        id, navigation.name, navigation.target
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &EntityTypeId) -> Result<&EntityDescriptor> {
        self.entities
            .get(id)
            .map(|d| d.as_ref())
            .ok_or_else(|| FixtureError::UnknownEntityType(id.clone()))
    }

    pub fn contains(&self, id: &EntityTypeId) -> bool {
        self.entities.contains_key(id)
    }

    /// Entity types in registration order.
    pub fn entity_types(&self) -> &[EntityTypeId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
