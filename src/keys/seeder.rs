use super::KeyRegistry;
use crate::core::{Entity, EntityTypeId, FixtureError, KeyTuple, Result, Value};
use crate::schema::SchemaModel;
use crate::storage::Repository;
use log::trace;
use rand::Rng;
use rand::rngs::StdRng;
use std::collections::HashSet;

/// Key derivation primitives handed to key assignment rules.
///
/// A seeder borrows the session's registry, repository and RNG for the
/// duration of one rule invocation.
pub struct KeySeeder<'a> {
    registry: &'a mut KeyRegistry,
    repository: &'a dyn Repository,
    schema: &'a dyn SchemaModel,
    rng: &'a mut StdRng,
    attempt_limit: usize,
}

impl<'a> KeySeeder<'a> {
    pub fn new(
        registry: &'a mut KeyRegistry,
        repository: &'a dyn Repository,
        schema: &'a dyn SchemaModel,
        rng: &'a mut StdRng,
        attempt_limit: usize,
    ) -> Self {
        Self {
            registry,
            repository,
            schema,
            rng,
            attempt_limit,
        }
    }

    /// Next value of the per-type counter: the number of keys this session
    /// has handed out for the type, plus one. The value is recorded at once,
    /// so a collision with a pre-existing row still advances the counter.
    pub fn sequential_key(&mut self, entity_type: impl Into<EntityTypeId>) -> i64 {
        let entity_type = entity_type.into();
        let next = self.registry.next_sequence(&entity_type);
        self.registry.record(&entity_type, KeyTuple::single(next));
        trace!("Sequential key {} for '{}'", next, entity_type);
        next
    }

    /// Uniform sample among the keys recorded for `entity_type`.
    pub fn random_existing_key(&mut self, entity_type: impl Into<EntityTypeId>) -> Result<KeyTuple> {
        let entity_type = entity_type.into();
        let keys = self.registry.keys(&entity_type);
        if keys.is_empty() {
            return Err(FixtureError::KeySourceEmpty { entity_type });
        }
        let idx = self.rng.gen_range(0..keys.len());
        Ok(keys[idx].clone())
    }

    /// Most recently recorded key for `entity_type`.
    pub fn latest_key(&self, entity_type: impl Into<EntityTypeId>) -> Result<KeyTuple> {
        let entity_type = entity_type.into();
        self.registry
            .latest(&entity_type)
            .cloned()
            .ok_or(FixtureError::KeySourceEmpty { entity_type })
    }

    /// Pick a combination from `existing_combinations` that no committed row
    /// of `entity_type` uses as its primary key yet.
    pub fn unique_random_key(
        &mut self,
        entity_type: impl Into<EntityTypeId>,
        existing_combinations: &[KeyTuple],
    ) -> Result<KeyTuple> {
        let entity_type = entity_type.into();
        let consumed: HashSet<KeyTuple> = self.repository.keys(&entity_type)?.into_iter().collect();
        self.unique_random_key_excluding(entity_type, existing_combinations, &consumed)
    }

    /// Sample `candidates` until one outside `consumed` turns up, at most
    /// `attempt_limit` times.
    pub fn unique_random_key_excluding(
        &mut self,
        entity_type: impl Into<EntityTypeId>,
        candidates: &[KeyTuple],
        consumed: &HashSet<KeyTuple>,
    ) -> Result<KeyTuple> {
        let entity_type = entity_type.into();
        if candidates.is_empty() {
            return Err(FixtureError::KeySourceEmpty { entity_type });
        }
        if candidates.iter().all(|c| consumed.contains(c)) {
            return Err(FixtureError::KeySpaceExhausted {
                entity_type,
                attempts: 0,
            });
        }

        for attempt in 1..=self.attempt_limit {
            let candidate = &candidates[self.rng.gen_range(0..candidates.len())];
            if !consumed.contains(candidate) {
                trace!(
                    "Unique key {} for '{}' after {} attempt(s)",
                    candidate, entity_type, attempt
                );
                return Ok(candidate.clone());
            }
        }

        Err(FixtureError::KeySpaceExhausted {
            entity_type,
            attempts: self.attempt_limit,
        })
    }

    /// Committed rows of `entity_type` projected onto `fields`, in insertion
    /// order. Typical source of candidates for `unique_random_key`.
    pub fn project(&self, entity_type: impl Into<EntityTypeId>, fields: &[&str]) -> Result<Vec<KeyTuple>> {
        let entity_type = entity_type.into();
        let descriptor = self.schema.descriptor(&entity_type)?;
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        for field in &fields {
            if descriptor.field_def(field).is_none() {
                return Err(FixtureError::UnknownField {
                    entity_type: entity_type.clone(),
                    field: field.clone(),
                });
            }
        }

        Ok(self
            .repository
            .rows(&entity_type)?
            .iter()
            .map(|row| row.project(&fields))
            .collect())
    }

    /// Cross product of the keys recorded for each type, concatenated in the
    /// order the types are given.
    pub fn cross_product(&self, entity_types: &[EntityTypeId]) -> Result<Vec<KeyTuple>> {
        let mut combinations: Vec<Vec<Value>> = vec![Vec::new()];
        for entity_type in entity_types {
            let keys = self.registry.keys(entity_type);
            if keys.is_empty() {
                return Err(FixtureError::KeySourceEmpty {
                    entity_type: entity_type.clone(),
                });
            }
            combinations = combinations
                .iter()
                .flat_map(|prefix| {
                    keys.iter().map(move |key| {
                        let mut combined = prefix.clone();
                        combined.extend(key.values().iter().cloned());
                        combined
                    })
                })
                .collect();
        }
        Ok(combinations.into_iter().map(KeyTuple::new).collect())
    }

    pub fn rows(&self, entity_type: impl Into<EntityTypeId>) -> Result<Vec<Entity>> {
        self.repository.rows(&entity_type.into())
    }

    pub fn registry(&self) -> &KeyRegistry {
        self.registry
    }
}
