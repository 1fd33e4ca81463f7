use super::{BatchMode, FixtureSession};
use crate::core::{Entity, EntityTypeId, Result};
use log::{debug, warn};

impl FixtureSession {
    /// Generate exactly `count` entities of `entity_type`, one after the
    /// other. Each call sees the keys recorded by the calls before it.
    pub fn generate_many(&mut self, entity_type: impl Into<EntityTypeId>, count: usize) -> Result<Vec<Entity>> {
        self.run_batch(&entity_type.into(), count, None)
    }

    pub fn generate_many_with<F>(
        &mut self,
        entity_type: impl Into<EntityTypeId>,
        count: usize,
        init: F,
    ) -> Result<Vec<Entity>>
    where
        F: Fn(&mut Entity),
    {
        self.run_batch(&entity_type.into(), count, Some(&init))
    }

    fn run_batch(
        &mut self,
        entity_type: &EntityTypeId,
        count: usize,
        init: Option<&dyn Fn(&mut Entity)>,
    ) -> Result<Vec<Entity>> {
        match self.config().batch_mode {
            BatchMode::PerEntity => self.generate_sequence(entity_type, count, init),
            BatchMode::Atomic => {
                let registry = self.registry().clone();
                self.repository_mut().begin_batch()?;

                match self.generate_sequence(entity_type, count, init) {
                    Ok(entities) => {
                        self.repository_mut().commit_batch()?;
                        Ok(entities)
                    }
                    Err(err) => {
                        warn!(
                            "Batch of {} '{}' failed, rolling back: {}",
                            count, entity_type, err
                        );
                        self.repository_mut().rollback_batch()?;
                        self.restore_registry(registry);
                        Err(err)
                    }
                }
            }
        }
    }

    fn generate_sequence(
        &mut self,
        entity_type: &EntityTypeId,
        count: usize,
        init: Option<&dyn Fn(&mut Entity)>,
    ) -> Result<Vec<Entity>> {
        let mut entities = Vec::with_capacity(count);
        for index in 0..count {
            match self.materialize(entity_type, init) {
                Ok(entity) => entities.push(entity),
                Err(err) => {
                    debug!(
                        "Generating '{}' stopped at {}/{}: {}",
                        entity_type, index, count, err
                    );
                    return Err(err);
                }
            }
        }
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{DataType, FixtureError};
    use crate::facade::{BatchMode, FixtureSession, SessionConfig};
    use crate::schema::{Catalog, EntityDescriptor, FieldDef};

    fn session(mode: BatchMode) -> FixtureSession {
        let catalog = Catalog::from_descriptors([EntityDescriptor::new("tags")
            .field(FieldDef::new("id", DataType::Integer).not_null())
            .field(FieldDef::new("label", DataType::Text))
            .primary_key(["id"])])
        .unwrap();
        let config = SessionConfig::new().batch_mode(mode).assignment_attempt_limit(2);
        let mut session = FixtureSession::with_config(catalog, config).unwrap();
        // Runs out of keys after three.
        session.register_key_assignment_rule("tags", |tag, keys| {
            let next = keys.sequential_key("tags").min(3);
            tag.set("id", next);
            Ok(())
        });
        session
    }

    #[test]
    fn per_entity_keeps_committed_rows() {
        let mut session = session(BatchMode::PerEntity);
        assert!(matches!(
            session.generate_many("tags", 5),
            Err(FixtureError::KeySpaceExhausted { .. })
        ));
        assert_eq!(session.repository().row_count(&"tags".into()).unwrap(), 3);
    }

    #[test]
    fn atomic_rolls_back_rows_and_registry() {
        let mut session = session(BatchMode::Atomic);
        session.generate_many("tags", 2).unwrap();
        let recorded = session.registry().len(&"tags".into());

        assert!(session.generate_many("tags", 3).is_err());
        assert_eq!(session.repository().row_count(&"tags".into()).unwrap(), 2);
        assert_eq!(session.registry().len(&"tags".into()), recorded);
    }

    #[test]
    fn initializer_applies_to_every_entity() {
        let mut session = session(BatchMode::PerEntity);
        let tags = session
            .generate_many_with("tags", 3, |tag| tag.set("label", "fixed"))
            .unwrap();
        assert_eq!(tags.len(), 3);
        assert!(tags.iter().all(|t| t.get("label").and_then(|v| v.as_str()) == Some("fixed")));
        assert!(session.generate_many("tags", 0).unwrap().is_empty());
    }
}
