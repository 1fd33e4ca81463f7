use crate::core::{Entity, EntityTypeId, FixtureError, KeyTuple, Result};

/// Storage backend consumed by the fixture session.
///
/// `add` and `update` only stage changes; `save` commits everything staged
/// since the previous `save` as one unit.
pub trait Repository {
    /// Look up a committed row by its primary key.
    fn find(&self, entity_type: &EntityTypeId, key: &KeyTuple) -> Result<Option<Entity>>;

    /// Stage a new row.
    fn add(&mut self, entity: Entity) -> Result<()>;

    /// Stage a replacement for the committed row with the same primary key.
    fn update(&mut self, entity: Entity) -> Result<()>;

    /// Commit staged changes; returns how many were applied.
    fn save(&mut self) -> Result<usize>;

    /// Drop staged changes without applying them.
    fn discard_pending(&mut self);

    /// Primary keys of every committed row, in insertion order.
    fn keys(&self, entity_type: &EntityTypeId) -> Result<Vec<KeyTuple>>;

    /// Every committed row, in insertion order.
    fn rows(&self, entity_type: &EntityTypeId) -> Result<Vec<Entity>>;

    fn row_count(&self, entity_type: &EntityTypeId) -> Result<usize>;

    fn begin_batch(&mut self) -> Result<()> {
        Err(FixtureError::UnsupportedOperation(
            "repository does not support batch rollback".into(),
        ))
    }

    fn commit_batch(&mut self) -> Result<()> {
        Err(FixtureError::UnsupportedOperation(
            "repository does not support batch rollback".into(),
        ))
    }

    fn rollback_batch(&mut self) -> Result<()> {
        Err(FixtureError::UnsupportedOperation(
            "repository does not support batch rollback".into(),
        ))
    }
}
