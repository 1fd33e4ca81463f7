//! Fake value providers fill a record with plausible random content before
//! its keys are assigned.

pub mod random;

pub use random::RandomValueProvider;

use crate::core::{Entity, EntityTypeId, Result};
use crate::schema::SchemaModel;

pub trait FakeValueProvider {
    /// A populated record of `entity_type`. Key slots and navigations may
    /// carry arbitrary content; the session clears them before assigning keys.
    fn blank(&mut self, schema: &dyn SchemaModel, entity_type: &EntityTypeId) -> Result<Entity>;
}
