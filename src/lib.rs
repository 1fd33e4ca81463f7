// ============================================================================
// MemoFixture Library
// ============================================================================

pub mod core;
pub mod schema;
pub mod keys;
pub mod faker;
pub mod storage;
pub mod facade;

// Re-export main types for convenience
pub use crate::core::{DataType, Entity, EntityTypeId, FixtureError, KeySlot, KeyTuple, Navigation, Result, Value};
pub use facade::{BatchMode, FixtureSession, SessionConfig};
pub use keys::{KeyAssignmentRule, KeyRegistry, KeySeeder, RegistryCheckpoint};
pub use schema::{Catalog, DependencyResolver, EntityDescriptor, FieldDef, ForeignKey, SchemaModel};
pub use storage::{InMemoryRepository, Repository};
pub use faker::{FakeValueProvider, RandomValueProvider};
