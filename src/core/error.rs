use thiserror::Error;

use super::types::EntityTypeId;

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("No key assignment rule registered for '{entity_type}'; register one before generating")]
    MissingDependencyResolver { entity_type: EntityTypeId },

    #[error(
        "Partial key override on '{entity_type}': set {set:?} but left {unset:?} unset; \
         set every key field or none of them"
    )]
    PartialKeyOverride {
        entity_type: EntityTypeId,
        set: Vec<String>,
        unset: Vec<String>,
    },

    #[error("Cyclic dependency detected between entity types: {}", join_types(.entity_types))]
    CyclicDependency { entity_types: Vec<EntityTypeId> },

    #[error("No keys generated yet for '{entity_type}'; generate it before its dependents")]
    KeySourceEmpty { entity_type: EntityTypeId },

    #[error("Key space exhausted for '{entity_type}': no free key after {attempts} attempts")]
    KeySpaceExhausted {
        entity_type: EntityTypeId,
        attempts: usize,
    },

    #[error("Key assignment rule for '{entity_type}' left key fields {fields:?} unset")]
    IncompleteKeyAssignment {
        entity_type: EntityTypeId,
        fields: Vec<String>,
    },

    #[error("Entity type '{0}' not found")]
    UnknownEntityType(EntityTypeId),

    #[error("Field '{field}' not found on entity type '{entity_type}'")]
    UnknownField {
        entity_type: EntityTypeId,
        field: String,
    },

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FixtureError>;

fn join_types(types: &[EntityTypeId]) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
