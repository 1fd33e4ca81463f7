use crate::core::{EntityTypeId, Result};
use super::{Catalog, EntityDescriptor, ForeignKey};

/// Read access to the statically declared schema.
pub trait SchemaModel {
    fn descriptor(&self, entity_type: &EntityTypeId) -> Result<&EntityDescriptor>;

    /// All known entity types in registration order.
    fn entity_types(&self) -> Vec<EntityTypeId>;

    fn key_fields(&self, entity_type: &EntityTypeId) -> Result<&[String]> {
        Ok(self.descriptor(entity_type)?.key_fields())
    }

    fn foreign_keys(&self, entity_type: &EntityTypeId) -> Result<&[ForeignKey]> {
        Ok(self.descriptor(entity_type)?.foreign_keys())
    }
}

impl SchemaModel for Catalog {
    fn descriptor(&self, entity_type: &EntityTypeId) -> Result<&EntityDescriptor> {
        self.get(entity_type)
    }

    fn entity_types(&self) -> Vec<EntityTypeId> {
        Catalog::entity_types(self).to_vec()
    }
}
