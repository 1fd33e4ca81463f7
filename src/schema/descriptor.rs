use crate::core::{DataType, Entity, EntityTypeId, FixtureError, KeyTuple, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn validate(&self, entity_type: &EntityTypeId, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(FixtureError::ConstraintViolation(format!(
                    "Column '{}.{}' cannot be NULL",
                    entity_type, self.name
                )));
            }
            return Ok(());
        }

        if !self.data_type.is_compatible(value) {
            return Err(FixtureError::TypeMismatch(format!(
                "Column '{}.{}' expects type {}, got {}",
                entity_type,
                self.name,
                self.data_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

/// One or more local fields referencing the primary key of `references`,
/// positionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub fields: Vec<String>,
    pub references: EntityTypeId,
}

impl ForeignKey {
    pub fn new<I, S>(fields: I, references: impl Into<EntityTypeId>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            references: references.into(),
        }
    }

    pub fn single(field: impl Into<String>, references: impl Into<EntityTypeId>) -> Self {
        Self {
            fields: vec![field.into()],
            references: references.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationKind {
    Reference,
    Collection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationDef {
    pub name: String,
    pub target: EntityTypeId,
    pub kind: NavigationKind,
}

/// Static description of one entity type: its columns, ordered primary key,
/// foreign keys and navigation properties.
///
/// ```
/// use memofixture::schema::{EntityDescriptor, FieldDef, ForeignKey};
/// use memofixture::DataType;
///
/// let posts = EntityDescriptor::new("posts")
///     .field(FieldDef::new("id", DataType::Integer).not_null())
///     .field(FieldDef::new("user_id", DataType::Integer).not_null())
///     .field(FieldDef::new("title", DataType::Text))
///     .primary_key(["id"])
///     .foreign_key(ForeignKey::single("user_id", "users"))
///     .reference("author", "users");
///
/// assert_eq!(posts.key_fields(), ["id".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    id: EntityTypeId,
    fields: Vec<FieldDef>,
    primary_key: Vec<String>,
    foreign_keys: Vec<ForeignKey>,
    navigations: Vec<NavigationDef>,
}

impl EntityDescriptor {
    pub fn new(id: impl Into<EntityTypeId>) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            navigations: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn primary_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn reference(mut self, name: impl Into<String>, target: impl Into<EntityTypeId>) -> Self {
        self.navigations.push(NavigationDef {
            name: name.into(),
            target: target.into(),
            kind: NavigationKind::Reference,
        });
        self
    }

    pub fn collection(mut self, name: impl Into<String>, target: impl Into<EntityTypeId>) -> Self {
        self.navigations.push(NavigationDef {
            name: name.into(),
            target: target.into(),
            kind: NavigationKind::Collection,
        });
        self
    }

    pub fn id(&self) -> &EntityTypeId {
        &self.id
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn key_fields(&self) -> &[String] {
        &self.primary_key
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn navigations(&self) -> &[NavigationDef] {
        &self.navigations
    }

    /// Every field held in a key slot: primary key fields first, then
    /// foreign key fields not already part of the primary key.
    pub fn slot_fields(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut slots = Vec::new();
        for field in self
            .primary_key
            .iter()
            .chain(self.foreign_keys.iter().flat_map(|fk| fk.fields.iter()))
        {
            if seen.insert(field.as_str()) {
                slots.push(field.clone());
            }
        }
        slots
    }

    /// Parent types in foreign key declaration order, without duplicates.
    pub fn dependencies(&self) -> Vec<EntityTypeId> {
        let mut seen = HashSet::new();
        let mut parents = Vec::new();
        for fk in &self.foreign_keys {
            if seen.insert(&fk.references) {
                parents.push(fk.references.clone());
            }
        }
        parents
    }

    /// A record with every field absent and every key slot unset.
    pub fn blank(&self) -> Entity {
        Entity::new(self.id.clone(), self.slot_fields())
    }

    /// Checks that only need this descriptor.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(FixtureError::SchemaError(format!(
                    "Entity '{}' declares field '{}' twice",
                    self.id, field.name
                )));
            }
        }

        if self.primary_key.is_empty() {
            return Err(FixtureError::SchemaError(format!(
                "Entity '{}' has no primary key",
                self.id
            )));
        }

        let mut key_names = HashSet::new();
        for key in &self.primary_key {
            if !key_names.insert(key.as_str()) {
                return Err(FixtureError::SchemaError(format!(
                    "Entity '{}' lists key field '{}' twice",
                    self.id, key
                )));
            }
            self.require_field(key)?;
        }

        for fk in &self.foreign_keys {
            if fk.fields.is_empty() {
                return Err(FixtureError::SchemaError(format!(
                    "Entity '{}' declares a foreign key to '{}' without fields",
                    self.id, fk.references
                )));
            }
            for field in &fk.fields {
                self.require_field(field)?;
            }
        }

        for navigation in &self.navigations {
            if names.contains(navigation.name.as_str()) {
                return Err(FixtureError::SchemaError(format!(
                    "Entity '{}': navigation '{}' shadows a field",
                    self.id, navigation.name
                )));
            }
        }

        Ok(())
    }

    /// Widen every set field to the value its column stores.
    pub fn coerce_entity(&self, entity: &mut Entity) {
        for field in &self.fields {
            if let Some(widened) = entity.get(&field.name).and_then(|v| field.data_type.widen(v)) {
                entity.set(&field.name, widened);
            }
        }
    }

    /// `key` as stored: each part widened to the type of its key field.
    pub fn coerce_key(&self, key: &KeyTuple) -> KeyTuple {
        let values = self
            .primary_key
            .iter()
            .zip(key.values())
            .map(|(name, value)| {
                self.field_def(name)
                    .and_then(|f| f.data_type.widen(value))
                    .unwrap_or_else(|| value.clone())
            })
            .collect();
        KeyTuple::new(values)
    }

    /// Column-level checks for a row about to be stored: declared fields only,
    /// declared types, NOT NULL. Unset slots read as NULL.
    pub fn validate_entity(&self, entity: &Entity) -> Result<()> {
        if entity.entity_type() != &self.id {
            return Err(FixtureError::TypeMismatch(format!(
                "Expected entity of type '{}', got '{}'",
                self.id,
                entity.entity_type()
            )));
        }

        for name in entity.attributes().keys() {
            if self.field_def(name).is_none() {
                return Err(FixtureError::UnknownField {
                    entity_type: self.id.clone(),
                    field: name.clone(),
                });
            }
        }

        for field in &self.fields {
            let value = entity.get(&field.name).cloned().unwrap_or(Value::Null);
            field.validate(&self.id, &value)?;
        }

        Ok(())
    }

    fn require_field(&self, name: &str) -> Result<()> {
        if self.field_def(name).is_none() {
            return Err(FixtureError::UnknownField {
                entity_type: self.id.clone(),
                field: name.to_string(),
            });
        }
        Ok(())
    }
}
