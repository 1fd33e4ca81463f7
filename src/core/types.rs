use super::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of a schema entity type (one table).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityTypeId(String);

impl EntityTypeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityTypeId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for EntityTypeId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&EntityTypeId> for EntityTypeId {
    fn from(id: &EntityTypeId) -> Self {
        id.clone()
    }
}

/// Ordered key values identifying one row of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyTuple(Vec<Value>);

impl KeyTuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn first(&self) -> Option<&Value> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Value> {
        self.0.last()
    }

    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl fmt::Display for KeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (idx, value) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

impl From<Vec<Value>> for KeyTuple {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// A primary-key or foreign-key cell. `Unset` is never a legal stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeySlot {
    #[default]
    Unset,
    Value(Value),
}

impl KeySlot {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Unset => None,
            Self::Value(v) => Some(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Navigation {
    Reference(Option<Box<Entity>>),
    Collection(Vec<Entity>),
}

impl Navigation {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Reference(target) => target.is_none(),
            Self::Collection(items) => items.is_empty(),
        }
    }
}

/// Outcome of inspecting an entity's primary key fields.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyState {
    Unset,
    Partial { set: Vec<String>, unset: Vec<String> },
    Complete(KeyTuple),
}

/// One fixture row. Primary and foreign key fields live in explicit slots,
/// every other column is an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    entity_type: EntityTypeId,
    slots: BTreeMap<String, KeySlot>,
    attributes: BTreeMap<String, Value>,
    navigations: BTreeMap<String, Navigation>,
}

impl Entity {
    pub fn new<I, S>(entity_type: EntityTypeId, slot_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_type,
            slots: slot_fields
                .into_iter()
                .map(|f| (f.into(), KeySlot::Unset))
                .collect(),
            attributes: BTreeMap::new(),
            navigations: BTreeMap::new(),
        }
    }

    pub fn entity_type(&self) -> &EntityTypeId {
        &self.entity_type
    }

    /// Current value of a field; `None` for unset key slots and unknown fields.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self.slots.get(field) {
            Some(slot) => slot.value(),
            None => self.attributes.get(field),
        }
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.slots.get_mut(field) {
            Some(slot) => *slot = KeySlot::Value(value),
            None => {
                self.attributes.insert(field.to_string(), value);
            }
        }
    }

    pub fn unset(&mut self, field: &str) {
        if let Some(slot) = self.slots.get_mut(field) {
            *slot = KeySlot::Unset;
        }
    }

    pub fn slot(&self, field: &str) -> Option<&KeySlot> {
        self.slots.get(field)
    }

    pub fn is_key_slot(&self, field: &str) -> bool {
        self.slots.contains_key(field)
    }

    pub fn slots(&self) -> &BTreeMap<String, KeySlot> {
        &self.slots
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn navigation(&self, name: &str) -> Option<&Navigation> {
        self.navigations.get(name)
    }

    pub fn navigations(&self) -> &BTreeMap<String, Navigation> {
        &self.navigations
    }

    pub fn set_navigation(&mut self, name: impl Into<String>, navigation: Navigation) {
        self.navigations.insert(name.into(), navigation);
    }

    /// Drops generated relationship graphs: references become `None`,
    /// collections become empty.
    pub fn strip_navigations(&mut self) {
        for navigation in self.navigations.values_mut() {
            match navigation {
                Navigation::Reference(target) => *target = None,
                Navigation::Collection(items) => items.clear(),
            }
        }
    }

    pub fn clear_keys(&mut self) {
        for slot in self.slots.values_mut() {
            *slot = KeySlot::Unset;
        }
    }

    pub fn key_state(&self, key_fields: &[String]) -> KeyState {
        let mut set = Vec::new();
        let mut unset = Vec::new();
        let mut values = Vec::with_capacity(key_fields.len());

        for field in key_fields {
            match self.slots.get(field).and_then(KeySlot::value) {
                Some(value) => {
                    set.push(field.clone());
                    values.push(value.clone());
                }
                None => unset.push(field.clone()),
            }
        }

        if set.is_empty() {
            KeyState::Unset
        } else if unset.is_empty() {
            KeyState::Complete(KeyTuple::new(values))
        } else {
            KeyState::Partial { set, unset }
        }
    }

    pub fn key_tuple(&self, key_fields: &[String]) -> Option<KeyTuple> {
        match self.key_state(key_fields) {
            KeyState::Complete(tuple) => Some(tuple),
            _ => None,
        }
    }

    /// Projects the entity onto `fields`; unset or missing fields read as NULL.
    pub fn project(&self, fields: &[String]) -> KeyTuple {
        KeyTuple::new(
            fields
                .iter()
                .map(|f| self.get(f).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_key_state_transitions() {
        let mut entity = Entity::new("Table3".into(), ["a", "b"]);
        let key_fields = keys(&["a", "b"]);
        assert_eq!(entity.key_state(&key_fields), KeyState::Unset);

        entity.set("a", 1i64);
        match entity.key_state(&key_fields) {
            KeyState::Partial { set, unset } => {
                assert_eq!(set, keys(&["a"]));
                assert_eq!(unset, keys(&["b"]));
            }
            other => panic!("Expected partial key, got {:?}", other),
        }

        entity.set("b", 2i64);
        assert_eq!(
            entity.key_tuple(&key_fields),
            Some(KeyTuple::new(vec![Value::Integer(1), Value::Integer(2)]))
        );

        entity.clear_keys();
        assert_eq!(entity.key_state(&key_fields), KeyState::Unset);
    }

    #[test]
    fn test_set_routes_to_slot_or_attribute() {
        let mut entity = Entity::new("Table1".into(), ["id"]);
        entity.set("id", -1i64);
        entity.set("name", "Alice");

        assert_eq!(entity.slot("id"), Some(&KeySlot::Value(Value::Integer(-1))));
        assert_eq!(entity.attributes().get("name"), Some(&Value::from("Alice")));
        assert!(entity.slot("name").is_none());
    }

    #[test]
    fn test_strip_navigations() {
        let mut entity = Entity::new("Table2".into(), ["id"]);
        let parent = Entity::new("Table1".into(), ["id"]);
        entity.set_navigation("table1", Navigation::Reference(Some(Box::new(parent.clone()))));
        entity.set_navigation("children", Navigation::Collection(vec![parent]));

        entity.strip_navigations();
        assert!(entity.navigations().values().all(Navigation::is_empty));
        assert_eq!(entity.navigations().len(), 2);
    }

    #[test]
    fn test_key_tuple_display() {
        let tuple = KeyTuple::new(vec![Value::Integer(1), Value::from("x")]);
        assert_eq!(tuple.to_string(), "(1, 'x')");
    }
}
