use super::KeySeeder;
use crate::core::{Entity, EntityTypeId, FixtureError, Result};
use log::debug;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

/// Writes primary key (and foreign key) values into a freshly generated
/// entity whose key slots are all unset.
pub type KeyAssignmentRule = Box<dyn Fn(&mut Entity, &mut KeySeeder<'_>) -> Result<()>>;

/// Per-type key assignment rules. The first registration for a type wins;
/// later registrations are ignored.
#[derive(Default)]
pub struct KeyAssignmentRules {
    rules: HashMap<EntityTypeId, KeyAssignmentRule>,
}

impl KeyAssignmentRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when a rule was already registered for the type.
    pub fn register<F>(&mut self, entity_type: impl Into<EntityTypeId>, rule: F) -> bool
    where
        F: Fn(&mut Entity, &mut KeySeeder<'_>) -> Result<()> + 'static,
    {
        match self.rules.entry(entity_type.into()) {
            Entry::Occupied(entry) => {
                debug!(
                    "Key assignment rule for '{}' already registered, ignoring",
                    entry.key()
                );
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(Box::new(rule));
                true
            }
        }
    }

    pub fn lookup(&self, entity_type: &EntityTypeId) -> Result<&KeyAssignmentRule> {
        self.rules
            .get(entity_type)
            .ok_or_else(|| FixtureError::MissingDependencyResolver {
                entity_type: entity_type.clone(),
            })
    }

    pub fn contains(&self, entity_type: &EntityTypeId) -> bool {
        self.rules.contains_key(entity_type)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Types with a registered rule, sorted by name.
    pub fn registered(&self) -> Vec<&EntityTypeId> {
        let mut types: Vec<_> = self.rules.keys().collect();
        types.sort();
        types
    }
}

impl fmt::Debug for KeyAssignmentRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAssignmentRules")
            .field("registered", &self.registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Value};
    use crate::keys::KeyRegistry;
    use crate::schema::{Catalog, EntityDescriptor, FieldDef};
    use crate::storage::InMemoryRepository;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn first_registration_wins() {
        let catalog = Catalog::from_descriptors([EntityDescriptor::new("users")
            .field(FieldDef::new("id", DataType::Integer).not_null())
            .primary_key(["id"])])
        .unwrap();
        let repo = InMemoryRepository::new(catalog.clone());
        let mut registry = KeyRegistry::new();
        let mut rng = StdRng::seed_from_u64(1);

        let mut rules = KeyAssignmentRules::new();
        assert!(rules.register("users", |e: &mut Entity, _: &mut KeySeeder<'_>| {
            e.set("id", 1i64);
            Ok(())
        }));
        assert!(!rules.register("users", |e: &mut Entity, _: &mut KeySeeder<'_>| {
            e.set("id", 2i64);
            Ok(())
        }));
        assert_eq!(rules.len(), 1);

        let users = EntityTypeId::from("users");
        let mut entity = catalog.get(&users).unwrap().blank();
        let mut seeder = KeySeeder::new(&mut registry, &repo, &catalog, &mut rng, 10);
        rules.lookup(&users).unwrap()(&mut entity, &mut seeder).unwrap();
        assert_eq!(entity.get("id"), Some(&Value::Integer(1)));
    }

    #[test]
    fn lookup_reports_missing_rule() {
        let rules = KeyAssignmentRules::new();
        match rules.lookup(&"orders".into()) {
            Err(FixtureError::MissingDependencyResolver { entity_type }) => {
                assert_eq!(entity_type.as_str(), "orders");
            }
            Err(other) => panic!("Expected MissingDependencyResolver, got {:?}", other),
            Ok(_) => panic!("Expected MissingDependencyResolver, got a rule"),
        }
        assert!(rules.is_empty());
        assert!(format!("{:?}", rules).contains("KeyAssignmentRules"));
    }
}
