use super::SessionConfig;
use crate::core::{Entity, EntityTypeId, FixtureError, KeyState, KeyTuple, Result};
use crate::faker::{FakeValueProvider, RandomValueProvider};
use crate::keys::{KeyAssignmentRules, KeyRegistry, KeySeeder};
use crate::schema::{Catalog, DependencyResolver};
use crate::storage::{InMemoryRepository, Repository};
use log::{debug, trace};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Generates referentially consistent fixture rows for one schema.
///
/// Every `generate` call fakes a record, strips its navigations, clears
/// its keys, applies the caller's initializer and then either updates the
/// existing row with the same key, rejects a partially set key, runs the
/// registered key assignment rule, or trusts the caller's keys. Each call
/// commits exactly once.
///
/// ```
/// use memofixture::schema::{Catalog, EntityDescriptor, FieldDef, ForeignKey};
/// use memofixture::{DataType, FixtureSession};
///
/// let catalog = Catalog::from_descriptors([
///     EntityDescriptor::new("users")
///         .field(FieldDef::new("id", DataType::Integer).not_null())
///         .field(FieldDef::new("name", DataType::Text))
///         .primary_key(["id"]),
///     EntityDescriptor::new("posts")
///         .field(FieldDef::new("id", DataType::Integer).not_null())
///         .field(FieldDef::new("user_id", DataType::Integer).not_null())
///         .primary_key(["id"])
///         .foreign_key(ForeignKey::single("user_id", "users")),
/// ])?;
///
/// let mut session = FixtureSession::new(catalog);
/// session.register_key_assignment_rule("users", |user, keys| {
///     user.set("id", keys.sequential_key("users"));
///     Ok(())
/// });
/// session.register_key_assignment_rule("posts", |post, keys| {
///     post.set("id", keys.sequential_key("posts"));
///     let author = keys.random_existing_key("users")?;
///     post.set("user_id", author.values()[0].clone());
///     Ok(())
/// });
///
/// session.generate_many("users", 3)?;
/// let post = session.generate("posts")?;
/// assert!(post.get_i64("user_id").is_some_and(|id| (1..=3).contains(&id)));
/// # Ok::<(), memofixture::FixtureError>(())
/// ```
pub struct FixtureSession {
    config: SessionConfig,
    catalog: Catalog,
    rules: KeyAssignmentRules,
    registry: KeyRegistry,
    repository: Box<dyn Repository>,
    faker: Box<dyn FakeValueProvider>,
    rng: StdRng,
}

impl FixtureSession {
    pub fn new(catalog: Catalog) -> Self {
        Self::from_parts(catalog, SessionConfig::default())
    }

    pub fn with_config(catalog: Catalog, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "Opening fixture session '{}' over {} entity type(s)",
            config.instance_name,
            catalog.len()
        );
        Ok(Self::from_parts(catalog, config))
    }

    fn from_parts(catalog: Catalog, config: SessionConfig) -> Self {
        let repository = InMemoryRepository::new(catalog.clone());
        let faker = RandomValueProvider::new(config.seed, config.collection_fill);

        Self {
            rng: seeded_rng(config.seed),
            config,
            catalog,
            rules: KeyAssignmentRules::new(),
            registry: KeyRegistry::new(),
            repository: Box::new(repository),
            faker: Box::new(faker),
        }
    }

    /// Replace the backing repository. It must know every type of the catalog.
    pub fn with_repository(mut self, repository: impl Repository + 'static) -> Self {
        self.repository = Box::new(repository);
        self
    }

    pub fn with_faker(mut self, faker: impl FakeValueProvider + 'static) -> Self {
        self.faker = Box::new(faker);
        self
    }

    /// Register the key assignment rule for `entity_type`. The first
    /// registration wins; returns false if one was already present.
    pub fn register_key_assignment_rule<F>(&mut self, entity_type: impl Into<EntityTypeId>, rule: F) -> bool
    where
        F: Fn(&mut Entity, &mut KeySeeder<'_>) -> Result<()> + 'static,
    {
        self.rules.register(entity_type, rule)
    }

    pub fn generate(&mut self, entity_type: impl Into<EntityTypeId>) -> Result<Entity> {
        self.materialize(&entity_type.into(), None)
    }

    /// Like `generate`, with `init` applied after the keys are cleared.
    /// `init` runs a second time on the stored row when the key it sets
    /// already exists.
    pub fn generate_with<F>(&mut self, entity_type: impl Into<EntityTypeId>, init: F) -> Result<Entity>
    where
        F: Fn(&mut Entity),
    {
        self.materialize(&entity_type.into(), Some(&init))
    }

    /// Parents-before-children order of `entity_types`.
    pub fn dependency_order(&self, entity_types: &[EntityTypeId]) -> Result<Vec<EntityTypeId>> {
        DependencyResolver::new(&self.catalog).order(entity_types)
    }

    pub fn dependency_order_all(&self) -> Result<Vec<EntityTypeId>> {
        DependencyResolver::new(&self.catalog).order_all()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn instance_name(&self) -> &str {
        &self.config.instance_name
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    pub fn repository(&self) -> &dyn Repository {
        &*self.repository
    }

    pub fn rules(&self) -> &KeyAssignmentRules {
        &self.rules
    }

    pub(super) fn repository_mut(&mut self) -> &mut dyn Repository {
        &mut *self.repository
    }

    pub(super) fn restore_registry(&mut self, registry: KeyRegistry) {
        self.registry = registry;
    }

    /// Generate one entity. Keys recorded while the call runs are dropped
    /// again when it fails, so the registry only names persisted rows.
    pub(super) fn materialize(
        &mut self,
        entity_type: &EntityTypeId,
        init: Option<&dyn Fn(&mut Entity)>,
    ) -> Result<Entity> {
        let checkpoint = self.registry.checkpoint();
        let result = self.try_materialize(entity_type, init);
        if let Err(err) = &result {
            trace!("Dropping keys recorded for failed '{}': {}", entity_type, err);
            self.registry.rollback(&checkpoint);
        }
        result
    }

    fn try_materialize(
        &mut self,
        entity_type: &EntityTypeId,
        init: Option<&dyn Fn(&mut Entity)>,
    ) -> Result<Entity> {
        self.rules.lookup(entity_type)?;
        let descriptor = self.catalog.get(entity_type)?;
        let key_fields = descriptor.key_fields().to_vec();

        let mut entity = self.faker.blank(&self.catalog, entity_type)?;
        entity.strip_navigations();
        entity.clear_keys();
        if let Some(init) = init {
            init(&mut entity);
        }
        descriptor.coerce_entity(&mut entity);

        match entity.key_state(&key_fields) {
            KeyState::Complete(key) => {
                if let Some(existing) = self.repository.find(entity_type, &key)? {
                    return self.update_existing(existing, &key, init);
                }
                trace!("Manual key {} for '{}'", key, entity_type);
                self.insert(entity)
            }
            KeyState::Partial { set, unset } => Err(FixtureError::PartialKeyOverride {
                entity_type: entity_type.clone(),
                set,
                unset,
            }),
            KeyState::Unset => {
                let key = self.assign_keys(entity_type, &key_fields, &mut entity)?;
                let entity = self.insert(entity)?;
                if !self.registry.contains(entity_type, &key) {
                    self.registry.record(entity_type, key);
                }
                Ok(entity)
            }
        }
    }

    /// Run the rule until it yields a key no committed row uses.
    fn assign_keys(
        &mut self,
        entity_type: &EntityTypeId,
        key_fields: &[String],
        entity: &mut Entity,
    ) -> Result<KeyTuple> {
        let rule = self.rules.lookup(entity_type)?;
        let limit = self.config.assignment_attempt_limit;

        for attempt in 1..=limit {
            entity.clear_keys();
            let mut seeder = KeySeeder::new(
                &mut self.registry,
                &*self.repository,
                &self.catalog,
                &mut self.rng,
                self.config.key_attempt_limit,
            );
            rule(entity, &mut seeder)?;
            self.catalog.get(entity_type)?.coerce_entity(entity);

            let key = match entity.key_state(key_fields) {
                KeyState::Complete(key) => key,
                KeyState::Partial { unset, .. } => {
                    return Err(FixtureError::IncompleteKeyAssignment {
                        entity_type: entity_type.clone(),
                        fields: unset,
                    });
                }
                KeyState::Unset => {
                    return Err(FixtureError::IncompleteKeyAssignment {
                        entity_type: entity_type.clone(),
                        fields: key_fields.to_vec(),
                    });
                }
            };

            if self.repository.find(entity_type, &key)?.is_none() {
                return Ok(key);
            }
            debug!(
                "Key {} for '{}' is already taken (attempt {}/{}), retrying",
                key, entity_type, attempt, limit
            );
        }

        Err(FixtureError::KeySpaceExhausted {
            entity_type: entity_type.clone(),
            attempts: limit,
        })
    }

    fn update_existing(
        &mut self,
        mut row: Entity,
        key: &KeyTuple,
        init: Option<&dyn Fn(&mut Entity)>,
    ) -> Result<Entity> {
        debug!("'{}' row {} exists, updating instead of inserting", row.entity_type(), key);
        if let Some(init) = init {
            init(&mut row);
            self.catalog.get(row.entity_type())?.coerce_entity(&mut row);
        }
        self.repository.update(row.clone())?;
        self.commit()?;
        Ok(row)
    }

    fn insert(&mut self, entity: Entity) -> Result<Entity> {
        self.repository.add(entity.clone())?;
        self.commit()?;
        Ok(entity)
    }

    fn commit(&mut self) -> Result<()> {
        if let Err(err) = self.repository.save() {
            self.repository.discard_pending();
            return Err(err);
        }
        Ok(())
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        // Keyed off the faker's seed so the two streams differ.
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    }
}

impl std::fmt::Debug for FixtureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureSession")
            .field("instance_name", &self.config.instance_name)
            .field("entity_types", &self.catalog.entity_types())
            .field("rules", &self.rules)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Navigation, Value};
    use crate::schema::{EntityDescriptor, FieldDef, ForeignKey};

    fn catalog() -> Catalog {
        Catalog::from_descriptors([
            EntityDescriptor::new("users")
                .field(FieldDef::new("id", DataType::Integer).not_null())
                .field(FieldDef::new("name", DataType::Text))
                .primary_key(["id"])
                .collection("posts", "posts"),
            EntityDescriptor::new("posts")
                .field(FieldDef::new("id", DataType::Integer).not_null())
                .field(FieldDef::new("user_id", DataType::Integer).not_null())
                .primary_key(["id"])
                .foreign_key(ForeignKey::single("user_id", "users"))
                .reference("author", "users"),
        ])
        .unwrap()
    }

    fn session() -> FixtureSession {
        let mut session =
            FixtureSession::with_config(catalog(), SessionConfig::new().seed(5)).unwrap();
        session.register_key_assignment_rule("users", |user, keys| {
            user.set("id", keys.sequential_key("users"));
            Ok(())
        });
        session.register_key_assignment_rule("posts", |post, keys| {
            post.set("id", keys.sequential_key("posts"));
            let parent = keys.random_existing_key("users")?;
            post.set("user_id", parent.values()[0].clone());
            Ok(())
        });
        session
    }

    #[test]
    fn generated_entities_have_no_navigations() {
        let mut session = session();
        let user = session.generate("users").unwrap();
        let post = session.generate("posts").unwrap();

        assert!(user.navigations().values().all(Navigation::is_empty));
        assert!(matches!(post.navigation("author"), Some(Navigation::Reference(None))));
        assert_eq!(post.get("user_id"), Some(&Value::Integer(1)));
    }

    #[test]
    fn missing_rule_fails_before_any_work() {
        let mut session = FixtureSession::new(catalog());
        match session.generate("users") {
            Err(FixtureError::MissingDependencyResolver { entity_type }) => {
                assert_eq!(entity_type.as_str(), "users");
            }
            other => panic!("Expected MissingDependencyResolver, got {:?}", other),
        }
        assert_eq!(session.repository().row_count(&"users".into()).unwrap(), 0);
    }

    #[test]
    fn rule_leaving_keys_unset_is_rejected() {
        let mut session = FixtureSession::new(catalog());
        session.register_key_assignment_rule("users", |_, _| Ok(()));
        assert!(matches!(
            session.generate("users"),
            Err(FixtureError::IncompleteKeyAssignment { .. })
        ));
    }

    #[test]
    fn rule_errors_propagate() {
        let mut session = session();
        // No users yet, so the post rule has no parent key to draw.
        assert!(matches!(
            session.generate("posts"),
            Err(FixtureError::KeySourceEmpty { .. })
        ));
        assert_eq!(session.repository().row_count(&"posts".into()).unwrap(), 0);
        assert!(session.registry().is_empty(&"posts".into()));

        session.generate("users").unwrap();
        let post = session.generate("posts").unwrap();
        assert_eq!(post.get_i64("id"), Some(1));
    }

    #[test]
    fn rejected_save_drops_recorded_keys() {
        let mut session = FixtureSession::new(catalog());
        session.register_key_assignment_rule("posts", |post, keys| {
            post.set("id", keys.sequential_key("posts"));
            post.set("user_id", 99i64);
            Ok(())
        });

        assert!(matches!(
            session.generate("posts"),
            Err(FixtureError::ConstraintViolation(_))
        ));
        assert!(session.registry().is_empty(&"posts".into()));
        assert_eq!(session.repository().row_count(&"posts".into()).unwrap(), 0);
    }

    #[test]
    fn constant_rule_exhausts_assignment_attempts() {
        let config = SessionConfig::new().assignment_attempt_limit(3);
        let mut session = FixtureSession::with_config(catalog(), config).unwrap();
        session.register_key_assignment_rule("users", |user, _| {
            user.set("id", 1i64);
            Ok(())
        });

        session.generate("users").unwrap();
        match session.generate("users") {
            Err(FixtureError::KeySpaceExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("Expected KeySpaceExhausted, got {:?}", other),
        }
    }

    #[test]
    fn failed_commit_leaves_no_pending_changes() {
        let mut session = session();
        session.generate("users").unwrap();

        let result = session.generate_with("posts", |post| {
            post.set("id", 10i64);
            post.set("user_id", 99i64);
        });
        assert!(matches!(result, Err(FixtureError::ConstraintViolation(_))));

        session.generate("posts").unwrap();
        assert_eq!(session.repository().row_count(&"posts".into()).unwrap(), 1);
    }

    #[test]
    fn with_config_validates() {
        let config = SessionConfig::new().key_attempt_limit(0);
        assert!(matches!(
            FixtureSession::with_config(catalog(), config),
            Err(FixtureError::InvalidConfig(_))
        ));

        let session = FixtureSession::with_config(catalog(), SessionConfig::new().instance_name("t1")).unwrap();
        assert_eq!(session.instance_name(), "t1");
        assert!(format!("{:?}", session).contains("t1"));
    }
}
