use crate::core::{FixtureError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What `generate_many` does with already committed entities when a later
/// iteration fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Each entity is committed on its own; earlier entities stay.
    #[default]
    PerEntity,
    /// The whole batch is rolled back, key registry included.
    Atomic,
}

/// Fixture session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the in-memory store backing the session
    pub instance_name: String,

    /// RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,

    /// Sampling cap for `KeySeeder::unique_random_key`
    pub key_attempt_limit: usize,

    /// Cap on rule invocations while looking for a free key
    pub assignment_attempt_limit: usize,

    pub batch_mode: BatchMode,

    /// Maximum fake children placed in a generated collection navigation
    pub collection_fill: usize,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            instance_name: Uuid::new_v4().to_string(),
            seed: None,
            key_attempt_limit: 1000,
            assignment_attempt_limit: 1000,
            batch_mode: BatchMode::PerEntity,
            collection_fill: 2,
        }
    }

    /// Set the instance name
    pub fn instance_name(mut self, name: &str) -> Self {
        self.instance_name = name.to_string();
        self
    }

    /// Set the RNG seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn key_attempt_limit(mut self, limit: usize) -> Self {
        self.key_attempt_limit = limit;
        self
    }

    pub fn assignment_attempt_limit(mut self, limit: usize) -> Self {
        self.assignment_attempt_limit = limit;
        self
    }

    pub fn batch_mode(mut self, mode: BatchMode) -> Self {
        self.batch_mode = mode;
        self
    }

    pub fn collection_fill(mut self, fill: usize) -> Self {
        self.collection_fill = fill;
        self
    }

    /// Parse from JSON; missing fields take their defaults.
    ///
    /// ```
    /// use memofixture::{BatchMode, SessionConfig};
    ///
    /// let config = SessionConfig::from_json(r#"{"seed": 7, "batch_mode": "atomic"}"#).unwrap();
    /// assert_eq!(config.seed, Some(7));
    /// assert_eq!(config.batch_mode, BatchMode::Atomic);
    /// assert_eq!(config.key_attempt_limit, 1000);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.instance_name.is_empty() {
            return Err(FixtureError::InvalidConfig("instance_name cannot be empty".into()));
        }

        if self.key_attempt_limit == 0 {
            return Err(FixtureError::InvalidConfig("key_attempt_limit must be > 0".into()));
        }

        if self.assignment_attempt_limit == 0 {
            return Err(FixtureError::InvalidConfig(
                "assignment_attempt_limit must be > 0".into(),
            ));
        }

        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
