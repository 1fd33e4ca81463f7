pub mod registry;
pub mod rules;
pub mod seeder;

pub use registry::{KeyRegistry, RegistryCheckpoint};
pub use rules::{KeyAssignmentRule, KeyAssignmentRules};
pub use seeder::KeySeeder;
