pub mod batch;
pub mod config;
pub mod session;

pub use config::{BatchMode, SessionConfig};
pub use session::FixtureSession;
