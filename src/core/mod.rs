pub mod error;
pub mod types;
pub mod value;

pub use error::{FixtureError, Result};
pub use types::{Entity, EntityTypeId, KeySlot, KeyState, KeyTuple, Navigation};
pub use value::{DataType, Value};
