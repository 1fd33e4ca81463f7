use super::FakeValueProvider;
use crate::core::{DataType, Entity, EntityTypeId, Navigation, Result, Value};
use crate::schema::{EntityDescriptor, NavigationKind, SchemaModel};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use uuid::Uuid;

const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "labore", "dolore", "magna", "aliqua", "enim", "minim",
    "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi", "aliquip",
];

/// 2000-01-01T00:00:00Z
const EPOCH_START: i64 = 946_684_800;
/// Ten years, in seconds.
const TIMESTAMP_SPAN: i64 = 315_360_000;

/// Fills every declared field with a random value of its type.
///
/// Reference navigations get a shallow fake of their target and collections
/// up to `collection_fill` of them. Shallow fakes carry no navigations.
#[derive(Debug)]
pub struct RandomValueProvider {
    rng: StdRng,
    collection_fill: usize,
}

impl RandomValueProvider {
    pub fn new(seed: Option<u64>, collection_fill: usize) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            collection_fill,
        }
    }

    pub fn value_for(&mut self, data_type: &DataType) -> Value {
        match data_type {
            DataType::Integer => Value::Integer(self.rng.gen_range(1..=1_000_000)),
            DataType::Float => Value::Float(self.rng.gen_range(0.0..10_000.0)),
            DataType::Text => {
                let count = self.rng.gen_range(1..=4);
                let words: Vec<&str> = (0..count)
                    .filter_map(|_| WORDS.choose(&mut self.rng).copied())
                    .collect();
                Value::Text(words.join(" "))
            }
            DataType::Boolean => Value::Boolean(self.rng.gen_bool(0.5)),
            DataType::Uuid => {
                let mut bytes = [0u8; 16];
                self.rng.fill(&mut bytes);
                // Version 4, RFC 4122 variant
                bytes[6] = (bytes[6] & 0x0f) | 0x40;
                bytes[8] = (bytes[8] & 0x3f) | 0x80;
                Value::Uuid(Uuid::from_bytes(bytes))
            }
            DataType::Timestamp => {
                let offset = self.rng.gen_range(0..TIMESTAMP_SPAN);
                let start = DateTime::<Utc>::from_timestamp(EPOCH_START, 0).unwrap_or_default();
                Value::Timestamp(start + Duration::seconds(offset))
            }
        }
    }

    fn shallow(&mut self, descriptor: &EntityDescriptor) -> Entity {
        let mut entity = descriptor.blank();
        for field in descriptor.fields() {
            let value = self.value_for(&field.data_type);
            entity.set(&field.name, value);
        }
        entity
    }
}

impl FakeValueProvider for RandomValueProvider {
    fn blank(&mut self, schema: &dyn SchemaModel, entity_type: &EntityTypeId) -> Result<Entity> {
        let descriptor = schema.descriptor(entity_type)?;
        let mut entity = self.shallow(descriptor);

        for navigation in descriptor.navigations() {
            let target = schema.descriptor(&navigation.target)?;
            let value = match navigation.kind {
                NavigationKind::Reference => {
                    Navigation::Reference(Some(Box::new(self.shallow(target))))
                }
                NavigationKind::Collection => {
                    let count = self.rng.gen_range(0..=self.collection_fill);
                    Navigation::Collection((0..count).map(|_| self.shallow(target)).collect())
                }
            };
            entity.set_navigation(navigation.name.clone(), value);
        }

        Ok(entity)
    }
}
