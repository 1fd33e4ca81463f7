pub mod catalog;
pub mod descriptor;
pub mod model;
pub mod resolver;

pub use catalog::Catalog;
pub use descriptor::{EntityDescriptor, FieldDef, ForeignKey, NavigationDef, NavigationKind};
pub use model::SchemaModel;
pub use resolver::{DependencyEdge, DependencyResolver};
