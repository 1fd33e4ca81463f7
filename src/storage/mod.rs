pub mod memory;
pub mod repository;
pub mod table;

pub use memory::InMemoryRepository;
pub use repository::Repository;
pub use table::Table;
