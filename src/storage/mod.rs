pub mod collection;
pub mod memory;
pub mod persistence;

pub use collection::Collection;
pub use memory::InMemoryDocumentStore;
pub use persistence::{CollectionSnapshot, DurabilityMode, SnapshotManager};
