//! Snapshot Persistence Adapters
//!
//! Implementations of the `SnapshotStore` port.

mod file;
mod in_memory;

pub use file::FileSnapshotStore;
pub use in_memory::InMemorySnapshotStore;
