//! [`StorageEngine`](super::StorageEngine) implementations.
//!
//! [`MemoryStorage`] for tests and ephemeral data; [`RedbEngine`] for data
//! that must survive restarts (feature `redb`, on by default).

mod memory;
#[cfg(feature = "redb")]
mod redb_engine;

pub use memory::{MemoryEngine, MemoryStorage};
#[cfg(feature = "redb")]
pub use redb_engine::RedbEngine;
