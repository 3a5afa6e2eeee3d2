//! Layered storage for the record store.
//!
//! - **Layer 1** ([`StorageEngine`]): transactional key-value collections
//!   with secondary indexes and id sequences ([`MemoryEngine`], [`RedbEngine`])
//! - **Layer 2** ([`Connector`]): opens an engine for a configuration
//! - **Layer 3** ([`RecordStore`]): typed access, validation, lazy shared
//!   connection and the error taxonomy
//!
//! [`RedbEngine`]: engines::RedbEngine

pub mod connector;
pub mod engine;
pub mod engines;
pub mod record_store;
pub mod schema;

pub use connector::{connector_for, Connector, MemoryConnector};
#[cfg(feature = "redb")]
pub use connector::RedbConnector;
pub use engine::{EngineError, IndexEntry, StorageEngine};
pub use engines::{MemoryEngine, MemoryStorage};
pub use record_store::RecordStore;
pub use schema::{CollectionDef, Schema, SCHEMA_VERSION};
