#![deny(warnings)]

//! Persistence layer: blob stores and versioned game-state snapshots.

pub mod snapshot;
pub mod store;

pub use snapshot::{
    decode, encode, load_or_default, merge_json, save, SnapshotError, MIN_COMPATIBLE_VERSION,
    SAVE_VERSION,
};
pub use store::{BlobStore, FileStore, MemoryStore, StoreError};
