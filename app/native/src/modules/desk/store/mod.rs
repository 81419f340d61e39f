//! Document store adapter.
//!
//! - [`DocumentStore`] - the contract the desk consumes
//! - [`MemoryStore`] - sharded in-memory adapter with JSON snapshots

mod memory;
mod traits;

pub use memory::MemoryStore;
pub use traits::{
    AvatarChange, AvatarPatch, DocumentStore, GeometryPatch, Provenance, StoreError, WriteMeta,
};
