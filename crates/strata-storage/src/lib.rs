//! strata-storage: where encrypted chunks live
//!
//! The tree, dictionary, and collection layers only see the `ChunkStorage`
//! contract. Backends:
//! - `MemoryChunkStorage`: process-local map, used by tests and `backend = "memory"`
//! - `OpendalChunkStorage`: any OpenDAL operator (fs, memory), sharded key layout

pub mod backend;
pub mod health;
pub mod memory;
pub mod opendal_store;
pub mod operator;
pub mod paths;

pub use backend::ChunkStorage;
pub use health::check_health;
pub use memory::MemoryChunkStorage;
pub use opendal_store::OpendalChunkStorage;
pub use operator::{build_operator, open_storage};
pub use paths::{address_from_path, chunk_path};
