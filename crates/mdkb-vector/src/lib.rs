//! Vector store implementations: LanceDB on disk and an in-memory store.
#![deny(unused_imports)]

pub mod lance;
pub mod memory;
pub mod schema;

pub use lance::LanceStore;
pub use memory::MemoryStore;
