//! # In-Memory Backends
//!
//! Process-local implementations of the storage traits. They back the test
//! suites and single-node deployments (`backend = "memory"`). Several
//! simulated nodes can share one set of stores and one lock registry by
//! cloning the handles.

mod entity;
mod index;
mod lock;

pub use entity::MemoryEntityStore;
pub use index::MemorySpatialIndex;
pub use lock::{MemoryLock, MemoryLockRegistry};
