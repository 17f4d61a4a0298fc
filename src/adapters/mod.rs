//! Reference implementations of the ports: in-memory storage and
//! coordination for single-process use, filesystem storage for single-host
//! deployments.

pub mod fs;
pub mod memory;

pub use fs::FsStorage;
pub use memory::{MemoryCoordinator, MemoryStorage};
