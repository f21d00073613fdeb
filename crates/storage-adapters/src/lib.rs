//! # storage-adapters
//!
//! Implementations of the persistence, broker and lock ports. The in-memory
//! adapters are always compiled; Postgres and Redis are feature-gated.

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis;

pub use memory::{DeadLetter, InMemoryBroker, InMemoryJobLock, InMemoryStore};
