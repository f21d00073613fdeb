//! In-process adapters: the default when no database or Redis is configured.

pub mod broker;
pub mod lock;
pub mod store;

pub use broker::{DeadLetter, InMemoryBroker};
pub use lock::InMemoryJobLock;
pub use store::InMemoryStore;
