//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired into the worker.
//! The store, broker, analysis services and push transport are external
//! collaborators; only their narrow contracts live here.

pub mod analysis;
pub mod broker;
pub mod event_sink;
pub mod push;
pub mod scheduling;
pub mod store;

pub use analysis::*;
pub use broker::*;
pub use event_sink::*;
pub use push::*;
pub use scheduling::*;
pub use store::*;
