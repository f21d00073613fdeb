//! # Domain Models
//!
//! These structs represent the core entities of the content pipeline.
//! We use UUID v7 for time-ordered, globally unique identification.

pub mod content;
pub mod events;
pub mod messages;
pub mod moderation;
pub mod notification;
pub mod profile;

pub use content::*;
pub use events::*;
pub use messages::*;
pub use moderation::*;
pub use notification::*;
pub use profile::*;
