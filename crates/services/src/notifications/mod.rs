//! # Notifications
//!
//! The facade turns domain events into notification batches; the delivery
//! worker persists each batch and pushes it to the recipients' connections.

pub mod delivery;
pub mod facade;

pub use delivery::{notification_channel, DeliveryWorker, NotificationReceiver, NotificationSender};
pub use facade::NotificationFacade;
