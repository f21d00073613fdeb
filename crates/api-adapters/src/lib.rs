//! # api-adapters
//!
//! The outward surface of the worker: the connection hub that pushes stored
//! notifications to live clients, and (feature `web-axum`) the HTTP routes
//! for health, metrics and the notification stream.

pub mod hub;
#[cfg(feature = "web-axum")]
pub mod web;

pub use hub::{ConnectionHub, Subscription};
