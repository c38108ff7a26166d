//! Session event bus.
//!
//! This crate provides the in-process event system the session engine
//! publishes its lifecycle on:
//!
//! - [`EventBus`] — publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`SessionEvent`] — the canonical session event envelope.
//! - [`bus::names`] — the event names the engine emits.

pub mod bus;

pub use bus::{EventBus, SessionEvent};
