//! HTTP integration with the collaborator backend.
//!
//! The session engine never speaks HTTP directly; it consumes the
//! [`gateway::ResponseGateway`] trait, implemented here by
//! [`api::PlatformApi`] over the backend's public REST endpoints.
//! `types` holds the wire DTOs plus the typed outcomes (registered vs
//! already submitted, saved vs conflict, distribution vs locked) that
//! the engine branches on.

pub mod api;
pub mod gateway;
pub mod types;

pub use api::{PlatformApi, PlatformApiError};
pub use gateway::ResponseGateway;
