//! Client library for the remote generation service.
//!
//! Provides the [`GenerationService`](service::GenerationService) seam the
//! job tracker polls through, typed request payloads, and a `reqwest`
//! implementation of the dashboard (article) and SVD video endpoints.

pub mod api;
pub mod config;
pub mod requests;
pub mod service;
pub mod wire;

pub use api::GenerationApi;
pub use config::ClientConfig;
pub use service::{GenerationService, SubmitRequest};
