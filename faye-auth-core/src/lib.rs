//! Faye Auth Core - Message types, authorization policy and shared infrastructure
//!
//! This crate holds everything the authentication gate builds on: the Bayeux
//! message model, the whitelist-driven authorization policy, collaborator
//! traits, configuration, errors and logging.

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod policy;
pub mod traits;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use policy::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio;
pub use tracing;
