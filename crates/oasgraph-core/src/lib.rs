//! Core configuration types for oasgraph
//!
//! This crate holds the translation options shared by the OpenAPI translator
//! and the server, plus the TOML configuration file loader.

pub mod config;
pub mod options;

// Re-exports
pub use config::{CredentialConfig, OasGraphConfig, ObservabilityConfig, ServerConfig};
pub use options::{OperationType, Options};
