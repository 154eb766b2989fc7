//! Security module
//!
//! OS keyring integration for provider API keys, with environment-variable
//! fallback for containerized deployments.

pub mod keys;

pub use keys::{delete_provider_key, provider_key, set_provider_key, KNOWN_PROVIDERS};
