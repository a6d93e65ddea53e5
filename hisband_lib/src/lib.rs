//! Supabase client bootstrap.
//!
//! Validates project credentials, builds a typed client handle with the derived
//! service endpoints, and publishes it in a [`Registry`] under the `supabase`
//! binding so other components can share one instance.

pub mod bootstrap;
pub mod client;
pub mod credentials;
pub mod error;
pub mod helpers;
pub mod secret;

pub use bootstrap::{
    client, global, initialize, key_warnings, KeyWarning, Registry, DEFAULT_BINDING,
};
pub use client::{create_client, Client, ClientOptions};
pub use credentials::{resolve_key, Credentials, KeySource};
pub use error::{ApiError, AuthError, ConfigError, Error};
pub use helpers::{inspect_key, parse_project_url, redact_key, KeyFormat, KeyInfo, ProjectKind};
pub use secret::Backend;

/// Library version for X-Client-Info and diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
