//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → env.rs (snapshot, required/default/optional resolution)
//!     → loader.rs (typed, eager resolution)
//!     → SidecarConfig (immutable, owned by the composition root)
//!
//! claim mapping file + CLAIM_MAPPINGS
//!     → claims.rs (parse each source, merge, apply fallback policy)
//!     → ClaimMapping
//! ```
//!
//! # Design Decisions
//! - Environment is read once; everything downstream works on the snapshot
//! - Resolution returns typed errors; the composition root decides what is fatal
//! - Config is never mutated after startup

pub mod claims;
pub mod env;
pub mod loader;
pub mod schema;

use thiserror::Error;

pub use claims::{ClaimMapping, ClaimMappingError, ClaimMappingSource};
pub use env::{EnvVar, Environment};
pub use loader::load_config;
pub use schema::SidecarConfig;

/// Errors raised while resolving configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset and has no default.
    #[error("required key {name} not found in env")]
    MissingRequired { name: &'static str },

    /// A variable could not be converted to its typed value.
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}
