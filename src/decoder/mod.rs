//! Token decoding subsystem.
//!
//! # Data Flow
//! ```text
//! bearer token
//!     → cached.rs (optional: lookup in cache.rs, miss delegates inward)
//!     → jws.rs (JWKS lookup, signature + expiry validation)
//!     → claim projection onto header names
//!     → DecodedToken
//! ```
//!
//! # Design Decisions
//! - One capability, [`TokenDecoder`], with a raw and a caching implementation
//! - The implementation is chosen once at startup and held as a trait object
//! - Only successful decodes are cached

pub mod cache;
pub mod cached;
pub mod jws;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;

pub use cache::{CacheBudget, CacheConfigError, CacheStats, TokenCache};
pub use cached::CachedDecoder;
pub use jws::{JwsDecoder, MIN_REFRESH_INTERVAL};

/// Turns a bearer token into a header projection.
#[async_trait]
pub trait TokenDecoder: Send + Sync {
    async fn decode(&self, token: &str) -> Result<Arc<DecodedToken>, DecodeError>;
}

/// A validated token projected onto outbound headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedToken {
    /// Header name → claim value.
    pub headers: BTreeMap<String, String>,
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: u64,
    /// Value of the configured username claim, if present.
    pub username: Option<String>,
}

impl DecodedToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_now()
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Errors that can occur while decoding a token.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The JWKS endpoint could not be fetched or parsed.
    #[error("unable to fetch key set from {url}: {source}")]
    KeySetUnavailable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// No key set is loaded and the last refetch was too recent to retry.
    #[error("key set refresh throttled, retry in {retry_in:?}")]
    RefreshThrottled { retry_in: Duration },

    /// No key in the key set can verify the token.
    #[error("no key found for kid {kid:?}")]
    UnknownKey { kid: Option<String> },

    /// The token is malformed, badly signed, or fails claim validation.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}
