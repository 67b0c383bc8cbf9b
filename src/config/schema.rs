//! Configuration schema definitions.
//!
//! This module declares every environment variable the sidecar reads and the
//! resolved, immutable configuration produced from them.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use url::Url;

use crate::config::env::EnvVar;
use crate::config::ConfigError;

pub const JWKS_URL: EnvVar = EnvVar::required("JWKS_URL");
pub const FORCE_JWKS_ON_START: EnvVar = EnvVar::with_default("FORCE_JWKS_ON_START", "true");
pub const CLAIM_MAPPING_FILE_PATH: EnvVar =
    EnvVar::with_default("CLAIM_MAPPING_FILE_PATH", "config.json");
pub const AUTH_HEADER_KEY: EnvVar = EnvVar::with_default("AUTH_HEADER_KEY", "Authorization");
pub const TOKEN_VALIDATED_HEADER_KEY: EnvVar =
    EnvVar::with_default("TOKEN_VALIDATED_HEADER_KEY", "jwt-token-validated");
pub const MULTI_CLUSTER_PREFIX: EnvVar =
    EnvVar::with_default("MULTI_CLUSTER_PREFIX", "multicluster");
pub const SECRET_CACHE_TTL: EnvVar = EnvVar::with_default("SECRET_CACHE_TTL", "300");
pub const PORT: EnvVar = EnvVar::with_default("PORT", "8080");
pub const LOG_LEVEL: EnvVar = EnvVar::with_default("LOG_LEVEL", "info");
pub const LOG_TYPE: EnvVar = EnvVar::with_default("LOG_TYPE", "json");
pub const MAX_CACHE_KEYS: EnvVar = EnvVar::with_default("MAX_CACHE_KEYS", "10000");
pub const CACHE_ENABLED: EnvVar = EnvVar::with_default("CACHE_ENABLED", "true");
pub const CLAIM_MAPPINGS: EnvVar = EnvVar::optional("CLAIM_MAPPINGS");
pub const OIDC_USERNAME_CLAIM: EnvVar =
    EnvVar::with_default("OIDC_USERNAME_CLAIM", "preferred_username");
pub const VALIDATE_API_PATHS: EnvVar = EnvVar::with_default(
    "VALIDATE_API_PATHS",
    "/api/prometheus/,/api/prometheus-tenancy/,/api/alertmanager/,/api/hypercloud/,/api/multi-hypercloud/",
);

/// Cost charged per cached token.
pub const KEY_COST: i64 = 100;

/// Fallback for an unparseable `SECRET_CACHE_TTL`.
pub const DEFAULT_SECRET_CACHE_TTL_SECS: i64 = 300;

/// Root configuration for the sidecar.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    /// JWKS endpoint the decoder fetches signing keys from.
    pub jwks_url: Url,

    /// Whether a boot-time JWKS failure is reported as a server problem.
    pub force_jwks_on_start: bool,

    /// Claim mapping sources.
    pub claims: ClaimSourcesConfig,

    /// Decode endpoint settings.
    pub decode: DecodeConfig,

    /// Settings for the Kubernetes secret lookup.
    pub cluster: ClusterConfig,

    /// Port the listener binds on all interfaces.
    pub port: u16,

    /// Logger construction settings.
    pub logging: LogSettings,

    /// Token cache settings.
    pub cache: CacheConfig,

    /// Per-key cache cost.
    pub key_cost: i64,
}

impl SidecarConfig {
    /// Loggable view of the resolved settings.
    pub fn summary(&self) -> ConfigSummary<'_> {
        ConfigSummary {
            jwks_url: self.jwks_url.as_str(),
            force_jwks_on_start: self.force_jwks_on_start,
            claim_mapping_file: &self.claims.file_path,
            port: self.port,
            log_type: self.logging.format,
            log_level: self.logging.level.to_string(),
            decode: &self.decode,
            cluster: &self.cluster,
            cache: self.cache,
        }
    }
}

/// Serializable snapshot of [`SidecarConfig`], logged once at startup.
#[derive(Debug, Serialize)]
pub struct ConfigSummary<'a> {
    pub jwks_url: &'a str,
    pub force_jwks_on_start: bool,
    pub claim_mapping_file: &'a Path,
    pub port: u16,
    pub log_type: LogType,
    pub log_level: String,
    pub decode: &'a DecodeConfig,
    pub cluster: &'a ClusterConfig,
    pub cache: CacheConfig,
}

/// Where claim mappings are read from.
#[derive(Debug, Clone)]
pub struct ClaimSourcesConfig {
    /// Path to a flat JSON object of claim → header.
    pub file_path: PathBuf,

    /// Inline `claim:header,...` mappings; empty when unset.
    pub inline: String,
}

/// Settings consumed by the decode handler.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeConfig {
    /// Request header carrying the bearer token.
    pub auth_header: String,

    /// Response header reporting whether the token was validated.
    pub token_validated_header: String,

    /// Claim whose value identifies the user in request logs.
    pub username_claim: String,

    /// Path prefixes that require validation; empty means every path.
    pub validate_api_paths: Vec<String>,
}

/// Multi-cluster secret lookup settings.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterConfig {
    pub multi_cluster_prefix: String,
    /// Kept unparsed; a bad value degrades to the default instead of aborting.
    pub secret_cache_ttl: String,
}

impl ClusterConfig {
    /// Secret cache TTL in seconds.
    pub fn secret_cache_ttl_secs(&self) -> Result<i64, ConfigError> {
        self.secret_cache_ttl
            .parse()
            .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                name: SECRET_CACHE_TTL.name,
                value: self.secret_cache_ttl.clone(),
                reason: e.to_string(),
            })
    }
}

/// Token cache settings.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Validated against [`KEY_COST`] when the cache is built.
    pub max_keys: i64,
}

/// Logger construction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub format: LogType,
    pub level: LevelFilter,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Json,
    Pretty,
}

impl FromStr for LogType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(format!("unknown logger type {other}")),
        }
    }
}

/// Parse a log level name.
///
/// Accepts `fatal` and `panic` as aliases of `error`, and `disabled` for no output.
pub fn parse_level(s: &str) -> Result<LevelFilter, String> {
    match s {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" | "fatal" | "panic" => Ok(LevelFilter::ERROR),
        "disabled" => Ok(LevelFilter::OFF),
        other => Err(format!("unknown level {other}")),
    }
}

/// Split a comma separated list, dropping empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
