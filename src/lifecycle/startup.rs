//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every component from the resolved configuration, in order
//! - Choose between the raw and the caching decoder, once
//! - Bind the listener and begin serving
//!
//! # Design Decisions
//! - Fail fast: configuration, claim mapping, cache sizing, metrics and bind errors abort startup
//! - An unreachable JWKS endpoint is only logged; the decoder refetches keys lazily
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use crate::config::claims::{self, ClaimMappingError};
use crate::config::schema::{ClusterConfig, DEFAULT_SECRET_CACHE_TTL_SECS};
use crate::config::{ClaimMapping, ConfigError, SidecarConfig};
use crate::decoder::{CacheBudget, CacheConfigError, CachedDecoder, JwsDecoder, TokenCache, TokenDecoder};
use crate::http::{AppState, BindError, HttpServer, ServeCompletion};
use crate::lifecycle::shutdown::ListenerHandle;
use crate::observability::metrics::{
    register_cache_metrics, register_request_histogram, MetricsError, MetricsRegistry, NAMESPACE,
};

/// Timeout for a single JWKS fetch.
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    ClaimMapping(#[from] ClaimMappingError),

    #[error(transparent)]
    Cache(#[from] CacheConfigError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error("failed to build JWKS client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Compose components and start serving.
///
/// Everything, including the spawned serve loop, logs through `logger`.
pub async fn start(
    config: SidecarConfig,
    logger: Dispatch,
) -> Result<(ServeCompletion, ListenerHandle), StartupError> {
    let scoped = logger.clone();
    async move {
        let state = compose(&config, logger).await?;
        let server = HttpServer::new(state);
        Ok::<_, StartupError>(server.start(config.port).await?)
    }
    .with_subscriber(scoped)
    .await
}

/// Build the application state: metrics, cache, claim mapping and decoder.
pub async fn compose(config: &SidecarConfig, logger: Dispatch) -> Result<AppState, StartupError> {
    match serde_json::to_string(&config.summary()) {
        Ok(settings) => tracing::info!(%settings, "configuration loaded"),
        Err(e) => tracing::warn!(error = %e, "unable to render configuration"),
    }

    let mut registry = MetricsRegistry::new(NAMESPACE)?;
    let request_latency = register_request_histogram(&registry)?;

    let cache = if config.cache.enabled {
        let budget = CacheBudget::new(config.cache.max_keys, config.key_cost)?;
        let cache = TokenCache::new(budget);
        register_cache_metrics(&mut registry, cache.stats())?;
        tracing::info!(
            max_keys = config.cache.max_keys,
            max_cost = budget.max_cost(),
            "token cache enabled"
        );
        Some(cache)
    } else {
        tracing::info!("token cache disabled");
        None
    };

    let claims = claims::resolve(&config.claims.file_path, &config.claims.inline)?;
    tracing::info!(
        source = ?claims.source,
        mappings = ?claims.mapping,
        "mappings from claim keys to header"
    );

    let decoder = compose_decoder(config, claims.mapping, cache).await?;
    log_cluster_settings(&config.cluster);

    Ok(AppState {
        decoder,
        decode: Arc::new(config.decode.clone()),
        metrics: Arc::new(registry),
        request_latency,
        logger,
    })
}

/// Build the JWKS decoder and wrap it in the cache when one is configured.
pub async fn compose_decoder(
    config: &SidecarConfig,
    mapping: ClaimMapping,
    cache: Option<TokenCache>,
) -> Result<Arc<dyn TokenDecoder>, StartupError> {
    let client = reqwest::Client::builder().timeout(JWKS_FETCH_TIMEOUT).build()?;
    let jws = JwsDecoder::new(
        config.jwks_url.clone(),
        mapping,
        config.decode.username_claim.clone(),
        client,
    );

    if let Err(e) = jws.refresh_keys().await {
        if config.force_jwks_on_start {
            tracing::warn!(error = %e, force_jwks_on_start = true, "auth server has a problem");
        } else {
            tracing::warn!(error = %e, force_jwks_on_start = false, "will try again");
        }
    }

    Ok(match cache {
        Some(cache) => Arc::new(CachedDecoder::new(cache, jws)),
        None => Arc::new(jws),
    })
}

fn log_cluster_settings(cluster: &ClusterConfig) {
    let secret_cache_ttl_secs = cluster.secret_cache_ttl_secs().unwrap_or_else(|e| {
        tracing::warn!(error = %e, fallback = DEFAULT_SECRET_CACHE_TTL_SECS, "unable to parse secret cache TTL");
        DEFAULT_SECRET_CACHE_TTL_SECS
    });
    tracing::info!(
        multi_cluster_prefix = %cluster.multi_cluster_prefix,
        secret_cache_ttl_secs,
        "cluster secret lookup settings"
    );
}
