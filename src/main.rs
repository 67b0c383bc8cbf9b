//! JWT decode sidecar (v1)
//!
//! A forward-auth service built with Tokio and Axum. The fronting proxy sends
//! every request here first; a 200 response carries the token's mapped claims
//! as headers, which the proxy copies onto the upstream request.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────────┐
//!                        │                  DECODE SIDECAR                    │
//!                        │                                                   │
//!   Forward-auth request │  ┌──────────┐   ┌───────────┐   ┌──────────────┐  │
//!   ─────────────────────┼─▶│  http    │──▶│ latency + │──▶│    decode    │  │
//!                        │  │  server  │   │  logging  │   │   handler    │  │
//!                        │  └──────────┘   └───────────┘   └──────┬───────┘  │
//!                        │                                        │          │
//!                        │                                        ▼          │
//!                        │                 ┌──────────┐   ┌──────────────┐   │
//!                        │                 │  token   │◀──│ cached       │   │
//!                        │                 │  cache   │   │ decoder (opt)│   │
//!                        │                 └──────────┘   └──────┬───────┘   │
//!                        │                                        ▼          │
//!   200 + claim headers  │                                ┌──────────────┐   │      JWKS
//!   ◀────────────────────┼────────────────────────────────│ jws decoder  │◀──┼───── endpoint
//!                        │                                └──────────────┘   │
//!                        │  ┌─────────────────────────────────────────────┐  │
//!                        │  │            Cross-Cutting Concerns            │  │
//!                        │  │  config (env)   observability   lifecycle    │  │
//!                        │  └─────────────────────────────────────────────┘  │
//!                        └───────────────────────────────────────────────────┘
//! ```

use tracing::instrument::WithSubscriber;

use token_decode_sidecar::config::{load_config, Environment};
use token_decode_sidecar::lifecycle::{signals::shutdown_signal, start};
use token_decode_sidecar::observability::logging::build_logger;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&Environment::from_process())?;
    let logger = build_logger(&config.logging);
    let scoped = logger.clone();

    async move {
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "token-decode-sidecar starting");

        let (mut completion, listener) = start(config, logger).await?;

        let result = tokio::select! {
            result = &mut completion => result,
            _ = shutdown_signal() => {
                listener.close();
                completion.await
            }
        };

        match result {
            Ok(served) => served?,
            Err(_) => tracing::warn!("serve task ended without reporting"),
        }

        tracing::info!("Shutdown complete");
        Ok::<(), Box<dyn std::error::Error>>(())
    }
    .with_subscriber(scoped)
    .await
}
