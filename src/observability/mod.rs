//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Startup and request handling produce:
//!     → logging.rs (structured events through an explicit Dispatch)
//!     → metrics.rs (latency histogram, scrape-time cache gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON or pretty)
//!     → Metrics endpoint (Prometheus scrape of /metrics)
//! ```
//!
//! # Design Decisions
//! - No global logger or recorder; both are owned by the composition root
//! - Request ID flows into every request span
//! - Cache gauges read live counters at scrape time

pub mod logging;
pub mod metrics;
