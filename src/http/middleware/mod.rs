//! Decode endpoint middleware.
//!
//! Applied outer → inner:
//! 1. `latency.rs`: request duration histogram
//! 2. `logging.rs`: request span and logger injection

pub mod latency;
pub mod logging;

pub use latency::observe_latency;
pub use logging::inject_logging_context;
