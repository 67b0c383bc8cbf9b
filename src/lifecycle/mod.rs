//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     config → logger → metrics registry → cache → claim mapping
//!         → decoder composition → listener bind → routes
//!
//! Shutdown (shutdown.rs):
//!     ListenerHandle::close → stop accepting → drain → completion signalled
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → close the listener
//! ```
//!
//! # Design Decisions
//! - Startup is sequential; the first fatal error aborts the rest
//! - Degraded conditions (one claim source, unreachable JWKS) are logged, not fatal
//! - Listeners start last (traffic only when ready)

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{ListenerHandle, Shutdown};
pub use startup::{compose, start, StartupError};
