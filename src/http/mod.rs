//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, route dispatch)
//!         /metrics → exposition text
//!         /ping    → 200
//!         *        → middleware/latency.rs
//!                    → middleware/logging.rs
//!                    → decode.rs (token → claim headers)
//!     → Send to client
//! ```

pub mod decode;
pub mod middleware;
pub mod server;

pub use server::{AppState, BindError, HttpServer, ServeCompletion};
