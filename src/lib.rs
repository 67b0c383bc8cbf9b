//! Forward-auth sidecar that decodes bearer tokens and projects claims into headers.

pub mod config;
pub mod decoder;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::SidecarConfig;
pub use http::HttpServer;
pub use lifecycle::{ListenerHandle, Shutdown};
