//! Structured logging.
//!
//! # Responsibilities
//! - Build the process logger from `LOG_TYPE` and `LOG_LEVEL`
//! - Hand it out as an explicit [`Dispatch`] rather than a global default
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - File and line are attached to every event
//! - Callers scope the dispatch with `WithSubscriber` or `dispatcher::with_default`

use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, Layer, Registry};

use crate::config::schema::{LogSettings, LogType};

/// Build a logger writing to stdout.
pub fn build_logger(settings: &LogSettings) -> Dispatch {
    build_logger_with_writer(settings, std::io::stdout)
}

/// Build a logger writing to an arbitrary sink.
pub fn build_logger_with_writer<W>(settings: &LogSettings, writer: W) -> Dispatch
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let format: Box<dyn Layer<Registry> + Send + Sync> = match settings.format {
        LogType::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(writer)
            .boxed(),
        LogType::Pretty => fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_writer(writer)
            .boxed(),
    };

    let subscriber = Registry::default().with(format).with(settings.level);
    Dispatch::new(subscriber)
}
