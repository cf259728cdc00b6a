//! Logging initialisation via tracing-subscriber, with an optional Sentry
//! layer.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("invalid log level '{0}': {1}")]
    InvalidLevel(String, String),
    #[error("failed to set subscriber: {0}")]
    Subscriber(String),
}

/// Keeps the Sentry client alive; events are flushed when it is dropped.
pub struct LoggingGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// `RUST_LOG` takes precedence over the configured level.
fn filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => parse(&directives),
        _ => parse(level),
    }
}

fn parse(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives)
        .map_err(|e| LoggingError::InvalidLevel(directives.to_string(), e.to_string()))
}

pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let sentry = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });
    let sentry_layer = sentry
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter(&config.level)?)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_layer)
        .try_init()
        .map_err(|e| LoggingError::Subscriber(e.to_string()))?;

    Ok(LoggingGuard { _sentry: sentry })
}
