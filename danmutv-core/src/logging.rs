//! Tracing subscriber setup.

use anyhow::Context;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Output goes to stderr,
/// or is appended to `logging.file_path` when configured; `logging.format`
/// picks human-readable output or JSON lines.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&config.level)?,
    };

    let writer = match &config.file_path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {path}"))?;
            BoxMakeWriter::new(std::sync::Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().pretty().with_writer(writer).with_target(true))
            .init();
    }

    Ok(())
}

/// The configured level must be one of the five tracing levels.
fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let level = level.to_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => anyhow::bail!("invalid logging.level {other:?}"),
    }
    EnvFilter::try_new(&level).with_context(|| format!("building filter for level {level:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_five_levels() {
        for level in ["trace", "debug", "info", "WARN", "error"] {
            assert!(build_filter(level).is_ok(), "level {level} rejected");
        }
    }

    #[test]
    fn rejects_unknown_levels() {
        assert!(build_filter("verbose").is_err());
        assert!(build_filter("").is_err());
    }
}
