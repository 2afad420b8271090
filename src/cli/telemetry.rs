//! Tracing subscriber setup for the CLI.
//!
//! Verbosity comes from `-v` counts or `SESAMO_LOG_LEVEL`; `RUST_LOG` takes
//! precedence when set so operators can filter per-target.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the global tracing subscriber.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init(level: Option<tracing::Level>) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => {
            let level = level.map_or("error", level_directive);
            EnvFilter::new(level)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;

    Ok(())
}

fn level_directive(level: tracing::Level) -> &'static str {
    if level == tracing::Level::TRACE {
        "trace"
    } else if level == tracing::Level::DEBUG {
        "debug"
    } else if level == tracing::Level::INFO {
        "info"
    } else if level == tracing::Level::WARN {
        "warn"
    } else {
        "error"
    }
}

#[cfg(test)]
mod tests {
    use super::level_directive;

    #[test]
    fn level_directive_matches_level_names() {
        assert_eq!(level_directive(tracing::Level::ERROR), "error");
        assert_eq!(level_directive(tracing::Level::WARN), "warn");
        assert_eq!(level_directive(tracing::Level::INFO), "info");
        assert_eq!(level_directive(tracing::Level::DEBUG), "debug");
        assert_eq!(level_directive(tracing::Level::TRACE), "trace");
    }
}
