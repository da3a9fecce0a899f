use crate::Environment;
use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Default filters when `RUST_LOG` is not set and the caller passes none.
const DEVELOPMENT_FILTER: &str = "debug";
const PRODUCTION_FILTER: &str = "info";

/// Install color-eyre with a project-standard configuration.
///
/// Call this early in main() before any fallible operations. Safe to call
/// multiple times.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Initialize tracing with environment-aware configuration and error span capture.
///
/// - **Production** (`APP_ENV=production`): JSON lines, no targets.
/// - **Development** (default): pretty, human-readable output.
///
/// Logs go to stderr; stdout is reserved for command results (summaries,
/// JSON status). `RUST_LOG` overrides the default filter.
///
/// Safe to call multiple times: a second initialization is skipped.
pub fn init_tracing(environment: &Environment) {
    init_tracing_with_filter(environment, None);
}

/// Like [`init_tracing`], with a default filter chosen by the application, used
/// when `RUST_LOG` is not set.
pub fn init_tracing_with_filter(environment: &Environment, default_filter: Option<&str>) {
    let is_production = environment.is_production();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(environment, default_filter)));

    let result = if is_production {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    match result {
        Ok(_) => {
            info!(environment = ?environment, "Tracing initialized");
        }
        Err(_) => {
            // Already initialized (common in tests)
            debug!("Tracing already initialized, skipping re-initialization");
        }
    }
}

fn default_directives<'a>(environment: &Environment, default_filter: Option<&'a str>) -> &'a str {
    match default_filter {
        Some(filter) => filter,
        None if environment.is_production() => PRODUCTION_FILTER,
        None => DEVELOPMENT_FILTER,
    }
}
