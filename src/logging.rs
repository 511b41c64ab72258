/// tracing subscriber setup
///
/// Everything goes to stderr: stdout is the MCP JSON-RPC channel when serving
/// and the JSON response when `search`/`rag` run from the CLI. `log_format`
/// picks pretty or JSON lines; `auto` decides by whether stderr is a terminal.
/// `RUST_LOG` overrides `log_level` when set.

use std::io::IsTerminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Whether to emit JSON lines for the configured format.
fn wants_json(log_format: &str, stderr_is_terminal: bool) -> bool {
    match log_format {
        "json" => true,
        "pretty" => false,
        _ => !stderr_is_terminal,
    }
}

pub fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let is_terminal = std::io::stderr().is_terminal();
    let registry = tracing_subscriber::registry().with(env_filter);

    if wants_json(&config.log_format, is_terminal) {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
                    .with_current_span(false),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(is_terminal),
            )
            .init();
    }
}
