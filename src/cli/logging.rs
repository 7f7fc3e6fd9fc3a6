//! Process-wide tracing subscriber for the binary

use std::sync::Once;

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

#[derive(Clone, Debug)]
pub struct LogConfig {
    /// A level like "info" or a full filter such as "info,tabload=debug".
    /// `RUST_LOG` takes precedence when set.
    pub level: Option<String>,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Some("info".to_owned()),
            json: false,
        }
    }
}

/// Install the subscriber. Later calls are no-ops.
///
/// Logs go to stderr so stdout stays free for command output.
pub fn init(cfg: &LogConfig) {
    INIT.call_once(|| {
        let level = cfg.level.clone().unwrap_or_else(|| "info".into());
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let fmt_layer = if cfg.json {
            fmt::layer()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .boxed()
        };

        // Another subscriber may already be installed (tests, embedding).
        let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
    });
}
