use std::sync::Once;

/// Filter used when neither the config nor the environment names one.
/// Runtime chatter at info, device status messages only from warnings up.
const DEFAULT_FILTER: &str = "info,anvil::status=warn";

/// Environment variables consulted for a filter, first match wins.
const FILTER_VARS: [&str; 2] = ["ANVIL_LOG", "RUST_LOG"];

/// How a host or tool wants the runtime's `log` output rendered.
///
/// `filter` uses `env_logger` directives, e.g. `"anvil_device=debug"` to
/// trace handle churn or `"anvil::status=info"` to see every status message
/// a device emits.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    pub color: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: None, color: env_logger::WriteStyle::Auto }
    }
}

/// Picks the active filter: `explicit`, else the first set variable in
/// [`FILTER_VARS`], else [`DEFAULT_FILTER`].
fn resolve_filter(explicit: Option<String>, lookup: impl Fn(&str) -> Option<String>) -> String {
    explicit
        .or_else(|| FILTER_VARS.iter().find_map(|var| lookup(var)))
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned())
}

static INIT: Once = Once::new();

/// Installs an `env_logger` backend for the anvil runtime, at most once per
/// process.
///
/// Hosts with their own `log` backend skip this; the runtime only writes to
/// the facade. `anvilNewLibrary` calls it with the default config.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = resolve_filter(config.filter, |var| std::env::var(var).ok());
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&filter).write_style(config.color);

        if builder.try_init().is_err() {
            log::debug!("a logger is already installed; anvil output goes through it");
            return;
        }
        log::debug!("anvil logging on (filter '{filter}')");
    });
}
