//! Logger bootstrap for hosts.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs `env_logger` with `default_filter` unless `RUST_LOG` is set.
/// Later calls, and calls after another logger was installed, do nothing.
pub fn init_logging(default_filter: &str) {
    INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or(default_filter);
        if let Err(err) = env_logger::Builder::from_env(env).format_timestamp_millis().try_init() {
            eprintln!("logger already installed: {err}");
        }
    });
}
