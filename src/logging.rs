use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialise logging. The level is `info`, or `debug` when `debug` is set
/// (in which case `RUST_LOG` may override it).
///
/// With `log_file` the output is appended to that file instead of stderr.
/// Only the first call installs a subscriber; the return value says whether
/// this call did.
pub fn init(debug: bool, log_file: Option<&Path>) -> bool {
    // Checked up front so a losing call never creates its log file.
    if tracing::dispatcher::has_been_set() {
        return false;
    }

    // When debug logging is disabled we force `info` level regardless of the
    // `RUST_LOG` environment variable.
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let file = log_file.and_then(|path| {
        let name = path.file_name()?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        Some(tracing_appender::rolling::never(dir, name))
    });
    match file {
        Some(appender) => builder
            .with_writer(appender)
            .with_ansi(false)
            .try_init()
            .is_ok(),
        None => builder.try_init().is_ok(),
    }
}
