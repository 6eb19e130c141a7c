//! Per-process log files (spec §6: "Logs may be written to files named
//! `node_<port>.log` or `client_<port>.log`"). Advisory only, not part of
//! the wire protocol.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install a stdout + rolling-file subscriber for one process: every log
/// line goes to both, console output for the operator and the advisory
/// file for later inspection. The returned guard must be held for the
/// process lifetime; dropping it early truncates buffered log lines.
pub fn init(log_file_stem: &str) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::never(".", format!("{log_file_stem}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

/// Log file stem for a relay listening on `port` (spec §6).
pub fn node_log_stem(port: u16) -> String {
    format!("node_{port}")
}

/// Log file stem for a client driven against its local `port`.
pub fn client_log_stem(port: u16) -> String {
    format!("client_{port}")
}
