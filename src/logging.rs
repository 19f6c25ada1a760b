//! Structured logging setup (spec §6.1 `LOG_FILE`/`LOG_LEVEL`): stdout plus a
//! rotating file sink (5 MiB x 5 backups), gated by an `EnvFilter`.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Must be kept alive for the lifetime of the process — dropping it stops
/// the background writer thread flushing to the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

pub fn init(log_level: &str, log_file: Option<&str>) -> LoggingGuard {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(true);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "autoposter.log".to_string());

            // tracing-appender rotates by time, not by size; DAILY rotation
            // with a 5-file cap is the closest available approximation of
            // the spec's "5 MiB x 5 backups" policy (see DESIGN.md).
            let appender = tracing_appender::rolling::Builder::new()
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix(file_name)
                .max_log_files(5)
                .build(dir)
                .expect("failed to build rolling file appender");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (Some(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    LoggingGuard { _file_guard: guard }
}
