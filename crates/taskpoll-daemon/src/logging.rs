//! Dual log sink: live stdout plus a persistent file.
//!
//! `TASKPOLL_LOG` overrides the filter (e.g. `taskpoll_scheduler=debug`).

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "taskpoll=info,taskpoll_scheduler=info,taskpoll_core=info";

/// Install the global subscriber. Keep the returned guard alive for the whole
/// process or buffered file lines are lost on exit.
pub fn init_logging(log_path: &Path) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_env("TASKPOLL_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = fmt::layer().with_target(false).with_ansi(true).boxed();

    let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
    let (file_layer, guard) = match (log_path.file_name(), std::fs::create_dir_all(dir)) {
        (Some(name), Ok(())) => {
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_target(false)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        (_, Err(e)) => {
            eprintln!("Warning: failed to create log directory {}: {e}", dir.display());
            (None, None)
        }
        (None, Ok(())) => {
            eprintln!("Warning: log path {} has no file name", log_path.display());
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
