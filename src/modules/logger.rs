use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "gateway.log";

/// Ensure the log directory exists
pub fn prepare_log_dir(log_dir: &Path) -> Result<PathBuf, String> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .map_err(|e| format!("Failed to create log directory: {}", e))?;
    }
    Ok(log_dir.to_path_buf())
}

/// Initialize logger system
///
/// Console output is always on; a daily-rolling file layer is added when
/// `log_dir` is set. Filtering follows `RUST_LOG`, defaulting to `info`.
pub fn init_logger(log_dir: Option<&Path>) {
    // Capture log macro logs
    let _ = tracing_log::LogTracer::init();

    let console_layer = fmt::Layer::new()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_dir = match log_dir.map(prepare_log_dir) {
        Some(Ok(dir)) => Some(dir),
        Some(Err(e)) => {
            eprintln!("Failed to initialize log directory: {}", e);
            None
        }
        None => None,
    };

    let Some(dir) = file_dir else {
        let _ = tracing_subscriber::registry()
            .with(filter_layer)
            .with(console_layer)
            .try_init();
        info!("Logger system initialized (Console)");
        return;
    };

    let file_appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // File output layer (disable ANSI formatting)
    let file_layer = fmt::Layer::new()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_level(true);

    // try_init so a second initialization (tests) does not panic
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    // The writer guard must live until process exit
    std::mem::forget(guard);

    info!("Logger system initialized (Console + File at {:?})", dir);
}
