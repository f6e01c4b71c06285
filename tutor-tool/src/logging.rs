use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::ToolError;

const LOG_ENV: &str = "TUTOR_LOG";

fn log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tutor")
        .join("tutor.log")
}

/// Sends tracing output to a log file; the terminal belongs to the UI.
///
/// The filter comes from `TUTOR_LOG` and defaults to `info`.
pub fn init() -> Result<PathBuf, ToolError> {
    let path = log_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| ToolError::Logging(e.to_string()))?;

    Ok(path)
}
