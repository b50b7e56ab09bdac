// Logger setup: terminal plus a log file

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

const LOG_FILE: &str = "social-downloader.log";

/// `<local data dir>/social-downloader/social-downloader.log`
pub fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("social-downloader")
        .join(LOG_FILE)
}

/// Install the global logger.
///
/// The file always gets info and above; the terminal drops to debug when
/// `debug_mode` is set. A file that cannot be opened only disables file
/// logging.
pub fn init_logger(log_path: &Path, debug_mode: bool) -> Result<(), log::SetLoggerError> {
    let config = ConfigBuilder::new()
        .add_filter_ignore_str("reqwest")
        .add_filter_ignore_str("hyper")
        .build();

    let term_level = if debug_mode {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        term_level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Info, config, file)),
        Err(e) => eprintln!("[Logging] Cannot open {}: {}", log_path.display(), e),
    }

    CombinedLogger::init(loggers)?;
    log::info!("[Logging] Writing to {}", log_path.display());
    Ok(())
}
