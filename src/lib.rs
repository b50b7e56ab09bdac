pub mod downloader;
pub mod logging;
pub mod settings;

#[cfg(feature = "tauri")]
pub mod commands;

use std::path::PathBuf;
use std::sync::Arc;

pub use downloader::{DownloadError, DownloadEvent, DownloadService, Submission};
pub use settings::{ConfigProvider, Settings, SettingsStore};

use downloader::{HostPlatform, SystemLauncher, ToolLocator};

/// Where the app runs from; decides which `bin/` directory holds the tools
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub resources_dir: PathBuf,
    pub app_dir: PathBuf,
    pub is_packaged: bool,
}

/// Startup: load settings, install the logger, build the download service.
pub fn init(paths: &AppPaths) -> Result<(DownloadService, Arc<SettingsStore>), DownloadError> {
    let settings = Arc::new(SettingsStore::open(SettingsStore::default_path()));

    if let Err(e) = logging::init_logger(&logging::default_log_path(), settings.settings().debug_mode) {
        eprintln!("[Logging] Logger already installed: {}", e);
    }

    let locator = ToolLocator::new(&paths.resources_dir, &paths.app_dir);
    let service = DownloadService::new(
        settings.clone(),
        &locator,
        &HostPlatform::current(),
        paths.is_packaged,
        Arc::new(SystemLauncher),
    )?;

    Ok((service, settings))
}
