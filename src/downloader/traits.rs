// Seams of the download pipeline

use async_trait::async_trait;
use std::path::Path;

use super::bridge::DownloadEvent;
use super::errors::DownloadError;
use super::supervisor::{self, SupervisedProcess};

/// Starts the external tool for one download
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Name of the launcher (for logging)
    fn name(&self) -> &'static str;

    async fn launch(
        &self,
        program: &Path,
        args: &[String],
    ) -> Result<SupervisedProcess, DownloadError>;
}

/// Real OS processes via `supervisor::spawn`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

#[async_trait]
impl ProcessLauncher for SystemLauncher {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn launch(
        &self,
        program: &Path,
        args: &[String],
    ) -> Result<SupervisedProcess, DownloadError> {
        supervisor::spawn(program, args)
    }
}

/// Receiver of pipeline events (a webview, a CLI printer, a test probe)
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DownloadEvent);
}
