// Download service: wires settings, locator, scheduler and events together

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::bridge::{DownloadEvent, EventBridge};
use super::command::CommandComposer;
use super::errors::DownloadError;
use super::models::Submission;
use super::scheduler::{Admission, DownloadScheduler, SchedulerStatus};
use super::thumbnail;
use super::tools::{HostPlatform, ToolLocator, ToolType};
use super::traits::{EventSink, ProcessLauncher};
use crate::settings::ConfigProvider;

/// Entry point used by the presentation layer
#[derive(Clone)]
pub struct DownloadService {
    settings: Arc<dyn ConfigProvider>,
    scheduler: DownloadScheduler,
    bridge: Arc<EventBridge>,
}

impl DownloadService {
    /// Resolve the bundled binaries once; fails on hosts without a layout.
    pub fn new(
        settings: Arc<dyn ConfigProvider>,
        locator: &ToolLocator,
        platform: &HostPlatform,
        is_packaged: bool,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Result<Self, DownloadError> {
        let tool_path = locator.resolve(ToolType::YtDlp, platform, is_packaged)?;
        let muxer_dir = locator.muxer_dir(platform, is_packaged)?;
        log::info!(
            "[Downloader] {} on {} via {} launcher (ffmpeg in {})",
            tool_path.display(),
            platform,
            launcher.name(),
            muxer_dir.display()
        );

        let bridge = Arc::new(EventBridge::new());
        let scheduler = DownloadScheduler::new(
            tool_path,
            CommandComposer::new(muxer_dir),
            launcher,
            bridge.clone(),
        );

        Ok(Self {
            settings,
            scheduler,
            bridge,
        })
    }

    /// Settings are read now; later changes do not affect this submission.
    pub fn submit(&self, submission: Submission) -> Result<Admission, DownloadError> {
        if let Submission::Batch(batch) = &submission {
            log::info!(
                "[Downloader] Batch of {} ({}, {})",
                batch.len(),
                batch.shared_quality(),
                batch.shared_output_kind().as_str()
            );
        }
        let snapshot = self.settings.snapshot();
        self.scheduler.submit(submission, snapshot)
    }

    pub fn status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    pub fn scheduler(&self) -> &DownloadScheduler {
        &self.scheduler
    }

    pub fn events(&self) -> &EventBridge {
        &self.bridge
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.bridge.subscribe()
    }

    pub fn attach(&self, sink: Arc<dyn EventSink>) {
        self.bridge.attach(sink);
    }

    pub async fn save_thumbnail(&self, url: &str, title: &str) -> Result<PathBuf, DownloadError> {
        let snapshot = self.settings.snapshot();
        thumbnail::save_thumbnail(url, title, &snapshot).await
    }
}
