// Downloader module - yt-dlp orchestration core

pub mod bridge;
pub mod command;
pub mod diagnostics;
pub mod errors;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod scheduler;
pub mod supervisor;
pub mod thumbnail;
pub mod tools;
pub mod traits;

pub use bridge::{DownloadEvent, EventBridge};
pub use errors::DownloadError;
pub use metadata::{MediaDescriptor, MediaListing};
pub use models::{ConfigurationSnapshot, DownloadRequest, OutputKind, Platform, RequestId, Submission};
pub use orchestrator::DownloadService;
pub use scheduler::{Admission, DownloadScheduler, SchedulerStatus};
pub use tools::{HostPlatform, ToolLocator, ToolType};
pub use traits::{EventSink, ProcessLauncher, SystemLauncher};
