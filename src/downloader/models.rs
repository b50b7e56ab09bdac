// Common data models for the download pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use super::errors::DownloadError;
use super::metadata::MediaListing;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of a single download request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the user wants out of the URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Video,
    Audio,
}

impl OutputKind {
    /// The UI sends `mp3` for audio and a container name (`mp4`) for video
    pub fn from_format(format: &str) -> Self {
        match format.trim().to_lowercase().as_str() {
            "mp3" | "audio" | "m4a" | "opus" | "wav" | "flac" => Self::Audio,
            _ => Self::Video,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// Source platform, used for log prefixes and event payloads only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
    Other,
}

impl Platform {
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.contains("youtube.com") || lower.contains("youtu.be") {
            Self::YouTube
        } else if lower.contains("tiktok.com") {
            Self::TikTok
        } else if lower.contains("instagram.com") {
            Self::Instagram
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::TikTok => "tiktok",
            Self::Instagram => "instagram",
            Self::Other => "other",
        }
    }
}

/// One URL to fetch. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    id: RequestId,
    target_url: String,
    quality_selector: String,
    output_kind: OutputKind,
    platform: Platform,
}

impl DownloadRequest {
    pub fn new(target_url: &str, quality_selector: &str, output_kind: OutputKind) -> Self {
        let target_url = target_url.trim().to_string();
        Self {
            id: RequestId::next(),
            platform: Platform::from_url(&target_url),
            target_url,
            quality_selector: quality_selector.trim().to_string(),
            output_kind,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn quality_selector(&self) -> &str {
        &self.quality_selector
    }

    pub fn output_kind(&self) -> OutputKind {
        self.output_kind
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }
}

/// Several URLs sharing one quality/format choice, captured at creation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    items: Vec<DownloadRequest>,
    shared_quality: String,
    shared_output_kind: OutputKind,
}

impl BatchJob {
    pub fn new<I, S>(urls: I, quality: &str, output_kind: OutputKind) -> Result<Self, DownloadError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let shared_quality = quality.trim().to_string();
        let items: Vec<DownloadRequest> = urls
            .into_iter()
            .filter(|url| !url.as_ref().trim().is_empty())
            .map(|url| DownloadRequest::new(url.as_ref(), &shared_quality, output_kind))
            .collect();

        if items.is_empty() {
            return Err(DownloadError::EmptyBatch);
        }

        Ok(Self {
            items,
            shared_quality,
            shared_output_kind: output_kind,
        })
    }

    pub fn items(&self) -> &[DownloadRequest] {
        &self.items
    }

    pub fn shared_quality(&self) -> &str {
        &self.shared_quality
    }

    pub fn shared_output_kind(&self) -> OutputKind {
        self.shared_output_kind
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What the presentation layer hands to `submit`
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Single(DownloadRequest),
    Batch(BatchJob),
}

impl Submission {
    pub fn single(url: &str, quality: &str, output_kind: OutputKind) -> Self {
        Self::Single(DownloadRequest::new(url, quality, output_kind))
    }

    pub fn batch<I, S>(urls: I, quality: &str, output_kind: OutputKind) -> Result<Self, DownloadError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        BatchJob::new(urls, quality, output_kind).map(Self::Batch)
    }

    /// "Download all" over the result of a metadata lookup
    pub fn batch_from_listing(
        listing: &MediaListing,
        quality: &str,
        output_kind: OutputKind,
    ) -> Result<Self, DownloadError> {
        match listing {
            MediaListing::Single(item) => Ok(Self::single(&item.url, quality, output_kind)),
            MediaListing::Collection { items, .. } => {
                Self::batch(items.iter().map(|item| item.url.as_str()), quality, output_kind)
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(batch) => batch.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_requests(self) -> Vec<DownloadRequest> {
        match self {
            Self::Single(request) => vec![request],
            Self::Batch(batch) => batch.items,
        }
    }
}

/// Lifecycle of the one active download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    Running,
    Succeeded,
    Failed,
}

/// Read-only copy of the user settings, taken once per submission
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSnapshot {
    pub download_dir: PathBuf,
    pub file_name_template: String,
    pub overwrite_files: bool,
    pub embed_thumbnails: bool,
    pub embed_metadata: bool,
    pub video_format: String,
    pub audio_format: String,
    pub image_format: String,
    /// `auto` or a frame rate such as `30` / `60fps`
    pub framerate_preference: String,
    pub custom_args: String,
    pub verbose_logging: bool,
}

impl ConfigurationSnapshot {
    /// `-o` value: download directory joined with the filename template
    pub fn output_template(&self) -> String {
        self.download_dir
            .join(&self.file_name_template)
            .to_string_lossy()
            .to_string()
    }
}

impl Default for ConfigurationSnapshot {
    fn default() -> Self {
        Self {
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            file_name_template: "%(title)s.%(ext)s".to_string(),
            overwrite_files: false,
            embed_thumbnails: true,
            embed_metadata: true,
            video_format: "mp4".to_string(),
            audio_format: "mp3".to_string(),
            image_format: "jpg".to_string(),
            framerate_preference: "auto".to_string(),
            custom_args: String::new(),
            verbose_logging: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = DownloadRequest::new("https://youtu.be/a", "best", OutputKind::Video);
        let b = DownloadRequest::new("https://youtu.be/a", "best", OutputKind::Video);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_platform_detection() {
        assert_eq!(Platform::from_url("https://www.youtube.com/watch?v=x"), Platform::YouTube);
        assert_eq!(Platform::from_url("https://www.tiktok.com/@u/video/1"), Platform::TikTok);
        assert_eq!(Platform::from_url("https://www.instagram.com/p/C1/"), Platform::Instagram);
        assert_eq!(Platform::from_url("https://example.com/v1"), Platform::Other);
    }

    #[test]
    fn test_output_kind_from_format() {
        assert_eq!(OutputKind::from_format("mp3"), OutputKind::Audio);
        assert_eq!(OutputKind::from_format("MP4"), OutputKind::Video);
        assert_eq!(OutputKind::from_format("webm"), OutputKind::Video);
    }

    #[test]
    fn test_batch_shares_quality_and_kind() {
        let batch = BatchJob::new(
            ["https://youtu.be/1", "  ", "https://youtu.be/2"],
            " bestaudio/best ",
            OutputKind::Audio,
        )
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.shared_quality(), "bestaudio/best");
        assert_eq!(batch.shared_output_kind(), OutputKind::Audio);
        for item in batch.items() {
            assert_eq!(item.quality_selector(), batch.shared_quality());
            assert_eq!(item.output_kind(), OutputKind::Audio);
        }
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let err = BatchJob::new(Vec::<String>::new(), "best", OutputKind::Video).unwrap_err();
        assert!(matches!(err, DownloadError::EmptyBatch));
    }

    #[test]
    fn test_output_template_joins_dir_and_template() {
        let snapshot = ConfigurationSnapshot {
            download_dir: PathBuf::from("/downloads"),
            ..ConfigurationSnapshot::default()
        };
        assert_eq!(
            snapshot.output_template(),
            PathBuf::from("/downloads").join("%(title)s.%(ext)s").to_string_lossy()
        );
    }
}
