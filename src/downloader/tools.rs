// Bundled tool locations
//
// Binaries ship inside the app under `bin/win` and `bin/mac`. Resolution is a
// pure path computation; a missing file only shows up later as a spawn error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::errors::DownloadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
    Instaloader,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
            ToolType::Instaloader => "instaloader",
        }
    }

    /// File name inside `bin/mac` (the standalone yt-dlp build is `yt-dlp_macos`)
    fn mac_binary_name(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp_macos",
            other => other.as_str(),
        }
    }
}

/// Host OS as far as binary layout is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPlatform {
    Windows,
    MacOs,
    Other(String),
}

impl HostPlatform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" | "win32" => Self::Windows,
            "macos" | "darwin" => Self::MacOs,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => f.write_str("windows"),
            Self::MacOs => f.write_str("macos"),
            Self::Other(os) => f.write_str(os),
        }
    }
}

/// Maps a tool to its bundled executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolLocator {
    /// Resources directory of an installed (packaged) app
    resources_dir: PathBuf,
    /// Application directory when running from a development checkout
    app_dir: PathBuf,
}

impl ToolLocator {
    pub fn new(resources_dir: impl Into<PathBuf>, app_dir: impl Into<PathBuf>) -> Self {
        Self {
            resources_dir: resources_dir.into(),
            app_dir: app_dir.into(),
        }
    }

    /// Absolute path of `tool` for the given host and install kind
    pub fn resolve(
        &self,
        tool: ToolType,
        platform: &HostPlatform,
        is_packaged: bool,
    ) -> Result<PathBuf, DownloadError> {
        let relative = match platform {
            HostPlatform::Windows => Path::new("win").join(format!("{}.exe", tool.as_str())),
            HostPlatform::MacOs => Path::new("mac").join(tool.mac_binary_name()),
            HostPlatform::Other(os) => {
                return Err(DownloadError::UnsupportedPlatform(os.clone()));
            }
        };

        let root = if is_packaged {
            &self.resources_dir
        } else {
            &self.app_dir
        };

        Ok(root.join("bin").join(relative))
    }

    /// Directory handed to `--ffmpeg-location`
    pub fn muxer_dir(
        &self,
        platform: &HostPlatform,
        is_packaged: bool,
    ) -> Result<PathBuf, DownloadError> {
        let ffmpeg = self.resolve(ToolType::Ffmpeg, platform, is_packaged)?;
        Ok(ffmpeg
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default())
    }
}
