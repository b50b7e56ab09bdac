// Error types for the download orchestration core

use thiserror::Error;

use super::diagnostics::{diagnose_error, FailureReason};

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// Host has no bundled binaries (only Windows and macOS layouts exist)
    #[error("Unsupported platform for binaries: {0}")]
    UnsupportedPlatform(String),

    /// Executable missing, not executable, or the OS refused to start it
    #[error("Failed to start {program}: {reason}")]
    SpawnFailure { program: String, reason: String },

    /// The tool ran and exited unsuccessfully
    #[error("{tool} failed ({status}, {reason}): {detail}")]
    ToolExecution {
        tool: String,
        status: String,
        reason: FailureReason,
        detail: String,
    },

    /// Output of the tool in info mode could not be understood
    #[error("Parse error: {0}")]
    ParseFailure(String),

    /// Policy rejection: the single download slot is busy
    #[error("A download is already in progress")]
    ConcurrentSubmissionRejected,

    /// No Tokio runtime to drive the download on
    #[error("No async runtime available to run downloads")]
    RuntimeUnavailable,

    /// A batch was built without any target
    #[error("Nothing to download: the batch is empty")]
    EmptyBatch,

    /// Unknown setting key or a value of the wrong type
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl DownloadError {
    /// Build a `ToolExecution` error from an exit code and the captured stderr.
    pub fn tool_failure(tool: &str, code: Option<i32>, stderr: &str) -> Self {
        let status = match code {
            Some(code) => format!("exit code {}", code),
            None => "terminated".to_string(),
        };
        let detail = if stderr.trim().is_empty() {
            "no diagnostic output".to_string()
        } else {
            stderr.trim().to_string()
        };

        Self::ToolExecution {
            tool: tool.to_string(),
            status,
            reason: diagnose_error(stderr),
            detail,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::ConcurrentSubmissionRejected)
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failure_carries_diagnosis() {
        let err = DownloadError::tool_failure(
            "yt-dlp",
            Some(1),
            "ERROR: [youtube] abc: HTTP Error 403: Forbidden",
        );
        match &err {
            DownloadError::ToolExecution { status, reason, detail, .. } => {
                assert_eq!(status, "exit code 1");
                assert_eq!(*reason, FailureReason::Http403Forbidden);
                assert!(detail.contains("HTTP Error 403"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().starts_with("yt-dlp failed (exit code 1"));
    }

    #[test]
    fn test_tool_failure_without_code_or_output() {
        let err = DownloadError::tool_failure("yt-dlp", None, "  \n");
        let msg = err.to_string();
        assert!(msg.contains("terminated"));
        assert!(msg.contains("no diagnostic output"));
    }

    #[test]
    fn test_rejection_flag() {
        assert!(DownloadError::ConcurrentSubmissionRejected.is_rejection());
        assert!(!DownloadError::EmptyBatch.is_rejection());
    }
}
