// Failure diagnostics - turns yt-dlp stderr into an actionable reason
//
// yt-dlp reports every failure as free text on stderr. The scheduler keeps
// the tail of that stream and this module classifies it, so the UI can show
// something better than "exit code 1".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the external tool failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// HTTP 403 Forbidden - access denied by the platform
    Http403Forbidden,

    /// 429 or an explicit rate-limit message
    RateLimited,

    /// Login/cookies needed (age gate, private account, members only)
    LoginRequired,

    /// Removed, deleted or never existed
    Unavailable,

    /// Geographic restriction
    GeoBlocked,

    /// DRM-protected content, cannot be downloaded at all
    DrmProtected,

    /// yt-dlp has no extractor for this URL
    UnsupportedUrl,

    /// Timeouts, DNS failures, refused connections
    NetworkError,

    /// ffmpeg/ffprobe not found at --ffmpeg-location
    MuxerMissing,

    /// Disk full or the output path is not writable
    OutputNotWritable,

    Unknown,
}

impl FailureReason {
    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "access denied (HTTP 403)",
            Self::RateLimited => "rate limited by the platform",
            Self::LoginRequired => "login required",
            Self::Unavailable => "media unavailable",
            Self::GeoBlocked => "geographic restriction",
            Self::DrmProtected => "DRM-protected content",
            Self::UnsupportedUrl => "unsupported URL",
            Self::NetworkError => "network error",
            Self::MuxerMissing => "ffmpeg not found",
            Self::OutputNotWritable => "output location not writable",
            Self::Unknown => "unknown error",
        }
    }

    /// No retry or setting change will make this download work
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::DrmProtected | Self::Unavailable | Self::UnsupportedUrl
        )
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Analyze yt-dlp error output and return the most specific reason
pub fn diagnose_error(error: &str) -> FailureReason {
    let lower = error.to_lowercase();

    // Checked in order of specificity

    if lower.contains("drm") || lower.contains("widevine") || lower.contains("playready") {
        return FailureReason::DrmProtected;
    }

    if lower.contains("ffmpeg not found")
        || lower.contains("ffprobe and ffmpeg not found")
        || lower.contains("ffmpeg is not installed")
    {
        return FailureReason::MuxerMissing;
    }

    if lower.contains("unsupported url") {
        return FailureReason::UnsupportedUrl;
    }

    if lower.contains("sign in to confirm")
        || lower.contains("login required")
        || lower.contains("requested content is not available, rate-limit reached or login required")
        || lower.contains("use --cookies")
        || lower.contains("private video")
        || lower.contains("members only")
        || lower.contains("members-only")
    {
        // instagram reports rate limits through the same message
        if lower.contains("rate-limit reached") {
            return FailureReason::RateLimited;
        }
        return FailureReason::LoginRequired;
    }

    if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("no longer available")
        || lower.contains("http error 404")
    {
        return FailureReason::Unavailable;
    }

    if lower.contains("not available in your country") || lower.contains("geo restrict") {
        return FailureReason::GeoBlocked;
    }

    if lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit")
    {
        return FailureReason::RateLimited;
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return FailureReason::Http403Forbidden;
    }

    if lower.contains("no space left") || lower.contains("permission denied") {
        return FailureReason::OutputNotWritable;
    }

    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection refused")
        || lower.contains("network is unreachable")
        || lower.contains("name or service not known")
        || lower.contains("getaddrinfo failed")
    {
        return FailureReason::NetworkError;
    }

    FailureReason::Unknown
}

/// Last `max` non-empty lines, oldest first, joined with newlines
pub fn stderr_tail<'a, I>(lines: I, max: usize) -> String
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: DoubleEndedIterator,
{
    let mut tail: Vec<&str> = lines
        .into_iter()
        .rev()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(max)
        .collect();
    tail.reverse();
    tail.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_403_detection() {
        let error = "ERROR: unable to download video data: HTTP Error 403: Forbidden";
        assert_eq!(diagnose_error(error), FailureReason::Http403Forbidden);
    }

    #[test]
    fn test_login_detection() {
        let error = "ERROR: [youtube] xyz: Sign in to confirm your age";
        assert_eq!(diagnose_error(error), FailureReason::LoginRequired);
    }

    #[test]
    fn test_instagram_rate_limit_detection() {
        let error = "ERROR: [Instagram] C1: Requested content is not available, rate-limit reached or login required. Use --cookies";
        assert_eq!(diagnose_error(error), FailureReason::RateLimited);
    }

    #[test]
    fn test_muxer_detection() {
        let error = "ERROR: Postprocessing: ffprobe and ffmpeg not found. Please install or provide the path using --ffmpeg-location";
        assert_eq!(diagnose_error(error), FailureReason::MuxerMissing);
    }

    #[test]
    fn test_unsupported_url_is_permanent() {
        let reason = diagnose_error("ERROR: Unsupported URL: https://example.com/");
        assert_eq!(reason, FailureReason::UnsupportedUrl);
        assert!(reason.is_permanent());
    }

    #[test]
    fn test_timeout_detection() {
        let error = "ERROR: Unable to download webpage: The read operation timed out";
        assert_eq!(diagnose_error(error), FailureReason::NetworkError);
        assert!(!FailureReason::NetworkError.is_permanent());
    }

    #[test]
    fn test_unknown() {
        assert_eq!(diagnose_error("something odd"), FailureReason::Unknown);
        assert_eq!(diagnose_error(""), FailureReason::Unknown);
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines_in_order() {
        let lines = vec!["one", "", "two", "  three ", "four"];
        assert_eq!(stderr_tail(lines.iter().copied(), 2), "three\nfour");
        assert_eq!(stderr_tail(lines.iter().copied(), 10), "one\ntwo\nthree\nfour");
    }
}
