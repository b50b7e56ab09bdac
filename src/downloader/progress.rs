// yt-dlp progress parsing
//
// Stateless line matchers plus the per-download monotonic gate. Lines must
// already be reassembled (see `supervisor::LineAssembler`).

use regex::Regex;

lazy_static::lazy_static! {
    // [download]  42.5% of ~ 10.00MiB at  1.00MiB/s ETA 00:09
    static ref PERCENT_RE: Regex = Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").unwrap();
    static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
    static ref MERGE_RE: Regex = Regex::new(r"\[Merger?\]\s+Merging").unwrap();
    static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").unwrap();
}

/// Percentage from a `[download]  NN.N%` line, `None` for anything else
pub fn extract_progress(line: &str) -> Option<f32> {
    let caps = PERCENT_RE.captures(line)?;
    let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
    if percent.is_finite() {
        Some(percent.clamp(0.0, 100.0))
    } else {
        None
    }
}

/// What a recognised output line means for the download
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressStatus {
    Downloading(f32),
    /// A new file (or stream of a merged format) started
    Destination(String),
    Merging,
    AlreadyDownloaded,
}

impl ProgressStatus {
    pub fn percent(&self) -> Option<f32> {
        match self {
            Self::Downloading(p) => Some(*p),
            Self::AlreadyDownloaded => Some(100.0),
            Self::Destination(_) | Self::Merging => None,
        }
    }

    /// Short status text for the UI
    pub fn describe(&self) -> String {
        match self {
            Self::Downloading(p) => format!("Downloading {:.1}%", p),
            Self::Destination(file) => {
                // Extract just filename, not full path
                let short_name: String = file
                    .rsplit(|c: char| c == '/' || c == '\\')
                    .next()
                    .unwrap_or(file)
                    .chars()
                    .take(50)
                    .collect();
                format!("Starting: {}", short_name)
            }
            Self::Merging => "Merging video and audio...".to_string(),
            Self::AlreadyDownloaded => "File already downloaded".to_string(),
        }
    }
}

/// Classify one line of yt-dlp stdout
pub fn parse_status(line: &str) -> Option<ProgressStatus> {
    if let Some(percent) = extract_progress(line) {
        return Some(ProgressStatus::Downloading(percent));
    }
    if let Some(caps) = DEST_RE.captures(line) {
        let file = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("file");
        return Some(ProgressStatus::Destination(file.to_string()));
    }
    if MERGE_RE.is_match(line) {
        return Some(ProgressStatus::Merging);
    }
    if ALREADY_RE.is_match(line) {
        return Some(ProgressStatus::AlreadyDownloaded);
    }
    None
}

/// Never-decreasing view of one download's progress.
///
/// yt-dlp restarts from 0% for every stream of a merged format and after
/// internal retries; the UI must only ever see the high-water mark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressTracker {
    last: Option<f32>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value to report, or `None` when it would not move forward
    pub fn observe(&mut self, percent: f32) -> Option<f32> {
        match self.last {
            Some(last) if percent <= last => None,
            _ => {
                self.last = Some(percent);
                Some(percent)
            }
        }
    }

    pub fn current(&self) -> f32 {
        self.last.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_progress() {
        assert_eq!(extract_progress("[download]  42.5% of ..."), Some(42.5));
        assert_eq!(
            extract_progress("[download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32 (frag 29/454)"),
            Some(6.2)
        );
        assert_eq!(extract_progress("[download] 100% of 3.00MiB in 00:01"), Some(100.0));
    }

    #[test]
    fn test_extract_progress_ignores_other_lines() {
        assert_eq!(extract_progress("[youtube] abc: Downloading webpage"), None);
        assert_eq!(extract_progress("[download] Destination: /dl/a.mp4"), None);
        assert_eq!(extract_progress("42.5%"), None);
        assert_eq!(extract_progress("[downl"), None);
        assert_eq!(extract_progress("[download]  4"), None);
        assert_eq!(extract_progress(""), None);
    }

    #[test]
    fn test_parse_status_variants() {
        assert_eq!(
            parse_status("[download] Destination: /dl/My Clip.f137.mp4"),
            Some(ProgressStatus::Destination("/dl/My Clip.f137.mp4".to_string()))
        );
        assert_eq!(
            parse_status("[Merger] Merging formats into \"/dl/My Clip.mp4\""),
            Some(ProgressStatus::Merging)
        );
        assert_eq!(
            parse_status("[download] /dl/My Clip.mp4 has already been downloaded"),
            Some(ProgressStatus::AlreadyDownloaded)
        );
        assert_eq!(parse_status("[info] nothing"), None);
    }

    #[test]
    fn test_describe_destination_shortens_path() {
        let status = ProgressStatus::Destination("/very/long/path/clip.mp4".to_string());
        assert_eq!(status.describe(), "Starting: clip.mp4");
        assert_eq!(ProgressStatus::AlreadyDownloaded.percent(), Some(100.0));
        assert_eq!(ProgressStatus::Merging.percent(), None);
    }

    #[test]
    fn test_tracker_is_monotonic() {
        let mut tracker = ProgressTracker::new();
        let seen: Vec<f32> = [0.0, 10.0, 55.5, 100.0, 0.0, 30.0, 100.0]
            .into_iter()
            .filter_map(|p| tracker.observe(p))
            .collect();
        assert_eq!(seen, vec![0.0, 10.0, 55.5, 100.0]);
        assert_eq!(tracker.current(), 100.0);

        // a fresh tracker per item starts from zero again
        let mut next = ProgressTracker::new();
        assert_eq!(next.current(), 0.0);
        assert_eq!(next.observe(3.0), Some(3.0));
    }
}
