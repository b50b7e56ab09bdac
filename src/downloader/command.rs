// yt-dlp argument composition
//
// Always an argument vector, never a shell string: user-supplied extra
// arguments are split on whitespace and passed through verbatim.

use std::path::PathBuf;

use super::models::{ConfigurationSnapshot, DownloadRequest, OutputKind};

/// Builds yt-dlp invocations for one installation (fixed ffmpeg location)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandComposer {
    muxer_dir: PathBuf,
}

impl CommandComposer {
    pub fn new(muxer_dir: impl Into<PathBuf>) -> Self {
        Self {
            muxer_dir: muxer_dir.into(),
        }
    }

    /// Ordered arguments for downloading `request` with `config`.
    ///
    /// Identical inputs always give identical vectors.
    pub fn compose(&self, request: &DownloadRequest, config: &ConfigurationSnapshot) -> Vec<String> {
        let mut args = vec![
            request.target_url().to_string(),
            "--progress".to_string(),
            "-o".to_string(),
            config.output_template(),
            // IPv6 routes to several CDNs are unreliable
            "-4".to_string(),
        ];

        if config.verbose_logging {
            args.push("--verbose".to_string());
        }
        if config.overwrite_files {
            args.push("--force-overwrites".to_string());
        }
        if config.embed_metadata {
            args.push("--add-metadata".to_string());
        }
        if request.output_kind() == OutputKind::Video {
            if let Some(filter) = framerate_filter(&config.framerate_preference) {
                args.push("--match-filter".to_string());
                args.push(filter);
            }
        }

        let muxer = self.muxer_dir.to_string_lossy().to_string();
        match request.output_kind() {
            OutputKind::Audio => {
                args.extend([
                    "-f".to_string(),
                    request.quality_selector().to_string(),
                    "--extract-audio".to_string(),
                    "--audio-format".to_string(),
                    config.audio_format.clone(),
                    "--ffmpeg-location".to_string(),
                    muxer,
                ]);
                if config.embed_thumbnails {
                    args.push("--embed-thumbnail".to_string());
                }
            }
            OutputKind::Video => {
                args.extend([
                    "-f".to_string(),
                    request.quality_selector().to_string(),
                    "--merge-output-format".to_string(),
                    config.video_format.clone(),
                    "--ffmpeg-location".to_string(),
                    muxer,
                ]);
            }
        }

        args.extend(split_extra_args(&config.custom_args));
        args
    }
}

/// `--match-filter` expression for a framerate preference, `None` for `auto`
/// or anything that is not a positive number (optionally suffixed `fps`).
pub fn framerate_filter(preference: &str) -> Option<String> {
    let pref = preference.trim().to_lowercase();
    if pref.is_empty() || pref == "auto" {
        return None;
    }

    let number = pref.strip_suffix("fps").unwrap_or(&pref).trim();
    match number.parse::<u32>() {
        Ok(fps) if fps > 0 => Some(format!("fps<={}", fps)),
        _ => None,
    }
}

/// Whitespace tokenization of the free-form argument setting
pub fn split_extra_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> ConfigurationSnapshot {
        ConfigurationSnapshot {
            download_dir: PathBuf::from("/dl"),
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

    fn composer() -> CommandComposer {
        CommandComposer::new("/app/bin/mac")
    }

    fn output() -> String {
        PathBuf::from("/dl").join("%(title)s.%(ext)s").to_string_lossy().to_string()
    }

    #[test]
    fn test_video_scenario() {
        let request = DownloadRequest::new(
            "https://example.com/v1",
            "bestvideo+bestaudio/best",
            OutputKind::Video,
        );
        let args = composer().compose(&request, &config());

        assert_eq!(
            args,
            vec![
                "https://example.com/v1".to_string(),
                "--progress".to_string(),
                "-o".to_string(),
                output(),
                "-4".to_string(),
                "--add-metadata".to_string(),
                "-f".to_string(),
                "bestvideo+bestaudio/best".to_string(),
                "--merge-output-format".to_string(),
                "mp4".to_string(),
                "--ffmpeg-location".to_string(),
                "/app/bin/mac".to_string(),
            ]
        );
        assert!(!args.contains(&"--force-overwrites".to_string()));
    }

    #[test]
    fn test_audio_with_all_flags() {
        let request = DownloadRequest::new("https://youtu.be/x", "bestaudio/best", OutputKind::Audio);
        let cfg = ConfigurationSnapshot {
            verbose_logging: true,
            overwrite_files: true,
            framerate_preference: "60".to_string(),
            custom_args: "--no-check-certificate  --retries 3".to_string(),
            ..config()
        };
        let args = composer().compose(&request, &cfg);

        assert_eq!(
            args,
            vec![
                "https://youtu.be/x".to_string(),
                "--progress".to_string(),
                "-o".to_string(),
                output(),
                "-4".to_string(),
                "--verbose".to_string(),
                "--force-overwrites".to_string(),
                "--add-metadata".to_string(),
                "-f".to_string(),
                "bestaudio/best".to_string(),
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                "mp3".to_string(),
                "--ffmpeg-location".to_string(),
                "/app/bin/mac".to_string(),
                "--embed-thumbnail".to_string(),
                "--no-check-certificate".to_string(),
                "--retries".to_string(),
                "3".to_string(),
            ]
        );
    }

    #[test]
    fn test_flags_follow_config_exactly() {
        let request = DownloadRequest::new("https://youtu.be/x", "best", OutputKind::Audio);
        for (overwrite, metadata, thumbs, verbose) in [
            (false, false, false, false),
            (true, false, true, false),
            (false, true, false, true),
            (true, true, true, true),
        ] {
            let cfg = ConfigurationSnapshot {
                overwrite_files: overwrite,
                embed_metadata: metadata,
                embed_thumbnails: thumbs,
                verbose_logging: verbose,
                ..config()
            };
            let args = composer().compose(&request, &cfg);
            let has = |flag: &str| args.iter().any(|a| a == flag);
            assert_eq!(has("--force-overwrites"), overwrite);
            assert_eq!(has("--add-metadata"), metadata);
            assert_eq!(has("--embed-thumbnail"), thumbs);
            assert_eq!(has("--verbose"), verbose);
        }
    }

    #[test]
    fn test_framerate_filter_is_video_only() {
        let cfg = ConfigurationSnapshot {
            framerate_preference: "30fps".to_string(),
            ..config()
        };
        let video = DownloadRequest::new("https://youtu.be/x", "best", OutputKind::Video);
        let audio = DownloadRequest::new("https://youtu.be/x", "best", OutputKind::Audio);

        let video_args = composer().compose(&video, &cfg);
        let pos = video_args.iter().position(|a| a == "--match-filter").unwrap();
        assert_eq!(video_args[pos + 1], "fps<=30");
        // filter comes before the format selection
        assert!(pos < video_args.iter().position(|a| a == "-f").unwrap());

        assert!(!composer().compose(&audio, &cfg).contains(&"--match-filter".to_string()));
    }

    #[test]
    fn test_framerate_filter_values() {
        assert_eq!(framerate_filter("auto"), None);
        assert_eq!(framerate_filter(" AUTO "), None);
        assert_eq!(framerate_filter(""), None);
        assert_eq!(framerate_filter("60"), Some("fps<=60".to_string()));
        assert_eq!(framerate_filter("24 fps"), Some("fps<=24".to_string()));
        assert_eq!(framerate_filter("0"), None);
        assert_eq!(framerate_filter("smooth"), None);
    }

    #[test]
    fn test_extra_args_are_discrete_tokens() {
        assert_eq!(
            split_extra_args("--no-check-certificate  --retries 3"),
            vec!["--no-check-certificate", "--retries", "3"]
        );
        assert!(split_extra_args("   ").is_empty());
        // no shell interpretation
        assert_eq!(split_extra_args("$(rm -rf) ;"), vec!["$(rm", "-rf)", ";"]);
    }

    #[test]
    fn test_compose_is_pure() {
        let request = DownloadRequest::new("https://youtu.be/x", "best", OutputKind::Video);
        let cfg = config();
        assert_eq!(composer().compose(&request, &cfg), composer().compose(&request, &cfg));
    }
}
