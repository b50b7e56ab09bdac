// Thumbnail download next to the media files

use std::path::PathBuf;
use std::time::Duration;

use super::errors::DownloadError;
use super::models::ConfigurationSnapshot;

const FETCH_TIMEOUT_SECS: u64 = 30;

/// Replace characters that are not allowed in file names on common systems
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "thumbnail".to_string()
    } else {
        cleaned
    }
}

/// `<download dir>/<title>_thumbnail.<image format>`
pub fn thumbnail_path(title: &str, snapshot: &ConfigurationSnapshot) -> PathBuf {
    snapshot.download_dir.join(format!(
        "{}_thumbnail.{}",
        sanitize_title(title),
        snapshot.image_format
    ))
}

/// Fetch `url` and write it under the download directory. Returns the file path.
pub async fn save_thumbnail(
    url: &str,
    title: &str,
    snapshot: &ConfigurationSnapshot,
) -> Result<PathBuf, DownloadError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()?;

    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;

    let path = thumbnail_path(title, snapshot);
    tokio::fs::create_dir_all(&snapshot.download_dir).await?;
    tokio::fs::write(&path, &bytes).await?;

    log::info!("[Thumbnail] Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("AC/DC: Live? *100%*"), "AC-DC- Live- -100--");
        assert_eq!(sanitize_title(r#"a\b|c"d<e>f"#), "a-b-c-d-e-f");
        assert_eq!(sanitize_title("   "), "thumbnail");
        assert_eq!(sanitize_title("Кино - Группа крови"), "Кино - Группа крови");
    }

    #[test]
    fn test_thumbnail_path_uses_image_format() {
        let snapshot = ConfigurationSnapshot {
            download_dir: PathBuf::from("/dl"),
            image_format: "png".to_string(),
            ..ConfigurationSnapshot::default()
        };
        assert_eq!(
            thumbnail_path("My: Clip", &snapshot),
            PathBuf::from("/dl").join("My- Clip_thumbnail.png")
        );
    }

    #[tokio::test]
    async fn test_save_thumbnail_invalid_url() {
        let snapshot = ConfigurationSnapshot::default();
        let err = save_thumbnail("not a url", "x", &snapshot).await.unwrap_err();
        assert!(matches!(err, DownloadError::Http(_)));
    }
}
