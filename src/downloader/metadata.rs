// Shape of a metadata lookup result (`--flat-playlist --dump-single-json`)
//
// The lookup call itself lives with the presentation layer; the scheduler
// only needs the entries' URLs to build a batch.

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;

/// One downloadable media item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail: Option<String>,
    pub url: String,
}

/// Either a single item or a playlist/carousel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaListing {
    Single(MediaDescriptor),
    Collection {
        title: String,
        items: Vec<MediaDescriptor>,
    },
}

impl MediaListing {
    /// Parse yt-dlp JSON output
    pub fn from_json(raw: &str) -> Result<Self, DownloadError> {
        let json: serde_json::Value = serde_json::from_str(raw.trim())
            .map_err(|e| DownloadError::ParseFailure(format!("Invalid JSON: {}", e)))?;

        if !json.is_object() {
            return Err(DownloadError::ParseFailure(
                "Expected a JSON object".to_string(),
            ));
        }

        let channel = channel_of(&json);

        if json["_type"].as_str() == Some("playlist") {
            let entries = json["entries"].as_array().ok_or_else(|| {
                DownloadError::ParseFailure("Playlist without entries array".to_string())
            })?;
            let fallback_thumb = json["thumbnail"].as_str().map(|s| s.to_string());

            let items = entries
                .iter()
                .enumerate()
                .filter_map(|(index, entry)| {
                    // flat entries carry `url`; full entries carry `webpage_url`
                    let url = entry["url"]
                        .as_str()
                        .or_else(|| entry["webpage_url"].as_str())?;
                    Some(MediaDescriptor {
                        id: entry["id"].as_str().unwrap_or("").to_string(),
                        title: entry["title"]
                            .as_str()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| format!("Video {}", index + 1)),
                        channel: entry["uploader"]
                            .as_str()
                            .or_else(|| entry["channel"].as_str())
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| channel.clone()),
                        thumbnail: entry["thumbnail"]
                            .as_str()
                            .map(|s| s.to_string())
                            .or_else(|| fallback_thumb.clone()),
                        url: url.to_string(),
                    })
                })
                .collect::<Vec<_>>();

            let title = json["title"]
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("Videos by {}", channel));

            return Ok(Self::Collection { title, items });
        }

        let url = json["webpage_url"]
            .as_str()
            .or_else(|| json["original_url"].as_str())
            .ok_or_else(|| DownloadError::ParseFailure("Missing webpage_url".to_string()))?;

        Ok(Self::Single(MediaDescriptor {
            id: json["id"].as_str().unwrap_or("").to_string(),
            title: json["title"]
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("Video by {}", channel)),
            channel,
            thumbnail: json["thumbnail"].as_str().map(|s| s.to_string()),
            url: url.to_string(),
        }))
    }

    pub fn items(&self) -> &[MediaDescriptor] {
        match self {
            Self::Single(item) => std::slice::from_ref(item),
            Self::Collection { items, .. } => items,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Single(item) => &item.title,
            Self::Collection { title, .. } => title,
        }
    }
}

fn channel_of(json: &serde_json::Value) -> String {
    json["channel"]
        .as_str()
        .or_else(|| json["uploader"].as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}
