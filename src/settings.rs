// Persistent user settings
//
// A flat JSON object on disk, keyed the way the webview reads it
// (`downloadPath`, `embedThumbnails`, ...). Missing keys take their defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::downloader::errors::DownloadError;
use crate::downloader::models::ConfigurationSnapshot;

const APP_DIR: &str = "social-downloader";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub download_path: PathBuf,
    pub overwrite_files: bool,
    pub embed_thumbnails: bool,
    pub embed_metadata: bool,
    pub default_video_format: String,
    pub default_audio_format: String,
    pub default_image_format: String,
    pub framerate_preference: String,
    pub file_name_template: String,
    pub custom_ytdlp_args: String,
    pub debug_mode: bool,
    pub enable_verbose_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_path: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            overwrite_files: false,
            embed_thumbnails: true,
            embed_metadata: true,
            default_video_format: "mp4".to_string(),
            default_audio_format: "mp3".to_string(),
            default_image_format: "jpg".to_string(),
            framerate_preference: "auto".to_string(),
            file_name_template: "%(title)s.%(ext)s".to_string(),
            custom_ytdlp_args: String::new(),
            debug_mode: false,
            enable_verbose_logging: false,
        }
    }
}

impl Settings {
    pub fn snapshot(&self) -> ConfigurationSnapshot {
        ConfigurationSnapshot {
            download_dir: self.download_path.clone(),
            file_name_template: self.file_name_template.clone(),
            overwrite_files: self.overwrite_files,
            embed_thumbnails: self.embed_thumbnails,
            embed_metadata: self.embed_metadata,
            video_format: self.default_video_format.clone(),
            audio_format: self.default_audio_format.clone(),
            image_format: self.default_image_format.clone(),
            framerate_preference: self.framerate_preference.clone(),
            custom_args: self.custom_ytdlp_args.clone(),
            verbose_logging: self.enable_verbose_logging,
        }
    }

    fn to_map(&self) -> Result<Map<String, Value>, DownloadError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(DownloadError::Settings("settings are not an object".to_string())),
            Err(e) => Err(DownloadError::Settings(e.to_string())),
        }
    }
}

/// Source of configuration snapshots for the orchestrator
pub trait ConfigProvider: Send + Sync {
    fn snapshot(&self) -> ConfigurationSnapshot;
}

pub struct SettingsStore {
    path: Option<PathBuf>,
    current: Mutex<Settings>,
}

impl SettingsStore {
    /// Load from `path`. A missing file gives defaults; an unreadable one
    /// is logged and replaced by defaults on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!(
                        "[Settings] Ignoring corrupt {}: {}",
                        path.display(),
                        e
                    );
                    Settings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                log::warn!("[Settings] Cannot read {}: {}", path.display(), e);
                Settings::default()
            }
        };
        log::debug!("[Settings] Loaded from {}", path.display());

        Self {
            path: Some(path),
            current: Mutex::new(settings),
        }
    }

    /// Not persisted anywhere
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            current: Mutex::new(settings),
        }
    }

    /// `<config dir>/social-downloader/settings.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(SETTINGS_FILE)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Settings> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn settings(&self) -> Settings {
        self.lock().clone()
    }

    pub fn get(&self, key: &str) -> Result<Value, DownloadError> {
        self.lock()
            .to_map()?
            .remove(key)
            .ok_or_else(|| DownloadError::Settings(format!("unknown key: {}", key)))
    }

    /// Every key with its current value
    pub fn all(&self) -> Result<Map<String, Value>, DownloadError> {
        self.lock().to_map()
    }

    /// Update one key and write the file. The value must have the key's type.
    pub fn set(&self, key: &str, value: Value) -> Result<(), DownloadError> {
        let mut current = self.lock();
        let mut map = current.to_map()?;
        if !map.contains_key(key) {
            return Err(DownloadError::Settings(format!("unknown key: {}", key)));
        }
        map.insert(key.to_string(), value);

        let updated: Settings = serde_json::from_value(Value::Object(map))
            .map_err(|e| DownloadError::Settings(format!("invalid value for {}: {}", key, e)))?;
        if let Some(path) = &self.path {
            persist(path, &updated)?;
        }
        *current = updated;
        log::info!("[Settings] {} updated", key);
        Ok(())
    }
}

impl ConfigProvider for SettingsStore {
    fn snapshot(&self) -> ConfigurationSnapshot {
        self.lock().snapshot()
    }
}

fn persist(path: &Path, settings: &Settings) -> Result<(), DownloadError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| DownloadError::Settings(e.to_string()))?;
    std::fs::write(path, raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let store = SettingsStore::in_memory(Settings::default());
        assert_eq!(store.get("defaultVideoFormat").unwrap(), json!("mp4"));
        assert_eq!(store.get("embedThumbnails").unwrap(), json!(true));
        assert_eq!(store.get("frameratePreference").unwrap(), json!("auto"));
        assert_eq!(store.all().unwrap().len(), 12);
    }

    #[test]
    fn test_set_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = SettingsStore::open(&path);
        store.set("overwriteFiles", json!(true)).unwrap();
        store.set("customYtdlpArgs", json!("--retries 3")).unwrap();
        assert!(path.exists());

        let reopened = SettingsStore::open(&path);
        let snapshot = reopened.snapshot();
        assert!(snapshot.overwrite_files);
        assert_eq!(snapshot.custom_args, "--retries 3");
    }

    #[test]
    fn test_set_rejects_unknown_key_and_wrong_type() {
        let store = SettingsStore::in_memory(Settings::default());
        assert!(matches!(
            store.set("nope", json!(1)),
            Err(DownloadError::Settings(_))
        ));
        assert!(matches!(
            store.set("embedMetadata", json!("yes")),
            Err(DownloadError::Settings(_))
        ));
        // failed writes leave the value alone
        assert_eq!(store.get("embedMetadata").unwrap(), json!(true));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"defaultAudioFormat":"m4a"}"#).unwrap();

        let settings = SettingsStore::open(&path).settings();
        assert_eq!(settings.default_audio_format, "m4a");
        assert_eq!(settings.default_video_format, "mp4");
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::open(&path);
        assert_eq!(store.settings(), Settings::default());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = SettingsStore::in_memory(Settings::default());
        let before = store.snapshot();
        store.set("defaultVideoFormat", json!("mkv")).unwrap();
        assert_eq!(before.video_format, "mp4");
        assert_eq!(store.snapshot().video_format, "mkv");
    }
}
