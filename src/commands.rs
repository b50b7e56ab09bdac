// Tauri adapter: webview events and invoke handlers

use serde_json::{Map, Value};
use std::sync::Arc;
use tauri::{AppHandle, Emitter, State, Wry};

use crate::downloader::bridge::DownloadEvent;
use crate::downloader::models::{OutputKind, Submission};
use crate::downloader::orchestrator::DownloadService;
use crate::downloader::scheduler::{Admission, SchedulerStatus};
use crate::downloader::traits::EventSink;
use crate::settings::SettingsStore;

impl EventSink for AppHandle {
    fn emit(&self, event: &DownloadEvent) {
        if let Err(e) = Emitter::emit(self, event.channel(), event.clone()) {
            log::warn!("[Commands] Failed to emit {}: {}", event.channel(), e);
        }
    }
}

pub struct AppState {
    pub service: DownloadService,
    pub settings: Arc<SettingsStore>,
}

/// One URL starts a single download, several start a batch.
///
/// Must stay async: the batch is spawned on the calling runtime.
#[tauri::command]
pub async fn submit_download(
    state: State<'_, AppState>,
    urls: Vec<String>,
    quality: String,
    format: String,
) -> Result<Admission, String> {
    let kind = OutputKind::from_format(&format);
    let submission = match urls.as_slice() {
        [url] => Submission::single(url, &quality, kind),
        _ => Submission::batch(&urls, &quality, kind).map_err(|e| e.to_string())?,
    };
    state.service.submit(submission).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn download_status(state: State<'_, AppState>) -> SchedulerStatus {
    state.service.status()
}

#[tauri::command]
pub fn abort_batch(state: State<'_, AppState>) -> usize {
    state.service.scheduler().abort_batch()
}

#[tauri::command]
pub fn terminate_download(state: State<'_, AppState>) -> bool {
    state.service.scheduler().terminate_active()
}

#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> Result<Map<String, Value>, String> {
    state.settings.all().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn set_setting(state: State<'_, AppState>, key: String, value: Value) -> Result<(), String> {
    state.settings.set(&key, value).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn download_thumbnail(
    state: State<'_, AppState>,
    url: String,
    title: String,
) -> Result<String, String> {
    state
        .service
        .save_thumbnail(&url, &title)
        .await
        .map(|path| path.to_string_lossy().to_string())
        .map_err(|e| e.to_string())
}

/// Register state, handlers and the webview event sink on `builder`
pub fn register(
    builder: tauri::Builder<Wry>,
    service: DownloadService,
    settings: Arc<SettingsStore>,
) -> tauri::Builder<Wry> {
    let events = service.clone();
    builder
        .manage(AppState { service, settings })
        .setup(move |app| {
            events.attach(Arc::new(app.handle().clone()));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            submit_download,
            download_status,
            abort_batch,
            terminate_download,
            get_settings,
            set_setting,
            download_thumbnail,
        ])
}
