use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Local;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tauri::{AppHandle, Emitter};
use tauri_plugin_notification::NotificationExt;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::modules::config::AppConfig;
use crate::modules::dashboard::{dashboard_view, HudSnapshot};
use crate::modules::presentation::{
    AnimationCue, Announcer, CameraSource, CameraStream, PoseDriver, Presentation, SessionDisplay,
    ViewMode,
};
use crate::modules::progression::ProgressEvent;

#[derive(Serialize, Deserialize, Clone)]
pub struct LogMessage {
    pub level: String,
    pub message: String,
    pub timestamp: String,
}

pub fn send_log(app: &AppHandle, level: &str, message: &str) {
    let log_message = LogMessage {
        level: level.to_string(),
        message: message.to_string(),
        timestamp: Local::now().format("%H:%M:%S").to_string(),
    };

    if let Err(e) = app.emit("log_message", &log_message) {
        log::error!("Failed to emit log message: {}", e);
    }

    match level {
        "error" => log::error!("{}", message),
        "warn" => log::warn!("{}", message),
        "debug" => log::debug!("{}", message),
        _ => log::info!("{}", message),
    }
}

pub fn send_notification(app: &AppHandle, title: &str, body: &str) {
    if let Err(e) = app.notification().builder().title(title).body(body).show() {
        log::warn!("Failed to show notification: {}", e);
    }
}

fn emit_or_warn<S: Serialize + Clone>(app: &AppHandle, event: &str, payload: S) {
    if let Err(e) = app.emit(event, payload) {
        log::warn!("Failed to emit {}: {}", event, e);
    }
}

/// Avatar, voice and session display rendered by the webview.
pub struct WebviewPresenter {
    app: AppHandle,
    voice_enabled: bool,
}

impl Announcer for WebviewPresenter {
    fn say(&self, utterance: &str) {
        if self.voice_enabled {
            emit_or_warn(&self.app, "speak", utterance);
        }
    }
}

impl PoseDriver for WebviewPresenter {
    fn set_pose(&self, cue: AnimationCue) {
        emit_or_warn(&self.app, "avatar_pose", cue);
    }

    fn set_view(&self, mode: ViewMode) {
        emit_or_warn(&self.app, "view_mode", mode);
    }
}

impl SessionDisplay for WebviewPresenter {
    fn progress(&self, percent: f64, remaining_secs: u32) {
        emit_or_warn(
            &self.app,
            "session_progress",
            serde_json::json!({ "percent": percent, "remaining_secs": remaining_secs }),
        );
    }

    fn summary(&self, text: &str) {
        emit_or_warn(&self.app, "session_summary", text);
    }
}

/// The webview owns the actual media stream; we only switch it on and off.
pub struct WebviewCamera {
    app: AppHandle,
    enabled: bool,
}

struct WebviewCameraStream {
    app: AppHandle,
}

impl CameraStream for WebviewCameraStream {
    fn release(self: Box<Self>) {
        emit_or_warn(&self.app, "camera", serde_json::json!({ "active": false }));
    }
}

impl CameraSource for WebviewCamera {
    fn open(&self) -> BoxFuture<'_, Result<Box<dyn CameraStream>>> {
        Box::pin(async move {
            if !self.enabled {
                return Err(anyhow!("Camera disabled in config"));
            }
            self.app
                .emit("camera", serde_json::json!({ "active": true }))
                .map_err(|e| anyhow!("Failed to request camera: {}", e))?;
            Ok(Box::new(WebviewCameraStream { app: self.app.clone() }) as Box<dyn CameraStream>)
        })
    }
}

pub fn webview_presentation(app: &AppHandle, config: &AppConfig) -> Presentation {
    let presenter = Arc::new(WebviewPresenter {
        app: app.clone(),
        voice_enabled: config.voice_enabled,
    });
    Presentation {
        announcer: presenter.clone(),
        pose: presenter.clone(),
        camera: Arc::new(WebviewCamera { app: app.clone(), enabled: config.camera_enabled }),
        display: presenter,
    }
}

/// Relay progression changes to the webview so HUD and dashboard re-render.
/// Relays progression events to the webview. Take the receiver before the
/// state is shared so no early change is missed.
pub fn forward_progress_events(app: &AppHandle, mut events: broadcast::Receiver<ProgressEvent>) {
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ProgressEvent::Changed(snapshot)) => {
                    emit_or_warn(&app, "progression_changed", HudSnapshot::from_state(&snapshot));
                    emit_or_warn(&app, "dashboard_changed", dashboard_view(&snapshot));
                }
                Ok(ProgressEvent::LevelUp { level }) => {
                    emit_or_warn(&app, "level_up", level);
                    send_notification(&app, "Level up!", &format!("You reached level {}", level));
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Dropped {} progression events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
