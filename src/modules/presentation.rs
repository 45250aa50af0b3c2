//! Narrow capability interfaces the session controller drives.
//!
//! Rendering, speech and camera capture live outside the core; the controller
//! only ever talks to these traits, so it can run headless and under test.

use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnimationCue {
    Idle,
    Running,
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Dashboard,
    Workout,
}

/// Speech output. Fire-and-forget.
pub trait Announcer: Send + Sync {
    fn say(&self, utterance: &str);
}

/// Avatar pose and virtual camera placement.
pub trait PoseDriver: Send + Sync {
    fn set_pose(&self, cue: AnimationCue);
    fn set_view(&self, mode: ViewMode);
}

/// A live capture stream. Must be released explicitly.
pub trait CameraStream: Send {
    fn release(self: Box<Self>);
}

pub trait CameraSource: Send + Sync {
    fn open(&self) -> BoxFuture<'_, Result<Box<dyn CameraStream>>>;
}

/// Workout progress and result display.
pub trait SessionDisplay: Send + Sync {
    fn progress(&self, percent: f64, remaining_secs: u32);
    fn summary(&self, text: &str);
}

#[derive(Clone)]
pub struct Presentation {
    pub announcer: Arc<dyn Announcer>,
    pub pose: Arc<dyn PoseDriver>,
    pub camera: Arc<dyn CameraSource>,
    pub display: Arc<dyn SessionDisplay>,
}

impl Presentation {
    /// Everything routed to the log, no camera.
    pub fn headless() -> Self {
        let log = Arc::new(LogPresenter);
        Self {
            announcer: log.clone(),
            pose: log.clone(),
            camera: Arc::new(NoCamera),
            display: log,
        }
    }
}

pub struct LogPresenter;

impl Announcer for LogPresenter {
    fn say(&self, utterance: &str) {
        log::info!("[voice] {}", utterance);
    }
}

impl PoseDriver for LogPresenter {
    fn set_pose(&self, cue: AnimationCue) {
        log::debug!("[avatar] pose {:?}", cue);
    }

    fn set_view(&self, mode: ViewMode) {
        log::debug!("[avatar] view {:?}", mode);
    }
}

impl SessionDisplay for LogPresenter {
    fn progress(&self, percent: f64, remaining_secs: u32) {
        log::debug!("[session] {:.0}% ({}s left)", percent, remaining_secs);
    }

    fn summary(&self, text: &str) {
        log::info!("[session] {}", text);
    }
}

pub struct NoCamera;

impl CameraSource for NoCamera {
    fn open(&self) -> BoxFuture<'_, Result<Box<dyn CameraStream>>> {
        Box::pin(async { Err(anyhow::anyhow!("No camera available")) })
    }
}
