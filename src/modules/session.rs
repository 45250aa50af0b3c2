use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::modules::catalog::{find_workout, WorkoutDefinition};
use crate::modules::database::{SessionOutcome, SessionRecord};
use crate::modules::presentation::{AnimationCue, CameraStream, Presentation, ViewMode};
use crate::modules::progression::ProgressionStore;
use crate::modules::scaling::live_scale;
use crate::modules::ticker::{SessionTick, TickHandle, TickScheduler};

const FINAL_COUNTDOWN_SECS: u32 = 5;

static RUNNING_CUE: OnceLock<Regex> = OnceLock::new();
static JUMP_CUE: OnceLock<Regex> = OnceLock::new();

/// Pick the avatar animation from the workout name.
pub fn animation_cue_for(name: &str) -> AnimationCue {
    let running = RUNNING_CUE.get_or_init(|| Regex::new(r"Run|HIIT").expect("valid cue pattern"));
    let jump = JUMP_CUE.get_or_init(|| Regex::new(r"Squat|Jump").expect("valid cue pattern"));
    if running.is_match(name) {
        AnimationCue::Running
    } else if jump.is_match(name) {
        AnimationCue::Jump
    } else {
        AnimationCue::Idle
    }
}

/// The running workout. Owns the camera and tick handles so they end with it.
struct ActiveSession {
    id: u64,
    definition: &'static WorkoutDefinition,
    scaled_duration_secs: u32,
    scaled_xp: u32,
    remaining_secs: u32,
    animation_cue: AnimationCue,
    countdown_announced: bool,
    started_at: DateTime<Utc>,
    camera: Option<Box<dyn CameraStream>>,
    ticks: Option<Box<dyn TickHandle>>,
}

impl ActiveSession {
    fn release(&mut self) {
        if let Some(ticks) = self.ticks.take() {
            ticks.cancel();
        }
        if let Some(camera) = self.camera.take() {
            camera.release();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub session_id: u64,
    pub workout_id: &'static str,
    pub name: &'static str,
    pub duration_secs: u32,
    pub xp: u32,
    pub remaining_secs: u32,
    pub animation_cue: AnimationCue,
    pub camera_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub workout_id: &'static str,
    pub name: &'static str,
    pub duration_secs: u32,
    pub elapsed_secs: u32,
    pub xp_awarded: u32,
    pub outcome: SessionOutcome,
    pub leveled_up: bool,
    pub level_after: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            workout_id: self.workout_id.to_string(),
            workout_name: self.name.to_string(),
            duration_secs: self.duration_secs,
            elapsed_secs: self.elapsed_secs,
            xp_awarded: self.xp_awarded,
            outcome: self.outcome,
            level_after: self.level_after,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Tick for a session that is no longer running.
    Ignored,
    Progress { percent: f64, remaining_secs: u32 },
    Completed(SessionSummary),
}

/// Idle → Running → (Completed | Cancelled) → Idle.
pub struct SessionController {
    presentation: Presentation,
    scheduler: Box<dyn TickScheduler>,
    active: Option<ActiveSession>,
    next_id: u64,
}

impl SessionController {
    pub fn new(presentation: Presentation, scheduler: Box<dyn TickScheduler>) -> Self {
        Self {
            presentation,
            scheduler,
            active: None,
            next_id: 1,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn status(&self) -> Option<SessionStatus> {
        self.active.as_ref().map(|s| SessionStatus {
            session_id: s.id,
            workout_id: s.definition.id,
            name: s.definition.name,
            duration_secs: s.scaled_duration_secs,
            xp: s.scaled_xp,
            remaining_secs: s.remaining_secs,
            animation_cue: s.animation_cue,
            camera_active: s.camera.is_some(),
        })
    }

    pub async fn start(&mut self, workout_id: &str, store: &ProgressionStore) -> Result<SessionStatus> {
        if let Some(active) = &self.active {
            return Err(anyhow!(
                "Workout '{}' is already running",
                active.definition.name
            ));
        }
        let definition = find_workout(workout_id)
            .ok_or_else(|| anyhow!("Unknown workout id: {}", workout_id))?;

        let scaled = live_scale(definition, store.state().level);
        let cue = animation_cue_for(definition.name);

        self.presentation.pose.set_view(ViewMode::Workout);
        self.presentation.pose.set_pose(cue);

        let camera = match self.presentation.camera.open().await {
            Ok(stream) => Some(stream),
            Err(e) => {
                log::warn!("Camera unavailable, continuing without it: {}", e);
                None
            }
        };

        self.presentation.announcer.say(&format!(
            "Starting {}. {} seconds. Let's go!",
            definition.name, scaled.duration_secs
        ));

        let id = self.next_id;
        self.next_id += 1;
        let ticks = self.scheduler.start(id);

        log::info!(
            "Session {} started: {} for {}s, {} XP",
            id,
            definition.id,
            scaled.duration_secs,
            scaled.xp
        );

        self.active = Some(ActiveSession {
            id,
            definition,
            scaled_duration_secs: scaled.duration_secs,
            scaled_xp: scaled.xp,
            remaining_secs: scaled.duration_secs,
            animation_cue: cue,
            countdown_announced: false,
            started_at: Utc::now(),
            camera,
            ticks: Some(ticks),
        });

        self.status().ok_or_else(|| anyhow!("Session vanished after start"))
    }

    /// Apply one scheduled tick. Ticks from a finished session are ignored.
    pub async fn tick(&mut self, tick: SessionTick, store: &mut ProgressionStore) -> TickOutcome {
        let Some(session) = self.active.as_mut() else {
            return TickOutcome::Ignored;
        };
        if session.id != tick.session_id || session.remaining_secs == 0 {
            return TickOutcome::Ignored;
        }

        session.remaining_secs -= 1;
        let duration = session.scaled_duration_secs;
        let remaining = session.remaining_secs;
        let percent = (duration - remaining) as f64 / duration as f64 * 100.0;
        self.presentation.display.progress(percent, remaining);

        if remaining == FINAL_COUNTDOWN_SECS && !session.countdown_announced {
            session.countdown_announced = true;
            self.presentation.announcer.say("Five seconds remaining!");
        }

        if remaining == 0 {
            return match self.complete(store).await {
                Some(summary) => TickOutcome::Completed(summary),
                None => TickOutcome::Ignored,
            };
        }

        TickOutcome::Progress { percent, remaining_secs: remaining }
    }

    async fn complete(&mut self, store: &mut ProgressionStore) -> Option<SessionSummary> {
        let mut session = self.active.take()?;
        session.release();

        self.presentation.announcer.say("Session complete! Great work.");
        let award = store.add_xp(session.scaled_xp).await;
        self.presentation
            .display
            .summary(&format!("+{} XP", award.awarded));
        self.reset_presentation();

        log::info!(
            "Session {} completed: +{} XP (level {}, {} XP)",
            session.id,
            award.awarded,
            award.level,
            award.xp
        );

        Some(SessionSummary {
            workout_id: session.definition.id,
            name: session.definition.name,
            duration_secs: session.scaled_duration_secs,
            elapsed_secs: session.scaled_duration_secs,
            xp_awarded: award.awarded,
            outcome: SessionOutcome::Completed,
            leveled_up: award.leveled_up,
            level_after: award.level,
            started_at: session.started_at,
            ended_at: Utc::now(),
        })
    }

    /// Stop the running session without awarding XP. No-op when idle.
    pub fn cancel(&mut self, store: &ProgressionStore) -> Option<SessionSummary> {
        let mut session = self.active.take()?;
        session.release();
        self.reset_presentation();

        log::info!(
            "Session {} cancelled with {}s remaining",
            session.id,
            session.remaining_secs
        );

        Some(SessionSummary {
            workout_id: session.definition.id,
            name: session.definition.name,
            duration_secs: session.scaled_duration_secs,
            elapsed_secs: session.scaled_duration_secs - session.remaining_secs,
            xp_awarded: 0,
            outcome: SessionOutcome::Cancelled,
            leveled_up: false,
            level_after: store.state().level,
            started_at: session.started_at,
            ended_at: Utc::now(),
        })
    }

    fn reset_presentation(&self) {
        self.presentation.pose.set_pose(AnimationCue::Idle);
        self.presentation.pose.set_view(ViewMode::Dashboard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::presentation::{
        Announcer, CameraSource, NoCamera, PoseDriver, SessionDisplay,
    };
    use crate::modules::progression::MemoryStore;
    use futures::future::BoxFuture;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        said: Mutex<Vec<String>>,
        poses: Mutex<Vec<AnimationCue>>,
        views: Mutex<Vec<ViewMode>>,
        progress: Mutex<Vec<(f64, u32)>>,
        summaries: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn said(&self) -> Vec<String> {
            self.said.lock().unwrap().clone()
        }
    }

    impl Announcer for Recorder {
        fn say(&self, utterance: &str) {
            self.said.lock().unwrap().push(utterance.to_string());
        }
    }

    impl PoseDriver for Recorder {
        fn set_pose(&self, cue: AnimationCue) {
            self.poses.lock().unwrap().push(cue);
        }
        fn set_view(&self, mode: ViewMode) {
            self.views.lock().unwrap().push(mode);
        }
    }

    impl SessionDisplay for Recorder {
        fn progress(&self, percent: f64, remaining_secs: u32) {
            self.progress.lock().unwrap().push((percent, remaining_secs));
        }
        fn summary(&self, text: &str) {
            self.summaries.lock().unwrap().push(text.to_string());
        }
    }

    #[derive(Default)]
    struct FakeCamera {
        opened: AtomicUsize,
        released: Arc<AtomicUsize>,
    }

    struct FakeStream {
        released: Arc<AtomicUsize>,
    }

    impl CameraStream for FakeStream {
        fn release(self: Box<Self>) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl CameraSource for FakeCamera {
        fn open(&self) -> BoxFuture<'_, Result<Box<dyn CameraStream>>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let released = self.released.clone();
            Box::pin(async move { Ok(Box::new(FakeStream { released }) as Box<dyn CameraStream>) })
        }
    }

    #[derive(Default)]
    struct ManualScheduler {
        started: Arc<Mutex<Vec<u64>>>,
        cancelled: Arc<AtomicUsize>,
    }

    struct ManualHandle {
        cancelled: Arc<AtomicUsize>,
    }

    impl TickHandle for ManualHandle {
        fn cancel(self: Box<Self>) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl TickScheduler for ManualScheduler {
        fn start(&self, session_id: u64) -> Box<dyn TickHandle> {
            self.started.lock().unwrap().push(session_id);
            Box::new(ManualHandle { cancelled: self.cancelled.clone() })
        }
    }

    struct Harness {
        controller: SessionController,
        store: ProgressionStore,
        recorder: Arc<Recorder>,
        camera_released: Arc<AtomicUsize>,
        ticks_cancelled: Arc<AtomicUsize>,
    }

    async fn harness_at(level: u32, xp: u32, camera: bool) -> Harness {
        let recorder = Arc::new(Recorder::default());
        let fake_camera = FakeCamera::default();
        let camera_released = fake_camera.released.clone();
        let camera_source: Arc<dyn CameraSource> = if camera {
            Arc::new(fake_camera)
        } else {
            Arc::new(NoCamera)
        };
        let presentation = Presentation {
            announcer: recorder.clone(),
            pose: recorder.clone(),
            camera: camera_source,
            display: recorder.clone(),
        };
        let scheduler = ManualScheduler::default();
        let ticks_cancelled = scheduler.cancelled.clone();

        let mut entries = HashMap::new();
        entries.insert("level".to_string(), level.to_string());
        entries.insert("xp".to_string(), xp.to_string());
        let store = ProgressionStore::load(Arc::new(MemoryStore::with_entries(entries))).await;

        Harness {
            controller: SessionController::new(presentation, Box::new(scheduler)),
            store,
            recorder,
            camera_released,
            ticks_cancelled,
        }
    }

    async fn run_to_end(h: &mut Harness, session_id: u64) -> (usize, TickOutcome) {
        let mut ticks = 0;
        loop {
            let outcome = h.controller.tick(SessionTick { session_id }, &mut h.store).await;
            ticks += 1;
            if !matches!(outcome, TickOutcome::Progress { .. }) {
                return (ticks, outcome);
            }
            assert!(ticks < 10_000, "session never finished");
        }
    }

    #[test]
    fn test_animation_cues() {
        assert_eq!(animation_cue_for("Run in Place"), AnimationCue::Running);
        assert_eq!(animation_cue_for("HIIT Blast"), AnimationCue::Running);
        assert_eq!(animation_cue_for("Power Squats"), AnimationCue::Jump);
        assert_eq!(animation_cue_for("Jumping Jacks"), AnimationCue::Jump);
        assert_eq!(animation_cue_for("Breathing Flow"), AnimationCue::Idle);
        assert_eq!(animation_cue_for("running late"), AnimationCue::Idle);
    }

    #[tokio::test]
    async fn test_full_session_awards_live_xp() {
        let mut h = harness_at(1, 0, true).await;
        let status = h.controller.start("s1", &h.store).await.unwrap();
        assert_eq!(status.duration_secs, 33);
        assert_eq!(status.xp, 105);
        assert_eq!(status.remaining_secs, 33);
        assert_eq!(status.animation_cue, AnimationCue::Jump);
        assert!(status.camera_active);

        let (ticks, outcome) = run_to_end(&mut h, status.session_id).await;
        assert_eq!(ticks, 33);
        match outcome {
            TickOutcome::Completed(summary) => {
                assert_eq!(summary.xp_awarded, 105);
                assert_eq!(summary.outcome, SessionOutcome::Completed);
                assert!(!summary.leveled_up);
            }
            other => panic!("expected completion, got {:?}", other),
        }

        assert_eq!((h.store.state().level, h.store.state().xp), (1, 105));
        assert!(!h.controller.is_running());
        assert_eq!(h.camera_released.load(Ordering::SeqCst), 1);
        assert_eq!(h.ticks_cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(h.recorder.summaries.lock().unwrap().clone(), vec!["+105 XP".to_string()]);
        assert_eq!(h.recorder.views.lock().unwrap().last(), Some(&ViewMode::Dashboard));
    }

    #[tokio::test]
    async fn test_five_second_warning_fires_once() {
        let mut h = harness_at(1, 0, false).await;
        let status = h.controller.start("s1", &h.store).await.unwrap();
        run_to_end(&mut h, status.session_id).await;

        let warnings = h
            .recorder
            .said()
            .iter()
            .filter(|s| s.contains("Five seconds"))
            .count();
        assert_eq!(warnings, 1);

        let progress = h.recorder.progress.lock().unwrap().clone();
        assert_eq!(progress.len(), 33);
        assert_eq!(progress.last(), Some(&(100.0, 0)));
        let warning_at = h.recorder.said().iter().position(|s| s.contains("Five seconds")).unwrap();
        assert_eq!(warning_at, 1);
    }

    #[tokio::test]
    async fn test_short_session_never_warns() {
        let mut h = harness_at(1, 0, false).await;
        let status = h.controller.start("s1", &h.store).await.unwrap();
        // Skip ahead: leave four seconds on the clock.
        h.controller.active.as_mut().unwrap().remaining_secs = 4;
        let (ticks, outcome) = run_to_end(&mut h, status.session_id).await;
        assert_eq!(ticks, 4);
        assert!(matches!(outcome, TickOutcome::Completed(_)));
        assert!(!h.recorder.said().iter().any(|s| s.contains("Five seconds")));
    }

    #[tokio::test]
    async fn test_cancel_awards_nothing_and_releases() {
        let mut h = harness_at(1, 0, true).await;
        let status = h.controller.start("c1", &h.store).await.unwrap();
        for _ in 0..10 {
            h.controller.tick(SessionTick { session_id: status.session_id }, &mut h.store).await;
        }

        let summary = h.controller.cancel(&h.store).expect("session was running");
        assert_eq!(summary.outcome, SessionOutcome::Cancelled);
        assert_eq!(summary.xp_awarded, 0);
        assert_eq!(summary.elapsed_secs, 10);
        assert_eq!(h.store.state().xp, 0);
        assert_eq!(h.camera_released.load(Ordering::SeqCst), 1);
        assert_eq!(h.ticks_cancelled.load(Ordering::SeqCst), 1);
        assert!(!h.controller.is_running());

        // Late ticks from the cancelled session are dropped.
        let late = h.controller.tick(SessionTick { session_id: status.session_id }, &mut h.store).await;
        assert_eq!(late, TickOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_cancel_when_idle_is_noop() {
        let mut h = harness_at(1, 0, true).await;
        assert!(h.controller.cancel(&h.store).is_none());
        assert_eq!(h.camera_released.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_camera_failure_is_not_fatal() {
        let mut h = harness_at(1, 0, false).await;
        let status = h.controller.start("z1", &h.store).await.unwrap();
        assert!(!status.camera_active);
        assert_eq!(status.animation_cue, AnimationCue::Idle);
        assert!(h.controller.is_running());
    }

    #[tokio::test]
    async fn test_second_start_rejected_while_running() {
        let mut h = harness_at(1, 0, true).await;
        let first = h.controller.start("s1", &h.store).await.unwrap();
        assert!(h.controller.start("c2", &h.store).await.is_err());
        assert_eq!(h.controller.status().unwrap().session_id, first.session_id);
    }

    #[tokio::test]
    async fn test_unknown_workout_rejected() {
        let mut h = harness_at(1, 0, true).await;
        assert!(h.controller.start("x9", &h.store).await.is_err());
        assert!(!h.controller.is_running());
    }

    #[tokio::test]
    async fn test_completion_can_level_up() {
        let mut h = harness_at(4, 1950, false).await;
        let status = h.controller.start("s1", &h.store).await.unwrap();
        assert_eq!(status.xp, 120);
        let (_, outcome) = run_to_end(&mut h, status.session_id).await;
        match outcome {
            TickOutcome::Completed(summary) => {
                assert!(summary.leveled_up);
                assert_eq!(summary.level_after, 5);
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!((h.store.state().level, h.store.state().xp), (5, 0));
    }

    #[tokio::test]
    async fn test_sessions_get_fresh_ids() {
        let mut h = harness_at(1, 0, false).await;
        let first = h.controller.start("s1", &h.store).await.unwrap();
        h.controller.cancel(&h.store);
        let second = h.controller.start("s1", &h.store).await.unwrap();
        assert_ne!(first.session_id, second.session_id);

        let stale = h.controller.tick(SessionTick { session_id: first.session_id }, &mut h.store).await;
        assert_eq!(stale, TickOutcome::Ignored);
        assert_eq!(h.controller.status().unwrap().remaining_secs, 33);
    }
}
