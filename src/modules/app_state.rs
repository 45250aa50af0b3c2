use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::modules::ai_integration::ChatAssistant;
use crate::modules::catalog::Course;
use crate::modules::config::AppConfig;
use crate::modules::dashboard::{dashboard_view, DashboardView, HudSnapshot};
use crate::modules::database::{ProgressDatabase, SessionRecord};
use crate::modules::leaderboard::{generate_leaderboard, LeaderboardEntry};
use crate::modules::presentation::Presentation;
use crate::modules::progression::{ProfileUpdate, ProgressEvent, ProgressionStore};
use crate::modules::session::{SessionController, SessionStatus, SessionSummary, TickOutcome};
use crate::modules::ticker::{SessionTick, TickScheduler, TokioTickScheduler};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Shared handles for the whole app. Lock order: session, then progression.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Mutex<AppConfig>>,
    pub progression: Arc<Mutex<ProgressionStore>>,
    pub session: Arc<Mutex<SessionController>>,
    pub database: Arc<ProgressDatabase>,
    pub assistant: Arc<ChatAssistant>,
}

impl AppState {
    pub async fn new(config: AppConfig, presentation: Presentation) -> Result<Self> {
        let db_path = config.database_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        let db_path = db_path.to_str().context("Database path is not valid UTF-8")?;
        let database = Arc::new(ProgressDatabase::new(db_path).await?);
        let assistant = ChatAssistant::from_config(&config).await;

        let (scheduler, ticks) = TokioTickScheduler::new(TICK_PERIOD);
        let state = Self::from_parts(config, presentation, database, assistant, Box::new(scheduler)).await;

        // Single consumer: ticks are applied strictly one after another.
        let pump = state.clone();
        tokio::spawn(async move {
            pump.run_tick_pump(ticks).await;
        });

        Ok(state)
    }

    pub async fn from_parts(
        config: AppConfig,
        presentation: Presentation,
        database: Arc<ProgressDatabase>,
        assistant: ChatAssistant,
        scheduler: Box<dyn TickScheduler>,
    ) -> Self {
        let progression = ProgressionStore::load(database.clone()).await;
        Self {
            config: Arc::new(Mutex::new(config)),
            progression: Arc::new(Mutex::new(progression)),
            session: Arc::new(Mutex::new(SessionController::new(presentation, scheduler))),
            database,
            assistant: Arc::new(assistant),
        }
    }

    pub async fn run_tick_pump(&self, mut ticks: mpsc::UnboundedReceiver<SessionTick>) {
        while let Some(tick) = ticks.recv().await {
            self.apply_tick(tick).await;
        }
    }

    pub async fn apply_tick(&self, tick: SessionTick) -> TickOutcome {
        let outcome = {
            let mut session = self.session.lock().await;
            let mut progression = self.progression.lock().await;
            session.tick(tick, &mut progression).await
        };
        if let TickOutcome::Completed(summary) = &outcome {
            self.record(summary).await;
        }
        outcome
    }

    pub async fn start_workout(&self, workout_id: &str) -> Result<SessionStatus> {
        let mut session = self.session.lock().await;
        let progression = self.progression.lock().await;
        session.start(workout_id, &progression).await
    }

    pub async fn cancel_workout(&self) -> Option<SessionSummary> {
        let summary = {
            let mut session = self.session.lock().await;
            let progression = self.progression.lock().await;
            session.cancel(&progression)
        }?;
        self.record(&summary).await;
        Some(summary)
    }

    /// The receiver sees every event committed after this call returns.
    pub async fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progression.lock().await.subscribe()
    }

    pub async fn session_status(&self) -> Option<SessionStatus> {
        self.session.lock().await.status()
    }

    async fn record(&self, summary: &SessionSummary) {
        if let Err(e) = self.database.record_session(&summary.to_record()).await {
            log::warn!("Failed to record session history: {}", e);
        }
    }

    pub async fn hud(&self) -> HudSnapshot {
        HudSnapshot::from_state(self.progression.lock().await.state())
    }

    pub async fn dashboard(&self) -> DashboardView {
        dashboard_view(self.progression.lock().await.state())
    }

    pub async fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let progression = self.progression.lock().await;
        let state = progression.state();
        generate_leaderboard(&state.user, state.steps)
    }

    pub async fn select_course(&self, course: Course) -> DashboardView {
        let mut progression = self.progression.lock().await;
        progression.select_course(course).await;
        dashboard_view(progression.state())
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<HudSnapshot> {
        let mut progression = self.progression.lock().await;
        progression.update_profile(update).await?;
        Ok(HudSnapshot::from_state(progression.state()))
    }

    pub async fn record_steps(&self, steps: u32) -> HudSnapshot {
        let mut progression = self.progression.lock().await;
        progression.record_steps(steps).await;
        HudSnapshot::from_state(progression.state())
    }

    pub async fn session_history(&self, limit: u32) -> Result<Vec<SessionRecord>> {
        self.database.recent_sessions(limit).await
    }

    pub async fn chat(&self, prompt: &str) -> String {
        self.assistant.reply(prompt).await
    }
}
