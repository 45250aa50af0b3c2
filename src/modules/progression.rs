use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::modules::catalog::Course;

pub const XP_PER_LEVEL: u32 = 500;
/// Highest level whose successor still has a representable threshold.
pub const MAX_LEVEL: u32 = u32::MAX / XP_PER_LEVEL - 1;
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(format!("Unknown theme: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionState {
    pub user: String,
    pub course: Course,
    pub level: u32,
    pub xp: u32,
    pub steps: u32,
    pub goal: u32,
    pub theme: Theme,
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self {
            user: "Athlete".to_string(),
            course: Course::Strength,
            level: 1,
            xp: 0,
            steps: 0,
            goal: 10_000,
            theme: Theme::Dark,
        }
    }
}

impl ProgressionState {
    pub fn required_xp(&self) -> u32 {
        self.level.saturating_mul(XP_PER_LEVEL)
    }

    /// Rebuild from persisted entries. Absent or malformed values fall back to defaults.
    pub fn from_entries(entries: &HashMap<String, String>) -> Self {
        let defaults = Self::default();

        fn parsed<T: FromStr>(entries: &HashMap<String, String>, key: &str) -> Option<T> {
            entries.get(key).and_then(|v| v.trim().parse::<T>().ok())
        }

        let level = parsed::<u32>(entries, "level")
            .filter(|l| (1..=MAX_LEVEL).contains(l))
            .unwrap_or(defaults.level);
        // xp at or past the threshold cannot be at rest; treat it as malformed.
        let xp = parsed::<u32>(entries, "xp")
            .filter(|x| *x < level * XP_PER_LEVEL)
            .unwrap_or(defaults.xp);

        Self {
            user: entries
                .get("user")
                .filter(|u| !u.trim().is_empty())
                .cloned()
                .unwrap_or(defaults.user),
            course: parsed(entries, "course").unwrap_or(defaults.course),
            level,
            xp,
            steps: parsed(entries, "steps").unwrap_or(defaults.steps),
            goal: parsed::<u32>(entries, "goal").filter(|g| *g > 0).unwrap_or(defaults.goal),
            theme: parsed(entries, "theme").unwrap_or(defaults.theme),
        }
    }

    pub fn to_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("user", self.user.clone()),
            ("course", self.course.to_string()),
            ("level", self.level.to_string()),
            ("xp", self.xp.to_string()),
            ("steps", self.steps.to_string()),
            ("goal", self.goal.to_string()),
            ("theme", self.theme.to_string()),
        ]
    }
}

/// Durable string key-value storage backing the progression snapshot.
pub trait KeyValueStore: Send + Sync {
    fn load_entries(&self) -> BoxFuture<'_, Result<HashMap<String, String>>>;
    fn save_entries<'a>(&'a self, entries: &'a [(&'static str, String)]) -> BoxFuture<'a, Result<()>>;
}

/// Process-local store, used headless and in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self { entries: Mutex::new(entries), fail_writes: false }
    }

    pub fn failing() -> Self {
        Self { entries: Mutex::new(HashMap::new()), fail_writes: true }
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load_entries(&self) -> BoxFuture<'_, Result<HashMap<String, String>>> {
        Box::pin(async move {
            self.entries
                .lock()
                .map(|e| e.clone())
                .map_err(|_| anyhow!("memory store poisoned"))
        })
    }

    fn save_entries<'a>(&'a self, entries: &'a [(&'static str, String)]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.fail_writes {
                return Err(anyhow!("storage is read-only"));
            }
            let mut stored = self.entries.lock().map_err(|_| anyhow!("memory store poisoned"))?;
            for (key, value) in entries {
                stored.insert(key.to_string(), value.clone());
            }
            Ok(())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    Changed(ProgressionState),
    LevelUp { level: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XpAward {
    pub awarded: u32,
    pub level: u32,
    pub xp: u32,
    pub leveled_up: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub user: Option<String>,
    pub goal: Option<u32>,
    pub theme: Option<Theme>,
}

/// Owns the progression snapshot. Every mutation is mutate → persist → broadcast.
pub struct ProgressionStore {
    state: ProgressionState,
    backend: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<ProgressEvent>,
}

impl ProgressionStore {
    pub async fn load(backend: Arc<dyn KeyValueStore>) -> Self {
        let state = match backend.load_entries().await {
            Ok(entries) if entries.is_empty() => {
                log::info!("No saved progression found, starting fresh");
                ProgressionState::default()
            }
            Ok(entries) => ProgressionState::from_entries(&entries),
            Err(e) => {
                log::warn!("Failed to load progression, using defaults: {}", e);
                ProgressionState::default()
            }
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { state, backend, events }
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Award XP. Crossing the threshold levels up once and resets xp to 0;
    /// any overflow past the threshold is dropped.
    pub async fn add_xp(&mut self, amount: u32) -> XpAward {
        self.state.xp = self.state.xp.saturating_add(amount);
        let required = self.state.required_xp();
        let leveled_up = self.state.xp >= required;
        if leveled_up {
            self.state.level = self.state.level.saturating_add(1);
            self.state.xp = 0;
            log::info!("Level up! Now level {}", self.state.level);
            let _ = self.events.send(ProgressEvent::LevelUp { level: self.state.level });
        }
        self.commit().await;
        XpAward {
            awarded: amount,
            level: self.state.level,
            xp: self.state.xp,
            leveled_up,
        }
    }

    pub async fn select_course(&mut self, course: Course) {
        self.state.course = course;
        self.commit().await;
    }

    pub async fn update_profile(&mut self, update: ProfileUpdate) -> Result<()> {
        if let Some(goal) = update.goal {
            if goal == 0 {
                return Err(anyhow!("Daily goal must be greater than zero"));
            }
        }
        if let Some(user) = update.user {
            let user = user.trim();
            if !user.is_empty() {
                self.state.user = user.to_string();
            }
        }
        if let Some(goal) = update.goal {
            self.state.goal = goal;
        }
        if let Some(theme) = update.theme {
            self.state.theme = theme;
        }
        self.commit().await;
        Ok(())
    }

    pub async fn record_steps(&mut self, steps: u32) {
        self.state.steps = steps;
        self.commit().await;
    }

    async fn commit(&self) {
        // In-memory state stays authoritative when the write fails.
        if let Err(e) = self.backend.save_entries(&self.state.to_entries()).await {
            log::warn!("Failed to persist progression: {}", e);
        }
        let _ = self.events.send(ProgressEvent::Changed(self.state.clone()));
    }
}
