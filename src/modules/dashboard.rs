use serde::Serialize;

use crate::modules::catalog::{challenges, workouts_for, Course, WorkoutDefinition};
use crate::modules::progression::{ProgressionState, Theme};
use crate::modules::scaling::preview_scale;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HudSnapshot {
    pub user: String,
    pub course: Course,
    pub course_name: &'static str,
    pub level: u32,
    pub xp: u32,
    pub xp_required: u32,
    pub steps: u32,
    pub goal: u32,
    pub goal_percent: u32,
    pub theme: Theme,
}

impl HudSnapshot {
    pub fn from_state(state: &ProgressionState) -> Self {
        let goal_percent = if state.goal > 0 {
            ((state.steps as u64 * 100) / state.goal as u64).min(100) as u32
        } else {
            0
        };
        Self {
            user: state.user.clone(),
            course: state.course,
            course_name: state.course.display_name(),
            level: state.level,
            xp: state.xp,
            xp_required: state.required_xp(),
            steps: state.steps,
            goal: state.goal,
            goal_percent,
            theme: state.theme,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutPreview {
    pub id: &'static str,
    pub name: &'static str,
    pub duration_secs: u32,
    pub xp: u32,
}

impl WorkoutPreview {
    fn new(def: &WorkoutDefinition, level: u32) -> Self {
        let scaled = preview_scale(def, level);
        Self {
            id: def.id,
            name: def.name,
            duration_secs: scaled.duration_secs,
            xp: scaled.xp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub hud: HudSnapshot,
    pub workouts: Vec<WorkoutPreview>,
    pub challenges: Vec<WorkoutPreview>,
}

/// Rebuilt whenever the level or course changes.
pub fn dashboard_view(state: &ProgressionState) -> DashboardView {
    DashboardView {
        hud: HudSnapshot::from_state(state),
        workouts: workouts_for(state.course)
            .iter()
            .map(|w| WorkoutPreview::new(w, state.level))
            .collect(),
        challenges: challenges()
            .into_iter()
            .map(|w| WorkoutPreview::new(w, state.level))
            .collect(),
    }
}
