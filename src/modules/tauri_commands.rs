use indexmap::IndexMap;
use tauri::{AppHandle, State};

use crate::modules::app_state::AppState;
use crate::modules::catalog::{catalog, Course, WorkoutDefinition};
use crate::modules::config::AppConfig;
use crate::modules::dashboard::{DashboardView, HudSnapshot};
use crate::modules::database::SessionRecord;
use crate::modules::leaderboard::LeaderboardEntry;
use crate::modules::progression::ProfileUpdate;
use crate::modules::session::{SessionStatus, SessionSummary};
use crate::modules::utils::send_log;

const DEFAULT_HISTORY_LIMIT: u32 = 20;

#[tauri::command]
pub async fn get_hud(state: State<'_, AppState>) -> Result<HudSnapshot, String> {
    Ok(state.hud().await)
}

#[tauri::command]
pub async fn get_dashboard(state: State<'_, AppState>) -> Result<DashboardView, String> {
    Ok(state.dashboard().await)
}

#[tauri::command]
pub fn get_catalog() -> IndexMap<Course, Vec<WorkoutDefinition>> {
    catalog()
        .iter()
        .map(|(course, workouts)| (*course, workouts.to_vec()))
        .collect()
}

#[tauri::command]
pub async fn select_course(
    course: Course,
    state: State<'_, AppState>,
    app: AppHandle,
) -> Result<DashboardView, String> {
    send_log(&app, "info", &format!("Switching to {} course", course));
    Ok(state.select_course(course).await)
}

#[tauri::command]
pub async fn update_profile(
    update: ProfileUpdate,
    state: State<'_, AppState>,
) -> Result<HudSnapshot, String> {
    state.update_profile(update).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn record_steps(steps: u32, state: State<'_, AppState>) -> Result<HudSnapshot, String> {
    Ok(state.record_steps(steps).await)
}

#[tauri::command]
pub async fn get_leaderboard(state: State<'_, AppState>) -> Result<Vec<LeaderboardEntry>, String> {
    Ok(state.leaderboard().await)
}

#[tauri::command]
pub async fn start_workout(
    workout_id: String,
    state: State<'_, AppState>,
    app: AppHandle,
) -> Result<SessionStatus, String> {
    match state.start_workout(&workout_id).await {
        Ok(status) => {
            send_log(&app, "info", &format!("Started {} ({}s)", status.name, status.duration_secs));
            Ok(status)
        }
        Err(e) => {
            send_log(&app, "error", &format!("Failed to start workout: {}", e));
            Err(e.to_string())
        }
    }
}

#[tauri::command]
pub async fn cancel_workout(
    state: State<'_, AppState>,
    app: AppHandle,
) -> Result<Option<SessionSummary>, String> {
    let summary = state.cancel_workout().await;
    if let Some(summary) = &summary {
        send_log(&app, "info", &format!("Cancelled {} after {}s", summary.name, summary.elapsed_secs));
    }
    Ok(summary)
}

#[tauri::command]
pub async fn get_session_status(state: State<'_, AppState>) -> Result<Option<SessionStatus>, String> {
    Ok(state.session_status().await)
}

#[tauri::command]
pub async fn get_session_history(
    limit: Option<u32>,
    state: State<'_, AppState>,
) -> Result<Vec<SessionRecord>, String> {
    state
        .session_history(limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn chat(prompt: String, state: State<'_, AppState>) -> Result<String, String> {
    Ok(state.chat(&prompt).await)
}

#[tauri::command]
pub async fn load_app_config(state: State<'_, AppState>) -> Result<AppConfig, String> {
    Ok(state.config.lock().await.clone())
}

#[tauri::command]
pub async fn save_app_config(
    config: AppConfig,
    state: State<'_, AppState>,
    app: AppHandle,
) -> Result<(), String> {
    config
        .save_to(&AppConfig::default_path())
        .map_err(|e| e.to_string())?;
    *state.config.lock().await = config;
    // Presentation and chat model are wired at startup.
    send_log(&app, "info", "Config saved. Changes apply on next launch");
    Ok(())
}
