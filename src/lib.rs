// Module declarations
pub mod modules;

#[cfg(feature = "desktop")]
use modules::{
    app_state::AppState,
    config::AppConfig,
    tauri_commands::*,
    utils::{forward_progress_events, send_log, webview_presentation},
};

#[cfg(feature = "desktop")]
use tauri::Manager;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_log::Builder::new()
            .target(tauri_plugin_log::Target::new(
                tauri_plugin_log::TargetKind::Stdout,
            ))
            .build())
        .plugin(tauri_plugin_notification::init())
        .invoke_handler(tauri::generate_handler![
            get_hud,
            get_dashboard,
            get_catalog,
            select_course,
            update_profile,
            record_steps,
            get_leaderboard,
            start_workout,
            cancel_workout,
            get_session_status,
            get_session_history,
            chat,
            load_app_config,
            save_app_config,
        ])
        .setup(|app| {
            let app_handle = app.handle().clone();

            let config = AppConfig::load_from(&AppConfig::default_path()).unwrap_or_else(|e| {
                log::warn!("Using default config: {}", e);
                AppConfig::default()
            });
            let presentation = webview_presentation(&app_handle, &config);
            let state = tauri::async_runtime::block_on(AppState::new(config, presentation))?;

            let events = tauri::async_runtime::block_on(state.subscribe_progress());
            forward_progress_events(&app_handle, events);
            app.manage(state);

            send_log(&app_handle, "info", "FitQuest initialized successfully");
            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
