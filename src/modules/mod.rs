// Module declarations
pub mod ai_integration;
pub mod app_state;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod database;
pub mod leaderboard;
pub mod presentation;
pub mod progression;
pub mod scaling;
pub mod session;
pub mod ticker;

// Desktop shell glue
#[cfg(feature = "desktop")]
pub mod tauri_commands;
#[cfg(feature = "desktop")]
pub mod utils;
