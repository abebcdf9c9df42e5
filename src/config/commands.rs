use serde_json::Value;
use tauri::{AppHandle, Emitter};

use crate::error::Result;
use crate::events;
use crate::state::app_state::{lock, AppState};

#[tauri::command]
pub fn get_config(state: tauri::State<'_, AppState>) -> Result<Value> {
    lock(&state.config).current().to_value()
}

/// Validates and persists a partial config, then pushes window-facing
/// changes to the window manager. A stealth level change made while a
/// session is active is deferred to the next launch.
#[tauri::command]
pub async fn save_config(
    patch: Value,
    app: AppHandle,
    state: tauri::State<'_, AppState>,
) -> Result<Value> {
    let session_active = state
        .session
        .snapshot()
        .await?
        .session
        .is_some_and(|s| s.is_active());

    let (before, after) = {
        let mut config = lock(&state.config);
        let before = config.current().clone();
        let after = config.save(patch)?;
        (before, after)
    };

    let mut window = lock(&state.window);
    if after.stealth_level != before.stealth_level {
        if let Err(e) = window.apply_stealth_level(after.stealth_level, session_active) {
            log::warn!("Stealth level saved but not applied: {}", e);
        }
    }
    if after.layout != before.layout {
        if let Err(e) = window.apply_layout(after.layout) {
            log::warn!("Layout saved but not applied: {}", e);
        }
    }
    if after.shortcuts != before.shortcuts {
        let report = window.register_shortcuts(&after.shortcuts);
        if !report.is_clean() {
            log::warn!(
                "Shortcut update: {} dropped, {} failed",
                report.dropped.len(),
                report.failed.len()
            );
        }
    }
    let _ = app.emit(events::WINDOW_STATE_CHANGED, window.state());
    drop(window);

    after.to_value()
}
