use tauri::AppHandle;

use crate::state::app_state::{lock, AppState};
use crate::stealth::erase::{emergency_erase as erase_and_exit, EraseOutcome};
use crate::stealth::guard::GuardReport;
use crate::stealth::identity::ProcessIdentity;

/// Hides the overlay and drops every global hotkey ahead of an erase.
pub fn conceal(state: &AppState) {
    let mut window = lock(&state.window);
    if let Err(e) = window.hide() {
        log::warn!("Could not hide overlay during erase: {}", e);
    }
    window.release_shortcuts();
}

#[tauri::command]
pub fn get_process_identity(state: tauri::State<'_, AppState>) -> ProcessIdentity {
    state.identity.clone()
}

#[tauri::command]
pub fn get_guard_report(state: tauri::State<'_, AppState>) -> GuardReport {
    state.guard.clone()
}

#[tauri::command]
pub async fn emergency_erase(app: AppHandle, state: tauri::State<'_, AppState>) -> Result<(), String> {
    let outcome = erase_and_exit(
        &state.session,
        || conceal(&state),
        || app.exit(0),
    )
    .await;
    match outcome {
        EraseOutcome::Wiped => Ok(()),
        other => Err(format!("Erase incomplete: {:?}", other)),
    }
}
