use tauri::{AppHandle, Emitter};

use crate::error::{OpStatus, Result};
use crate::events;
use crate::state::app_state::{lock, AppState};
use crate::window::manager::{NudgeDirection, StealthWindowManager, WindowState};

/// Runs one window operation and reports `{success, error?}`. Successful
/// operations broadcast the new window state.
fn window_op<T>(
    app: &AppHandle,
    state: &AppState,
    op: impl FnOnce(&mut StealthWindowManager) -> Result<T>,
) -> OpStatus {
    let mut window = lock(&state.window);
    let result = op(&mut window).map(|_| ());
    if result.is_ok() {
        let _ = app.emit(events::WINDOW_STATE_CHANGED, window.state());
    }
    result.into()
}

#[tauri::command]
pub fn get_window_state(state: tauri::State<'_, AppState>) -> WindowState {
    lock(&state.window).state()
}

#[tauri::command]
pub fn set_click_through(enabled: bool, app: AppHandle, state: tauri::State<'_, AppState>) -> OpStatus {
    window_op(&app, &state, |w| w.set_click_through(enabled))
}

#[tauri::command]
pub fn toggle_click_through(app: AppHandle, state: tauri::State<'_, AppState>) -> OpStatus {
    window_op(&app, &state, |w| w.toggle_click_through())
}

#[tauri::command]
pub fn set_content_protection(
    enabled: bool,
    app: AppHandle,
    state: tauri::State<'_, AppState>,
) -> OpStatus {
    window_op(&app, &state, |w| w.set_content_protection(enabled))
}

#[tauri::command]
pub fn toggle_always_on_top(app: AppHandle, state: tauri::State<'_, AppState>) -> OpStatus {
    window_op(&app, &state, |w| w.toggle_always_on_top())
}

#[tauri::command]
pub fn resize_window(
    width: f64,
    height: f64,
    animated: Option<bool>,
    app: AppHandle,
    state: tauri::State<'_, AppState>,
) -> OpStatus {
    window_op(&app, &state, |w| w.resize(width, height, animated.unwrap_or(false)))
}

#[tauri::command]
pub fn move_window(x: f64, y: f64, app: AppHandle, state: tauri::State<'_, AppState>) -> OpStatus {
    window_op(&app, &state, |w| w.move_to(x, y))
}

#[tauri::command]
pub fn nudge_window(
    direction: NudgeDirection,
    app: AppHandle,
    state: tauri::State<'_, AppState>,
) -> OpStatus {
    window_op(&app, &state, |w| w.nudge(direction))
}

#[tauri::command]
pub fn center_window(app: AppHandle, state: tauri::State<'_, AppState>) -> OpStatus {
    window_op(&app, &state, |w| w.center())
}

#[tauri::command]
pub fn toggle_visibility(app: AppHandle, state: tauri::State<'_, AppState>) -> OpStatus {
    window_op(&app, &state, |w| w.toggle_visibility())
}

#[tauri::command]
pub fn minimize_window(app: AppHandle, state: tauri::State<'_, AppState>) -> OpStatus {
    window_op(&app, &state, |w| w.minimize())
}

#[tauri::command]
pub fn close_window(app: AppHandle, state: tauri::State<'_, AppState>) -> OpStatus {
    window_op(&app, &state, |w| w.close())
}

#[tauri::command]
pub fn apply_layout(layout: String, app: AppHandle, state: tauri::State<'_, AppState>) -> OpStatus {
    let saved = lock(&state.config).set_layout(&layout);
    match saved {
        Ok(config) => window_op(&app, &state, |w| w.apply_layout(config.layout)),
        Err(e) => Err::<(), _>(e).into(),
    }
}
