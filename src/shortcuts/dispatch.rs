use serde_json::json;
use tauri::{AppHandle, Emitter, Manager};

use crate::events;
use crate::shortcuts::bindings::ShortcutAction;
use crate::state::app_state::{lock, AppState};
use crate::stealth::commands::conceal;
use crate::stealth::erase::emergency_erase;
use crate::window::manager::NudgeDirection;

/// Routes a pressed hotkey to its owner.
pub fn dispatch(app: &AppHandle, action: ShortcutAction) {
    let state: tauri::State<'_, AppState> = app.state();
    log::debug!("Shortcut pressed: {}", action.name());

    match action {
        ShortcutAction::MoveUp => nudge(app, &state, NudgeDirection::Up),
        ShortcutAction::MoveDown => nudge(app, &state, NudgeDirection::Down),
        ShortcutAction::MoveLeft => nudge(app, &state, NudgeDirection::Left),
        ShortcutAction::MoveRight => nudge(app, &state, NudgeDirection::Right),
        ShortcutAction::ToggleVisibility => {
            let result = lock(&state.window).toggle_visibility();
            report_window(app, &state, action, result.map(|_| ()));
        }
        ShortcutAction::ToggleClickThrough => {
            let result = lock(&state.window).toggle_click_through();
            report_window(app, &state, action, result.map(|_| ()));
        }
        ShortcutAction::PreviousResponse => navigate(app, &state, -1),
        ShortcutAction::NextResponse => navigate(app, &state, 1),
        ShortcutAction::NextStep | ShortcutAction::ScrollUp | ShortcutAction::ScrollDown => {
            let _ = app.emit(events::SHORTCUT_TRIGGERED, json!({ "action": action.name() }));
        }
        ShortcutAction::EmergencyErase => {
            let session = state.session.clone();
            let app = app.clone();
            tauri::async_runtime::spawn(async move {
                let conceal_app = app.clone();
                emergency_erase(
                    &session,
                    move || conceal(&conceal_app.state::<AppState>()),
                    || app.exit(0),
                )
                .await;
            });
        }
    }
}

fn nudge(app: &AppHandle, state: &AppState, direction: NudgeDirection) {
    let result = lock(&state.window).nudge(direction).map(|_| ());
    let action = match direction {
        NudgeDirection::Up => ShortcutAction::MoveUp,
        NudgeDirection::Down => ShortcutAction::MoveDown,
        NudgeDirection::Left => ShortcutAction::MoveLeft,
        NudgeDirection::Right => ShortcutAction::MoveRight,
    };
    report_window(app, state, action, result);
}

fn report_window(
    app: &AppHandle,
    state: &AppState,
    action: ShortcutAction,
    result: crate::error::Result<()>,
) {
    match result {
        Ok(()) => {
            let snapshot = lock(&state.window).state();
            let _ = app.emit(events::WINDOW_STATE_CHANGED, snapshot);
        }
        Err(e) => log::warn!("Shortcut {} failed: {}", action.name(), e),
    }
}

fn navigate(app: &AppHandle, state: &AppState, direction: i32) {
    let session = state.session.clone();
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        match session.navigate(direction).await {
            Ok(turn) => {
                let _ = app.emit(events::RESPONSE_NAVIGATED, turn);
            }
            Err(e) => log::warn!("Response navigation failed: {}", e),
        }
    });
}
