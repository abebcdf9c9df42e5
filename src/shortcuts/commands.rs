use serde_json::{Map, Value};
use tauri::AppHandle;
use tauri_plugin_global_shortcut::{GlobalShortcutExt, Shortcut, ShortcutState};

use crate::error::{Result, StealthError};
use crate::shortcuts::bindings::{ShortcutAction, ShortcutBindings};
use crate::shortcuts::registry::{HotkeyRegistrar, RegistrationReport};
use crate::state::app_state::{lock, AppState};

/// `HotkeyRegistrar` backed by the global-shortcut plugin. Presses are routed
/// through `dispatch`.
pub struct TauriHotkeyRegistrar {
    app: AppHandle,
}

impl TauriHotkeyRegistrar {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

fn parse(combo: &str) -> Result<Shortcut> {
    combo
        .parse()
        .map_err(|e| StealthError::WindowOp(format!("Invalid shortcut '{}': {:?}", combo, e)))
}

impl HotkeyRegistrar for TauriHotkeyRegistrar {
    fn register(&mut self, combo: &str, action: ShortcutAction) -> Result<()> {
        let shortcut = parse(combo)?;
        let manager = self.app.global_shortcut();
        if manager.is_registered(shortcut) {
            return Err(StealthError::WindowOp(format!("'{}' is already registered", combo)));
        }
        manager
            .on_shortcut(shortcut, move |app, _shortcut, event| {
                if event.state == ShortcutState::Pressed {
                    crate::shortcuts::dispatch::dispatch(app, action);
                }
            })
            .map_err(|e| StealthError::WindowOp(format!("Failed to register shortcut: {}", e)))
    }

    fn unregister(&mut self, combo: &str) -> Result<()> {
        let shortcut = parse(combo)?;
        self.app
            .global_shortcut()
            .unregister(shortcut)
            .map_err(|e| StealthError::WindowOp(format!("Failed to unregister shortcut: {}", e)))
    }
}

#[tauri::command]
pub fn get_shortcuts(state: tauri::State<'_, AppState>) -> ShortcutBindings {
    lock(&state.config).current().shortcuts.clone()
}

/// Takes a full or partial action -> combo mapping, persists the completed
/// set and re-registers only what changed.
#[tauri::command]
pub fn register_shortcuts(
    bindings: Map<String, Value>,
    state: tauri::State<'_, AppState>,
) -> Result<RegistrationReport> {
    let bindings = ShortcutBindings::from_json_map(&bindings)?;
    let patch = serde_json::json!({ "shortcuts": serde_json::to_value(&bindings)? });
    lock(&state.config).save(patch)?;
    Ok(lock(&state.window).register_shortcuts(&bindings))
}
