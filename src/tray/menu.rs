use tauri::menu::{Menu, MenuItem, PredefinedMenuItem};
use tauri::tray::TrayIconBuilder;
use tauri::{AppHandle, Emitter, Manager};

use crate::events;
use crate::state::app_state::{lock, AppState};

/// Build and configure the system tray icon with menu
pub fn setup_tray(app: &AppHandle, tooltip: &str) -> Result<(), Box<dyn std::error::Error>> {
    let toggle_visibility =
        MenuItem::with_id(app, "toggle_visibility", "Show / Hide", true, None::<&str>)?;
    let toggle_click_through =
        MenuItem::with_id(app, "toggle_click_through", "Toggle Click-Through", true, None::<&str>)?;

    let sep = PredefinedMenuItem::separator(app)?;

    let quit = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;

    let menu = Menu::with_items(app, &[&toggle_visibility, &toggle_click_through, &sep, &quit])?;

    let mut tray = TrayIconBuilder::new()
        .menu(&menu)
        .show_menu_on_left_click(true)
        .tooltip(tooltip)
        .on_menu_event(move |app, event| {
            let state: tauri::State<'_, AppState> = app.state();
            let result = match event.id().as_ref() {
                "quit" => {
                    lock(&state.window).release_shortcuts();
                    app.exit(0);
                    return;
                }
                "toggle_visibility" => lock(&state.window).toggle_visibility(),
                "toggle_click_through" => lock(&state.window).toggle_click_through(),
                _ => return,
            };
            match result {
                Ok(_) => {
                    let snapshot = lock(&state.window).state();
                    let _ = app.emit(events::WINDOW_STATE_CHANGED, snapshot);
                }
                Err(e) => log::warn!("Tray action {} failed: {}", event.id().as_ref(), e),
            }
        });

    if let Some(icon) = app.default_window_icon().cloned() {
        tray = tray.icon(icon);
    }
    tray.build(app)?;

    Ok(())
}
