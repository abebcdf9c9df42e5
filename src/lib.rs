pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod shortcuts;
pub mod stealth;
pub mod window;

#[cfg(feature = "desktop")]
pub mod state;
#[cfg(feature = "desktop")]
pub mod tray;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::Arc;

    use tauri::{Emitter, Manager, WebviewUrl, WebviewWindowBuilder};
    use tokio::sync::broadcast::error::RecvError;

    use crate::config::store::ConfigStore;
    use crate::session::gemini::GeminiTransport;
    use crate::session::history::ConversationHistoryStore;
    use crate::session::runtime::{SessionEvent, SessionHandle};
    use crate::shortcuts::commands::TauriHotkeyRegistrar;
    use crate::state::app_state::AppState;
    use crate::stealth::guard::{AntiAnalysisGuard, EnvVarProbe, GuardConfig};
    use crate::stealth::identity::ProcessIdentity;
    use crate::window::manager::StealthWindowManager;
    use crate::window::tauri_backend::{TauriWindowBackend, MAIN_WINDOW};
    use crate::{config, events, session, shortcuts, stealth, tray, window};

    pub fn run() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        let guard = AntiAnalysisGuard::new(GuardConfig::default())
            .with_probe(EnvVarProbe::new("forced-hardening", ["CHEDDAR_HARDENED"]));
        let report = tauri::async_runtime::block_on(guard.run());
        let identity = ProcessIdentity::randomize();
        let title = identity.display_name().to_string();
        let config = ConfigStore::load(ConfigStore::default_path());
        let level = report.posture.effective_level(config.stealth_level());

        let history = ConversationHistoryStore::open(ConversationHistoryStore::default_dir())
            .unwrap_or_else(|e| {
                log::warn!("History storage unavailable, keeping it in memory: {}", e);
                ConversationHistoryStore::in_memory()
            });

        tauri::Builder::default()
            .plugin(tauri_plugin_global_shortcut::Builder::new().build())
            .setup(move |app| {
                // Hide from dock, the overlay lives in the tray
                #[cfg(target_os = "macos")]
                app.set_activation_policy(tauri::ActivationPolicy::Accessory);

                let (width, height) = config.layout().dimensions();
                WebviewWindowBuilder::new(app, MAIN_WINDOW, WebviewUrl::App("index.html".into()))
                    .title(&title)
                    .inner_size(width, height)
                    .transparent(true)
                    .decorations(false)
                    .skip_taskbar(true)
                    .resizable(false)
                    .build()?;

                let handle = app.handle().clone();
                let mut manager = StealthWindowManager::new(
                    Box::new(TauriWindowBackend::new(handle.clone(), MAIN_WINDOW)),
                    Box::new(TauriHotkeyRegistrar::new(handle.clone())),
                    level,
                );
                if let Err(e) = manager.initialize(&title) {
                    log::warn!("Overlay started without full stealth defaults: {}", e);
                }
                let registration = manager.register_shortcuts(&config.current().shortcuts);
                if !registration.is_clean() {
                    log::warn!(
                        "Shortcuts: {} dropped by conflicts, {} failed to register",
                        registration.dropped.len(),
                        registration.failed.len()
                    );
                }

                let session = tauri::async_runtime::block_on(async {
                    SessionHandle::spawn(Arc::new(GeminiTransport::default()), history)
                });
                forward_session_events(handle.clone(), &session);

                app.manage(AppState::new(manager, config, session, identity, report));

                tray::menu::setup_tray(&handle, &title)?;
                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                session::commands::initialize_session,
                session::commands::send_text,
                session::commands::send_audio,
                session::commands::send_audio_samples,
                session::commands::send_image,
                session::commands::send_frame,
                session::commands::get_capture_plan,
                session::commands::get_history,
                session::commands::list_sessions,
                session::commands::get_session_snapshot,
                session::commands::navigate_response,
                session::commands::toggle_saved,
                session::commands::end_session,
                window::commands::get_window_state,
                window::commands::set_click_through,
                window::commands::toggle_click_through,
                window::commands::set_content_protection,
                window::commands::toggle_always_on_top,
                window::commands::resize_window,
                window::commands::move_window,
                window::commands::nudge_window,
                window::commands::center_window,
                window::commands::toggle_visibility,
                window::commands::minimize_window,
                window::commands::close_window,
                window::commands::apply_layout,
                shortcuts::commands::get_shortcuts,
                shortcuts::commands::register_shortcuts,
                config::commands::get_config,
                config::commands::save_config,
                stealth::commands::get_process_identity,
                stealth::commands::get_guard_report,
                stealth::commands::emergency_erase,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }

    fn forward_session_events(app: tauri::AppHandle, session: &SessionHandle) {
        let mut receiver = session.subscribe_events();
        tauri::async_runtime::spawn(async move {
            loop {
                let event = match receiver.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("UI lagged behind {} session events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let name = match &event {
                    SessionEvent::SessionStarted { .. } => events::SESSION_STARTED,
                    SessionEvent::StreamingDelta { .. } => events::STREAMING_DELTA,
                    SessionEvent::StreamingError { .. } => events::STREAMING_ERROR,
                    SessionEvent::SessionEnded { .. } => events::SESSION_ENDED,
                    SessionEvent::SessionErased => events::SESSION_ERASED,
                };
                let _ = app.emit(name, &event);
            }
        });
    }
}
