use serde::{Deserialize, Serialize};

use crate::config::model::{Layout, StealthLevel};
use crate::error::{Result, StealthError};
use crate::shortcuts::bindings::ShortcutBindings;
use crate::shortcuts::registry::{HotkeyRegistrar, RegistrationReport, ShortcutRegistry};
use crate::window::backend::{WindowBackend, WindowBounds};

/// Pixels moved per move-hotkey press.
pub const NUDGE_STEP: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowMode {
    Normal,
    ClickThrough,
    Minimized,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NudgeDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Window flags a stealth level starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealthDefaults {
    pub click_through: bool,
    pub always_on_top: bool,
    pub content_protection: bool,
}

impl StealthDefaults {
    pub fn for_level(level: StealthLevel) -> Self {
        match level {
            StealthLevel::Minimal => StealthDefaults {
                click_through: false,
                always_on_top: false,
                content_protection: false,
            },
            StealthLevel::Balanced => StealthDefaults {
                click_through: false,
                always_on_top: true,
                content_protection: true,
            },
            StealthLevel::Maximum => StealthDefaults {
                click_through: true,
                always_on_top: true,
                content_protection: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthApplication {
    Applied,
    /// Stored for the next launch because a session is active.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowState {
    pub mode: WindowMode,
    pub bounds: Option<WindowBounds>,
    pub click_through_enabled: bool,
    pub always_on_top: bool,
    pub content_protection_enabled: bool,
    pub visible: bool,
    pub stealth_level: StealthLevel,
    pub pending_stealth_level: Option<StealthLevel>,
}

/// Sole owner of the overlay window's OS state and of the global hotkey table.
pub struct StealthWindowManager {
    backend: Box<dyn WindowBackend>,
    registrar: Box<dyn HotkeyRegistrar>,
    shortcuts: ShortcutRegistry,
    bounds: Option<WindowBounds>,
    click_through: bool,
    always_on_top: bool,
    content_protection: bool,
    visible: bool,
    minimized: bool,
    closed: bool,
    stealth_level: StealthLevel,
    pending_level: Option<StealthLevel>,
}

impl StealthWindowManager {
    pub fn new(
        backend: Box<dyn WindowBackend>,
        registrar: Box<dyn HotkeyRegistrar>,
        stealth_level: StealthLevel,
    ) -> Self {
        Self {
            backend,
            registrar,
            shortcuts: ShortcutRegistry::new(),
            bounds: None,
            click_through: false,
            always_on_top: false,
            content_protection: false,
            visible: true,
            minimized: false,
            closed: false,
            stealth_level,
            pending_level: None,
        }
    }

    /// Titles the freshly created window and applies the stealth level defaults.
    pub fn initialize(&mut self, title: &str) -> Result<()> {
        self.backend.set_title(title)?;
        let level = self.stealth_level;
        self.apply_defaults(StealthDefaults::for_level(level))?;
        self.bounds = self.backend.bounds().ok();
        log::info!("Overlay window initialized with {:?} stealth", level);
        Ok(())
    }

    pub fn state(&self) -> WindowState {
        WindowState {
            mode: self.mode(),
            bounds: self.bounds,
            click_through_enabled: self.click_through,
            always_on_top: self.always_on_top,
            content_protection_enabled: self.content_protection,
            visible: self.visible,
            stealth_level: self.stealth_level,
            pending_stealth_level: self.pending_level,
        }
    }

    pub fn mode(&self) -> WindowMode {
        if self.closed {
            WindowMode::Closed
        } else if self.minimized {
            WindowMode::Minimized
        } else if self.click_through {
            WindowMode::ClickThrough
        } else {
            WindowMode::Normal
        }
    }

    /// Changes the stealth level. While a session is active the change is only
    /// recorded; it takes effect when the window is next created.
    pub fn apply_stealth_level(
        &mut self,
        level: StealthLevel,
        session_active: bool,
    ) -> Result<StealthApplication> {
        if session_active {
            log::info!("Stealth level {:?} deferred until restart (session active)", level);
            self.pending_level = Some(level);
            return Ok(StealthApplication::Deferred);
        }
        self.apply_defaults(StealthDefaults::for_level(level))?;
        self.stealth_level = level;
        self.pending_level = None;
        Ok(StealthApplication::Applied)
    }

    // All three flags land or none do.
    fn apply_defaults(&mut self, defaults: StealthDefaults) -> Result<()> {
        let prior_click_through = self.click_through;
        let prior_on_top = self.always_on_top;

        self.set_click_through(defaults.click_through)?;

        if let Err(e) = self.set_always_on_top(defaults.always_on_top) {
            self.rollback_click_through(prior_click_through);
            return Err(e);
        }

        if let Err(e) = self.set_content_protection(defaults.content_protection) {
            if let Err(rollback) = self.set_always_on_top(prior_on_top) {
                log::error!("Failed to restore always-on-top after error: {}", rollback);
            }
            self.rollback_click_through(prior_click_through);
            return Err(e);
        }

        Ok(())
    }

    fn rollback_click_through(&mut self, prior: bool) {
        if let Err(e) = self.set_click_through(prior) {
            log::error!("Failed to restore click-through after error: {}", e);
        }
    }

    pub fn set_click_through(&mut self, enabled: bool) -> Result<()> {
        self.backend
            .set_ignore_cursor_events(enabled)
            .inspect_err(|e| log::warn!("set_click_through({}) failed: {}", enabled, e))?;
        self.click_through = enabled;
        Ok(())
    }

    pub fn toggle_click_through(&mut self) -> Result<bool> {
        let next = !self.click_through;
        self.set_click_through(next)?;
        Ok(next)
    }

    pub fn set_content_protection(&mut self, enabled: bool) -> Result<()> {
        self.backend
            .set_content_protected(enabled)
            .inspect_err(|e| log::warn!("set_content_protection({}) failed: {}", enabled, e))?;
        self.content_protection = enabled;
        Ok(())
    }

    fn set_always_on_top(&mut self, on_top: bool) -> Result<()> {
        self.backend
            .set_always_on_top(on_top)
            .inspect_err(|e| log::warn!("set_always_on_top({}) failed: {}", on_top, e))?;
        self.always_on_top = on_top;
        Ok(())
    }

    pub fn toggle_always_on_top(&mut self) -> Result<bool> {
        let next = !self.always_on_top;
        self.set_always_on_top(next)?;
        Ok(next)
    }

    pub fn resize(&mut self, width: f64, height: f64, animated: bool) -> Result<()> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(StealthError::WindowOp(format!("invalid size {width}x{height}")));
        }
        self.backend.set_size(width, height, animated)?;
        self.refresh_bounds();
        Ok(())
    }

    pub fn apply_layout(&mut self, layout: Layout) -> Result<()> {
        let (width, height) = layout.dimensions();
        self.resize(width, height, true)
    }

    pub fn move_to(&mut self, x: f64, y: f64) -> Result<()> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(StealthError::WindowOp(format!("invalid position {x},{y}")));
        }
        self.backend.set_position(x, y)?;
        self.refresh_bounds();
        Ok(())
    }

    pub fn nudge(&mut self, direction: NudgeDirection) -> Result<WindowBounds> {
        let current = self.backend.bounds()?;
        let (dx, dy) = match direction {
            NudgeDirection::Up => (0.0, -NUDGE_STEP),
            NudgeDirection::Down => (0.0, NUDGE_STEP),
            NudgeDirection::Left => (-NUDGE_STEP, 0.0),
            NudgeDirection::Right => (NUDGE_STEP, 0.0),
        };
        self.move_to(current.x + dx, current.y + dy)?;
        Ok(self.bounds.unwrap_or(current))
    }

    pub fn center(&mut self) -> Result<()> {
        self.backend.center()?;
        self.refresh_bounds();
        Ok(())
    }

    pub fn toggle_visibility(&mut self) -> Result<bool> {
        if self.visible && !self.minimized {
            self.backend.hide()?;
            self.visible = false;
        } else {
            self.backend.show()?;
            self.visible = true;
            self.minimized = false;
        }
        Ok(self.visible)
    }

    pub fn hide(&mut self) -> Result<()> {
        self.backend.hide()?;
        self.visible = false;
        Ok(())
    }

    pub fn minimize(&mut self) -> Result<()> {
        self.backend.minimize()?;
        self.minimized = true;
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.backend.close()?;
        self.closed = true;
        self.visible = false;
        Ok(())
    }

    /// Applies a full binding set as a diff against what is registered.
    pub fn register_shortcuts(&mut self, bindings: &ShortcutBindings) -> RegistrationReport {
        self.shortcuts.apply(bindings, self.registrar.as_mut())
    }

    pub fn shortcut_registry(&self) -> &ShortcutRegistry {
        &self.shortcuts
    }

    pub fn release_shortcuts(&mut self) {
        self.shortcuts.clear(self.registrar.as_mut());
    }

    fn refresh_bounds(&mut self) {
        match self.backend.bounds() {
            Ok(bounds) => self.bounds = Some(bounds),
            Err(e) => log::debug!("Could not read window bounds: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcuts::bindings::ShortcutAction;
    use crate::shortcuts::registry::testing::RecordingRegistrar;
    use crate::window::backend::testing::RecordingBackend;

    fn manager(level: StealthLevel) -> (StealthWindowManager, RecordingBackend, RecordingRegistrar) {
        let backend = RecordingBackend::default();
        let registrar = RecordingRegistrar::default();
        let manager = StealthWindowManager::new(Box::new(backend.clone()), Box::new(registrar.clone()), level);
        (manager, backend, registrar)
    }

    #[test]
    fn stealth_levels_map_to_fixed_defaults() {
        for level in [StealthLevel::Minimal, StealthLevel::Balanced, StealthLevel::Maximum] {
            let (mut manager, backend, _) = manager(level);
            manager.initialize("System Monitor").unwrap();
            let expected = StealthDefaults::for_level(level);
            let state = manager.state();
            assert_eq!(state.click_through_enabled, expected.click_through);
            assert_eq!(state.always_on_top, expected.always_on_top);
            assert_eq!(state.content_protection_enabled, expected.content_protection);
            let os = backend.state.lock().unwrap();
            assert_eq!(os.ignore_cursor, expected.click_through);
            assert_eq!(os.content_protected, expected.content_protection);
            assert_eq!(os.title, "System Monitor");
        }
    }

    #[test]
    fn click_through_round_trip_restores_input() {
        let (mut manager, backend, _) = manager(StealthLevel::Minimal);
        manager.initialize("t").unwrap();
        let original = backend.state.lock().unwrap().ignore_cursor;

        manager.set_click_through(true).unwrap();
        assert_eq!(manager.mode(), WindowMode::ClickThrough);
        manager.set_click_through(false).unwrap();

        assert_eq!(backend.state.lock().unwrap().ignore_cursor, original);
        assert_eq!(manager.mode(), WindowMode::Normal);
    }

    #[test]
    fn failed_os_call_keeps_prior_state() {
        let (mut manager, backend, _) = manager(StealthLevel::Minimal);
        manager.initialize("t").unwrap();
        backend.fail("set_ignore_cursor_events");

        let err = manager.toggle_click_through().unwrap_err();
        assert_eq!(err.kind(), "WindowOpError");
        assert!(!manager.state().click_through_enabled);

        backend.fail("set_content_protected");
        assert!(manager.set_content_protection(true).is_err());
        assert!(!manager.state().content_protection_enabled);
    }

    #[test]
    fn stealth_level_change_rolls_back_on_partial_failure() {
        let (mut manager, backend, _) = manager(StealthLevel::Minimal);
        manager.initialize("t").unwrap();
        backend.fail("set_content_protected");

        assert!(manager.apply_stealth_level(StealthLevel::Maximum, false).is_err());

        let state = manager.state();
        assert_eq!(state.stealth_level, StealthLevel::Minimal);
        assert!(!state.click_through_enabled);
        assert!(!state.always_on_top);
        let os = backend.state.lock().unwrap();
        assert!(!os.ignore_cursor);
        assert!(!os.on_top);
    }

    #[test]
    fn stealth_level_applies_once_the_platform_recovers() {
        let (mut manager, backend, _) = manager(StealthLevel::Minimal);
        manager.initialize("t").unwrap();
        backend.fail("set_content_protected");
        assert!(manager.apply_stealth_level(StealthLevel::Maximum, false).is_err());

        backend.heal("set_content_protected");
        manager.apply_stealth_level(StealthLevel::Maximum, false).unwrap();

        let state = manager.state();
        assert_eq!(state.stealth_level, StealthLevel::Maximum);
        assert!(state.click_through_enabled);
        assert!(state.content_protection_enabled);
        assert!(backend.state.lock().unwrap().content_protected);
    }

    #[test]
    fn stealth_level_is_deferred_while_session_active() {
        let (mut manager, _, _) = manager(StealthLevel::Balanced);
        manager.initialize("t").unwrap();
        let applied = manager.apply_stealth_level(StealthLevel::Maximum, true).unwrap();
        assert_eq!(applied, StealthApplication::Deferred);
        let state = manager.state();
        assert_eq!(state.stealth_level, StealthLevel::Balanced);
        assert_eq!(state.pending_stealth_level, Some(StealthLevel::Maximum));
        assert!(!state.click_through_enabled);
    }

    #[test]
    fn missing_window_reports_failure() {
        let (mut manager, backend, _) = manager(StealthLevel::Minimal);
        backend.detach();
        assert!(matches!(manager.center(), Err(StealthError::NoWindow)));
        assert!(matches!(manager.resize(10.0, 10.0, false), Err(StealthError::NoWindow)));
        assert!(manager.minimize().is_err());
        assert_eq!(manager.mode(), WindowMode::Normal);
    }

    #[test]
    fn nudge_moves_by_fixed_step() {
        let (mut manager, _, _) = manager(StealthLevel::Minimal);
        let bounds = manager.nudge(NudgeDirection::Left).unwrap();
        assert_eq!(bounds.x, 100.0 - NUDGE_STEP);
        let bounds = manager.nudge(NudgeDirection::Down).unwrap();
        assert_eq!(bounds.y, 100.0 + NUDGE_STEP);
    }

    #[test]
    fn resize_rejects_nonsense_and_layout_applies_preset() {
        let (mut manager, backend, _) = manager(StealthLevel::Minimal);
        assert!(manager.resize(-1.0, 20.0, false).is_err());
        manager.apply_layout(Layout::Compact).unwrap();
        let os = backend.state.lock().unwrap();
        assert_eq!((os.bounds.width, os.bounds.height), Layout::Compact.dimensions());
    }

    #[test]
    fn visibility_minimize_and_close_drive_mode() {
        let (mut manager, _, _) = manager(StealthLevel::Minimal);
        assert!(!manager.toggle_visibility().unwrap());
        assert!(manager.toggle_visibility().unwrap());
        manager.minimize().unwrap();
        assert_eq!(manager.mode(), WindowMode::Minimized);
        manager.close().unwrap();
        assert_eq!(manager.mode(), WindowMode::Closed);
        assert!(manager.center().is_err());
    }

    #[test]
    fn shortcut_conflict_keeps_later_action() {
        let (mut manager, _, registrar) = manager(StealthLevel::Minimal);
        // NextStep is declared after ToggleClickThrough, so it registers later.
        let bindings = ShortcutBindings::with_overrides([(ShortcutAction::NextStep, "Ctrl+M")]).unwrap();
        let report = manager.register_shortcuts(&bindings);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].action, ShortcutAction::ToggleClickThrough);
        assert_eq!(registrar.responder("Ctrl+M"), Some(ShortcutAction::NextStep));
        assert_eq!(
            manager.shortcut_registry().action_for("Ctrl+Shift+E"),
            Some(ShortcutAction::EmergencyErase)
        );
    }
}
