use tauri::{AppHandle, LogicalPosition, LogicalSize, Manager, WebviewWindow};

use crate::error::{Result, StealthError};
use crate::window::backend::{WindowBackend, WindowBounds};

/// Label of the overlay webview window.
pub const MAIN_WINDOW: &str = "main";

/// `WindowBackend` over a Tauri webview window, looked up by label on every
/// call so a closed window reports `NoWindow` instead of panicking.
pub struct TauriWindowBackend {
    app: AppHandle,
    label: String,
}

impl TauriWindowBackend {
    pub fn new(app: AppHandle, label: impl Into<String>) -> Self {
        Self {
            app,
            label: label.into(),
        }
    }

    fn window(&self) -> Result<WebviewWindow> {
        self.app
            .get_webview_window(&self.label)
            .ok_or(StealthError::NoWindow)
    }
}

fn op(e: tauri::Error) -> StealthError {
    StealthError::WindowOp(e.to_string())
}

impl WindowBackend for TauriWindowBackend {
    fn set_title(&self, title: &str) -> Result<()> {
        self.window()?.set_title(title).map_err(op)
    }

    fn set_ignore_cursor_events(&self, ignore: bool) -> Result<()> {
        self.window()?.set_ignore_cursor_events(ignore).map_err(op)
    }

    fn set_content_protected(&self, protected: bool) -> Result<()> {
        self.window()?.set_content_protected(protected).map_err(op)
    }

    fn set_always_on_top(&self, on_top: bool) -> Result<()> {
        self.window()?.set_always_on_top(on_top).map_err(op)
    }

    fn set_size(&self, width: f64, height: f64, animated: bool) -> Result<()> {
        if animated {
            log::debug!("Animated resize not supported; resizing immediately");
        }
        self.window()?
            .set_size(LogicalSize::new(width, height))
            .map_err(op)
    }

    fn set_position(&self, x: f64, y: f64) -> Result<()> {
        self.window()?
            .set_position(LogicalPosition::new(x, y))
            .map_err(op)
    }

    fn center(&self) -> Result<()> {
        self.window()?.center().map_err(op)
    }

    fn bounds(&self) -> Result<WindowBounds> {
        let window = self.window()?;
        let scale = window.scale_factor().map_err(op)?;
        let position = window.outer_position().map_err(op)?.to_logical::<f64>(scale);
        let size = window.outer_size().map_err(op)?.to_logical::<f64>(scale);
        Ok(WindowBounds {
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
        })
    }

    fn show(&self) -> Result<()> {
        self.window()?.show().map_err(op)
    }

    fn hide(&self) -> Result<()> {
        self.window()?.hide().map_err(op)
    }

    fn minimize(&self) -> Result<()> {
        self.window()?.minimize().map_err(op)
    }

    fn close(&self) -> Result<()> {
        self.window()?.close().map_err(op)
    }
}
