use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Platform window capability. Every call targets the overlay window and
/// returns `StealthError::NoWindow` when no handle can be resolved.
pub trait WindowBackend: Send {
    fn set_title(&self, title: &str) -> Result<()>;
    fn set_ignore_cursor_events(&self, ignore: bool) -> Result<()>;
    fn set_content_protected(&self, protected: bool) -> Result<()>;
    fn set_always_on_top(&self, on_top: bool) -> Result<()>;
    fn set_size(&self, width: f64, height: f64, animated: bool) -> Result<()>;
    fn set_position(&self, x: f64, y: f64) -> Result<()>;
    fn center(&self) -> Result<()>;
    fn bounds(&self) -> Result<WindowBounds>;
    fn show(&self) -> Result<()>;
    fn hide(&self) -> Result<()>;
    fn minimize(&self) -> Result<()>;
    fn close(&self) -> Result<()>;
}
