#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cheddar_overlay_lib::error::{Result, StealthError};
use cheddar_overlay_lib::session::model::SessionRequest;
use cheddar_overlay_lib::session::transport::{connection_pair, Connection, ConnectionEnd, Transport};
use cheddar_overlay_lib::shortcuts::bindings::{normalize_combo, ShortcutAction};
use cheddar_overlay_lib::shortcuts::registry::HotkeyRegistrar;
use cheddar_overlay_lib::window::backend::{WindowBackend, WindowBounds};

/// Hands each connection's backend half to the test.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    ends: Arc<Mutex<Vec<ConnectionEnd>>>,
}

impl LoopbackTransport {
    pub fn take_end(&self) -> ConnectionEnd {
        self.ends.lock().unwrap().remove(0)
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self, request: &SessionRequest) -> Result<Connection> {
        if request.api_key != "valid-key" {
            return Err(StealthError::Auth("API key not valid".into()));
        }
        let (connection, end) = connection_pair();
        self.ends.lock().unwrap().push(end);
        Ok(connection)
    }
}

#[derive(Debug, Default)]
pub struct FakeWindow {
    pub ignore_cursor: bool,
    pub content_protected: bool,
    pub on_top: bool,
    pub visible: bool,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub window: Arc<Mutex<FakeWindow>>,
}

impl WindowBackend for FakeBackend {
    fn set_title(&self, _title: &str) -> Result<()> {
        Ok(())
    }

    fn set_ignore_cursor_events(&self, ignore: bool) -> Result<()> {
        self.window.lock().unwrap().ignore_cursor = ignore;
        Ok(())
    }

    fn set_content_protected(&self, protected: bool) -> Result<()> {
        self.window.lock().unwrap().content_protected = protected;
        Ok(())
    }

    fn set_always_on_top(&self, on_top: bool) -> Result<()> {
        self.window.lock().unwrap().on_top = on_top;
        Ok(())
    }

    fn set_size(&self, _width: f64, _height: f64, _animated: bool) -> Result<()> {
        Ok(())
    }

    fn set_position(&self, _x: f64, _y: f64) -> Result<()> {
        Ok(())
    }

    fn center(&self) -> Result<()> {
        Ok(())
    }

    fn bounds(&self) -> Result<WindowBounds> {
        Ok(WindowBounds {
            x: 0.0,
            y: 0.0,
            width: 900.0,
            height: 400.0,
        })
    }

    fn show(&self) -> Result<()> {
        self.window.lock().unwrap().visible = true;
        Ok(())
    }

    fn hide(&self) -> Result<()> {
        self.window.lock().unwrap().visible = false;
        Ok(())
    }

    fn minimize(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// OS hotkey table: one action per combo, registering a taken combo fails.
#[derive(Clone, Default)]
pub struct FakeRegistrar {
    pub table: Arc<Mutex<BTreeMap<String, ShortcutAction>>>,
}

impl FakeRegistrar {
    pub fn responder(&self, combo: &str) -> Option<ShortcutAction> {
        self.table.lock().unwrap().get(&normalize_combo(combo)).copied()
    }
}

impl HotkeyRegistrar for FakeRegistrar {
    fn register(&mut self, combo: &str, action: ShortcutAction) -> Result<()> {
        let mut table = self.table.lock().unwrap();
        let key = normalize_combo(combo);
        if table.contains_key(&key) {
            return Err(StealthError::WindowOp(format!("{combo} already registered")));
        }
        table.insert(key, action);
        Ok(())
    }

    fn unregister(&mut self, combo: &str) -> Result<()> {
        self.table.lock().unwrap().remove(&normalize_combo(combo));
        Ok(())
    }
}
