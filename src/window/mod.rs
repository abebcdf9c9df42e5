pub mod backend;
pub mod manager;
#[cfg(feature = "desktop")]
pub mod tauri_backend;
#[cfg(feature = "desktop")]
pub mod commands;
