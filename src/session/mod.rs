pub mod controller;
pub mod gemini;
pub mod history;
pub mod model;
pub mod runtime;
pub mod transport;

#[cfg(feature = "desktop")]
pub mod commands;
