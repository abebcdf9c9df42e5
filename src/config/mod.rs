pub mod model;
pub mod store;

#[cfg(feature = "desktop")]
pub mod commands;
