pub mod bindings;
pub mod registry;
#[cfg(feature = "desktop")]
pub mod commands;
#[cfg(feature = "desktop")]
pub mod dispatch;
