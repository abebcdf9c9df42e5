pub mod erase;
pub mod guard;
pub mod identity;

#[cfg(feature = "desktop")]
pub mod commands;
