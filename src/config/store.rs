use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::config::model::{AppConfig, Layout, StealthLevel};
use crate::error::Result;

/// Holds the current settings and the file they persist to.
pub struct ConfigStore {
    path: PathBuf,
    current: AppConfig,
}

impl ConfigStore {
    /// `<config_dir>/cheddar-overlay/config.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("cheddar-overlay")
            .join("config.json")
    }

    /// Reads the config file. A missing or unparsable file yields defaults;
    /// an out-of-range field falls back to its own default and the rest of
    /// the record, unknown keys included, is kept.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => AppConfig::from_value_lenient(value),
                Err(e) => {
                    log::warn!("Ignoring unparsable config at {:?}: {}", path, e);
                    AppConfig::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
            Err(e) => {
                log::warn!("Failed to read config at {:?}: {}", path, e);
                AppConfig::default()
            }
        };
        Self { path, current }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> &AppConfig {
        &self.current
    }

    /// Merges `patch` over the current record, validates, then writes.
    /// Nothing changes in memory or on disk if any step fails.
    pub fn save(&mut self, patch: Value) -> Result<AppConfig> {
        let next = self.current.merged(patch).inspect_err(|e| {
            log::warn!("Rejected config update: {}", e);
        })?;
        write_atomic(&self.path, &serde_json::to_vec_pretty(&next.to_value()?)?)?;
        self.current = next.clone();
        Ok(next)
    }

    pub fn set_stealth_level(&mut self, level: &str) -> Result<AppConfig> {
        self.save(json!({ "stealthLevel": level }))
    }

    pub fn set_layout(&mut self, layout: &str) -> Result<AppConfig> {
        self.save(json!({ "layout": layout }))
    }

    pub fn set_onboarded(&mut self, onboarded: bool) -> Result<AppConfig> {
        self.save(json!({ "onboarded": onboarded }))
    }

    pub fn stealth_level(&self) -> StealthLevel {
        self.current.stealth_level
    }

    pub fn layout(&self) -> Layout {
        self.current.layout
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::load(dir.path().join("cheddar").join("config.json"))
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.current(), &AppConfig::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(ConfigStore::load(&path).current(), &AppConfig::default());

        std::fs::write(&path, r#"{"stealthLevel":"loud"}"#).unwrap();
        assert_eq!(ConfigStore::load(&path).current(), &AppConfig::default());
    }

    #[test]
    fn one_bad_field_does_not_wipe_the_rest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"onboarded":true,"layout":"compact","stealthLevel":"ultra","selectedTheme":"dark"}"#,
        )
        .unwrap();

        let mut store = ConfigStore::load(&path);
        assert!(store.current().onboarded);
        assert_eq!(store.layout(), Layout::Compact);
        assert_eq!(store.stealth_level(), StealthLevel::Balanced);

        store.save(json!({ "responseFontSize": 20 })).unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["selectedTheme"], "dark");
        assert_eq!(raw["onboarded"], true);
        assert_eq!(raw["layout"], "compact");
        assert_eq!(raw["stealthLevel"], "balanced");
        assert_eq!(raw["responseFontSize"], 20);
    }

    #[test]
    fn save_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.save(json!({ "layout": "compact", "responseFontSize": 18 })).unwrap();
        store.set_onboarded(true).unwrap();

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.layout(), Layout::Compact);
        assert_eq!(reloaded.current().response_font_size, 18);
        assert!(reloaded.current().onboarded);
    }

    #[test]
    fn rejected_save_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.set_stealth_level("maximum").unwrap();
        let on_disk = std::fs::read_to_string(store.path()).unwrap();

        let err = store.set_stealth_level("extreme").unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
        assert!(err.to_string().contains("minimal, balanced, maximum"));
        assert_eq!(store.stealth_level(), StealthLevel::Maximum);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), on_disk);
    }

    #[test]
    fn unknown_keys_survive_a_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"selectedTheme":"dark","layout":"expanded"}"#).unwrap();

        let mut store = ConfigStore::load(&path);
        store.set_onboarded(true).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["selectedTheme"], "dark");
        assert_eq!(raw["layout"], "expanded");
    }
}
