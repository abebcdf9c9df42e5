use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capture::config::{AudioMode, CaptureInterval, ImageQuality};
use crate::error::{Result, StealthError};
use crate::session::model::{Profile, SpeechLanguage};
use crate::shortcuts::bindings::ShortcutBindings;

/// A config value drawn from a fixed set of names.
pub trait ConfigEnum: Sized {
    const ALLOWED: &'static [&'static str];

    fn from_name(name: &str) -> Option<Self>;

    fn parse(field: &str, name: &str) -> Result<Self> {
        Self::from_name(name).ok_or_else(|| StealthError::config(field, name, Self::ALLOWED))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Minimal,
    Balanced,
    Maximum,
}

impl ConfigEnum for StealthLevel {
    const ALLOWED: &'static [&'static str] = &["minimal", "balanced", "maximum"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "minimal" => Some(StealthLevel::Minimal),
            "balanced" => Some(StealthLevel::Balanced),
            "maximum" => Some(StealthLevel::Maximum),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Compact,
    Normal,
    Expanded,
}

impl Layout {
    /// Logical window size for the layout preset.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            Layout::Compact => (700.0, 300.0),
            Layout::Normal => (900.0, 400.0),
            Layout::Expanded => (1100.0, 600.0),
        }
    }
}

impl ConfigEnum for Layout {
    const ALLOWED: &'static [&'static str] = &["compact", "normal", "expanded"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "compact" => Some(Layout::Compact),
            "normal" => Some(Layout::Normal),
            "expanded" => Some(Layout::Expanded),
            _ => None,
        }
    }
}

pub const TRANSPARENCY_RANGE: RangeInclusive<u8> = 0..=100;
pub const FONT_SIZE_RANGE: RangeInclusive<u8> = 12..=32;

/// The persisted settings record. Serialized flat with camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub profile_type: Profile,
    pub custom_instructions: String,
    pub audio_mode: AudioMode,
    pub stealth_level: StealthLevel,
    pub speech_language: SpeechLanguage,
    pub layout: Layout,
    pub background_transparency: u8,
    pub response_font_size: u8,
    pub capture_interval: CaptureInterval,
    pub image_quality: ImageQuality,
    pub enable_google_search: bool,
    pub enable_advanced_mode: bool,
    pub shortcuts: ShortcutBindings,
    pub onboarded: bool,
    /// Keys this version does not know about, kept so a save does not lose them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile_type: Profile::Interview,
            custom_instructions: String::new(),
            audio_mode: AudioMode::SpeakerOnly,
            stealth_level: StealthLevel::Balanced,
            speech_language: SpeechLanguage::EnUs,
            layout: Layout::Normal,
            background_transparency: 80,
            response_font_size: 28,
            capture_interval: CaptureInterval::default(),
            image_quality: ImageQuality::Medium,
            enable_google_search: true,
            enable_advanced_mode: false,
            shortcuts: ShortcutBindings::default(),
            onboarded: false,
            extra: Map::new(),
        }
    }
}

/// How a field that fails validation is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Validation {
    /// Reject the whole record.
    Strict,
    /// Keep the field's default and carry on.
    Lenient,
}

impl Validation {
    fn settle<T>(self, result: Result<T>, fallback: T) -> Result<T> {
        match (self, result) {
            (_, Ok(value)) => Ok(value),
            (Validation::Strict, Err(e)) => Err(e),
            (Validation::Lenient, Err(e)) => {
                log::warn!("{}; using the default", e);
                Ok(fallback)
            }
        }
    }
}

impl AppConfig {
    /// Builds a config from a loosely typed JSON record, validating every known key.
    pub fn from_value(value: Value) -> Result<Self> {
        Self::build(value, Validation::Strict)
    }

    /// Like [`AppConfig::from_value`], but an invalid field falls back to its
    /// default instead of failing the record. Used when reading a file
    /// written by an older or foreign version.
    pub fn from_value_lenient(value: Value) -> Self {
        match Self::build(value, Validation::Lenient) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}; using default config", e);
                AppConfig::default()
            }
        }
    }

    fn build(value: Value, mode: Validation) -> Result<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            other => return Err(StealthError::config("config", other.to_string(), &["object"])),
        };
        let d = AppConfig::default();
        let m = &mut map;

        let config = AppConfig {
            profile_type: mode.settle(take_enum(m, "profileType", d.profile_type), d.profile_type)?,
            custom_instructions: mode.settle(
                take_string(m, "customInstructions", d.custom_instructions.clone()),
                d.custom_instructions.clone(),
            )?,
            audio_mode: mode.settle(take_enum(m, "audioMode", d.audio_mode), d.audio_mode)?,
            stealth_level: mode.settle(take_enum(m, "stealthLevel", d.stealth_level), d.stealth_level)?,
            speech_language: mode.settle(
                take_enum(m, "speechLanguage", d.speech_language),
                d.speech_language,
            )?,
            layout: mode.settle(take_enum(m, "layout", d.layout), d.layout)?,
            background_transparency: mode.settle(
                take_ranged(m, "backgroundTransparency", TRANSPARENCY_RANGE, d.background_transparency),
                d.background_transparency,
            )?,
            response_font_size: mode.settle(
                take_ranged(m, "responseFontSize", FONT_SIZE_RANGE, d.response_font_size),
                d.response_font_size,
            )?,
            capture_interval: mode.settle(take_interval(m, d.capture_interval), d.capture_interval)?,
            image_quality: mode.settle(take_enum(m, "imageQuality", d.image_quality), d.image_quality)?,
            enable_google_search: mode.settle(
                take_bool(m, "enableGoogleSearch", d.enable_google_search),
                d.enable_google_search,
            )?,
            enable_advanced_mode: mode.settle(
                take_bool(m, "enableAdvancedMode", d.enable_advanced_mode),
                d.enable_advanced_mode,
            )?,
            shortcuts: mode.settle(take_shortcuts(m), d.shortcuts.clone())?,
            onboarded: mode.settle(take_bool(m, "onboarded", d.onboarded), d.onboarded)?,
            extra: std::mem::take(m),
        };

        if !config.extra.is_empty() {
            let keys: Vec<&String> = config.extra.keys().collect();
            log::warn!("Preserving unrecognized config keys: {:?}", keys);
        }

        Ok(config)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Overlays `patch` on this config and validates the merged record.
    pub fn merged(&self, patch: Value) -> Result<Self> {
        let mut base = self.to_value()?;
        match (&mut base, patch) {
            (Value::Object(base_map), Value::Object(patch_map)) => {
                for (key, value) in patch_map {
                    base_map.insert(key, value);
                }
            }
            (_, other) => return Err(StealthError::config("config", other.to_string(), &["object"])),
        }
        AppConfig::from_value(base)
    }
}

fn take_enum<T: ConfigEnum>(map: &mut Map<String, Value>, key: &str, default: T) -> Result<T> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::String(name)) => T::parse(key, &name),
        Some(other) => Err(StealthError::config(key, other.to_string(), T::ALLOWED)),
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str, default: String) -> Result<String> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(StealthError::config(key, other.to_string(), &["<string>"])),
    }
}

fn take_bool(map: &mut Map<String, Value>, key: &str, default: bool) -> Result<bool> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(b),
        Some(other) => Err(StealthError::config(key, other.to_string(), &["true", "false"])),
    }
}

fn as_integer(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn take_ranged(
    map: &mut Map<String, Value>,
    key: &str,
    range: RangeInclusive<u8>,
    default: u8,
) -> Result<u8> {
    let value = match map.remove(key) {
        None | Some(Value::Null) => return Ok(default),
        Some(value) => value,
    };
    let allowed = format!("{}-{}", range.start(), range.end());
    as_integer(&value)
        .and_then(|n| u8::try_from(n).ok())
        .filter(|n| range.contains(n))
        .ok_or_else(|| StealthError::config(key, value.to_string(), &[allowed.as_str()]))
}

fn take_interval(map: &mut Map<String, Value>, default: CaptureInterval) -> Result<CaptureInterval> {
    const KEY: &str = "captureInterval";
    let value = match map.remove(KEY) {
        None | Some(Value::Null) => return Ok(default),
        Some(value) => value,
    };
    as_integer(&value)
        .and_then(|n| u32::try_from(n).ok())
        .and_then(CaptureInterval::new)
        .ok_or_else(|| {
            let allowed: Vec<String> = CaptureInterval::ALLOWED.iter().map(|s| s.to_string()).collect();
            StealthError::Config {
                field: KEY.to_string(),
                value: value.to_string(),
                allowed,
            }
        })
}

fn take_shortcuts(map: &mut Map<String, Value>) -> Result<ShortcutBindings> {
    match map.remove("shortcuts") {
        None | Some(Value::Null) => Ok(ShortcutBindings::default()),
        Some(Value::Object(entries)) => ShortcutBindings::from_json_map(&entries),
        Some(other) => Err(StealthError::config("shortcuts", other.to_string(), &["object"])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_keys_take_defaults() {
        let config = AppConfig::from_value(json!({})).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn rejects_unknown_stealth_level_with_allowed_list() {
        let err = AppConfig::from_value(json!({ "stealthLevel": "extreme" })).unwrap_err();
        match err {
            StealthError::Config { field, value, allowed } => {
                assert_eq!(field, "stealthLevel");
                assert_eq!(value, "extreme");
                assert_eq!(allowed, vec!["minimal", "balanced", "maximum"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        assert!(AppConfig::from_value(json!({ "backgroundTransparency": 101 })).is_err());
        assert!(AppConfig::from_value(json!({ "responseFontSize": 11 })).is_err());
        assert!(AppConfig::from_value(json!({ "captureInterval": 7 })).is_err());
        let config = AppConfig::from_value(json!({ "captureInterval": "15", "responseFontSize": 32.0 })).unwrap();
        assert_eq!(config.capture_interval.seconds(), 15);
        assert_eq!(config.response_font_size, 32);
    }

    #[test]
    fn unknown_keys_survive_a_round_trip() {
        let config = AppConfig::from_value(json!({ "layout": "compact", "legacyTheme": "dark" })).unwrap();
        assert_eq!(config.layout, Layout::Compact);
        let value = config.to_value().unwrap();
        assert_eq!(value["legacyTheme"], "dark");
        assert_eq!(value["layout"], "compact");
        assert_eq!(value["stealthLevel"], "balanced");
    }

    #[test]
    fn lenient_read_only_defaults_the_bad_field() {
        let config = AppConfig::from_value_lenient(json!({
            "onboarded": true,
            "layout": "compact",
            "stealthLevel": "ultra",
            "responseFontSize": 99,
            "selectedTheme": "dark"
        }));
        assert!(config.onboarded);
        assert_eq!(config.layout, Layout::Compact);
        assert_eq!(config.stealth_level, StealthLevel::Balanced);
        assert_eq!(config.response_font_size, 28);
        assert_eq!(config.extra["selectedTheme"], "dark");
        assert_eq!(AppConfig::from_value_lenient(json!([1, 2])), AppConfig::default());
    }

    #[test]
    fn merge_keeps_unpatched_fields() {
        let base = AppConfig::from_value(json!({ "layout": "expanded", "onboarded": true })).unwrap();
        let merged = base.merged(json!({ "stealthLevel": "maximum" })).unwrap();
        assert_eq!(merged.layout, Layout::Expanded);
        assert!(merged.onboarded);
        assert_eq!(merged.stealth_level, StealthLevel::Maximum);
    }

    #[test]
    fn partial_shortcuts_are_completed_with_defaults() {
        let config = AppConfig::from_value(json!({ "shortcuts": { "toggleClickThrough": "Ctrl+K" } })).unwrap();
        let defaults = ShortcutBindings::default();
        assert_eq!(config.shortcuts.len(), defaults.len());
        assert_eq!(
            config.shortcuts.get(crate::shortcuts::bindings::ShortcutAction::ToggleClickThrough),
            "Ctrl+K"
        );
    }
}
