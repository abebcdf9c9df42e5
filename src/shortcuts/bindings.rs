use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StealthError};

/// Logical actions reachable through global hotkeys. Declaration order is the
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShortcutAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    ToggleVisibility,
    ToggleClickThrough,
    NextStep,
    PreviousResponse,
    NextResponse,
    ScrollUp,
    ScrollDown,
    EmergencyErase,
}

impl ShortcutAction {
    pub const ALL: [ShortcutAction; 12] = [
        ShortcutAction::MoveUp,
        ShortcutAction::MoveDown,
        ShortcutAction::MoveLeft,
        ShortcutAction::MoveRight,
        ShortcutAction::ToggleVisibility,
        ShortcutAction::ToggleClickThrough,
        ShortcutAction::NextStep,
        ShortcutAction::PreviousResponse,
        ShortcutAction::NextResponse,
        ShortcutAction::ScrollUp,
        ShortcutAction::ScrollDown,
        ShortcutAction::EmergencyErase,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ShortcutAction::MoveUp => "moveUp",
            ShortcutAction::MoveDown => "moveDown",
            ShortcutAction::MoveLeft => "moveLeft",
            ShortcutAction::MoveRight => "moveRight",
            ShortcutAction::ToggleVisibility => "toggleVisibility",
            ShortcutAction::ToggleClickThrough => "toggleClickThrough",
            ShortcutAction::NextStep => "nextStep",
            ShortcutAction::PreviousResponse => "previousResponse",
            ShortcutAction::NextResponse => "nextResponse",
            ShortcutAction::ScrollUp => "scrollUp",
            ShortcutAction::ScrollDown => "scrollDown",
            ShortcutAction::EmergencyErase => "emergencyErase",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    pub fn default_combo(&self) -> &'static str {
        match self {
            ShortcutAction::MoveUp => "Ctrl+Up",
            ShortcutAction::MoveDown => "Ctrl+Down",
            ShortcutAction::MoveLeft => "Ctrl+Left",
            ShortcutAction::MoveRight => "Ctrl+Right",
            ShortcutAction::ToggleVisibility => "Ctrl+\\",
            ShortcutAction::ToggleClickThrough => "Ctrl+M",
            ShortcutAction::NextStep => "Ctrl+Enter",
            ShortcutAction::PreviousResponse => "Ctrl+[",
            ShortcutAction::NextResponse => "Ctrl+]",
            ShortcutAction::ScrollUp => "Ctrl+Shift+Up",
            ShortcutAction::ScrollDown => "Ctrl+Shift+Down",
            ShortcutAction::EmergencyErase => "Ctrl+Shift+E",
        }
    }
}

const MODIFIER_ORDER: [&str; 4] = ["ctrl", "alt", "shift", "super"];

/// Canonical comparison form of a key combo: lowercase, modifier aliases
/// folded, modifiers in fixed order, key last.
pub fn normalize_combo(combo: &str) -> String {
    let mut modifiers: Vec<&'static str> = Vec::new();
    let mut keys: Vec<String> = Vec::new();

    for part in combo.split('+') {
        let token = part.trim().to_lowercase();
        let modifier = match token.as_str() {
            "ctrl" | "control" | "commandorcontrol" | "cmdorctrl" => Some("ctrl"),
            "alt" | "option" => Some("alt"),
            "shift" => Some("shift"),
            "super" | "cmd" | "command" | "meta" => Some("super"),
            _ => None,
        };
        match modifier {
            Some(m) if !modifiers.contains(&m) => modifiers.push(m),
            Some(_) => {}
            None if token.is_empty() => {}
            None => keys.push(token),
        }
    }

    // A trailing "+" means the plus key itself.
    if combo.trim_end().ends_with('+') && combo.trim().len() > 1 {
        keys.push("+".to_string());
    }

    modifiers.sort_by_key(|m| MODIFIER_ORDER.iter().position(|o| o == m));
    let mut parts: Vec<String> = modifiers.into_iter().map(str::to_string).collect();
    parts.extend(keys);
    parts.join("+")
}

/// A total action -> combo mapping: every action always has a combo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ShortcutBindings {
    combos: BTreeMap<ShortcutAction, String>,
}

impl Default for ShortcutBindings {
    fn default() -> Self {
        Self {
            combos: ShortcutAction::ALL
                .into_iter()
                .map(|a| (a, a.default_combo().to_string()))
                .collect(),
        }
    }
}

impl ShortcutBindings {
    /// Starts from the defaults and applies `overrides`.
    pub fn with_overrides<I, S>(overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ShortcutAction, S)>,
        S: Into<String>,
    {
        let mut bindings = Self::default();
        for (action, combo) in overrides {
            bindings.set(action, combo)?;
        }
        Ok(bindings)
    }

    pub fn from_json_map(entries: &Map<String, Value>) -> Result<Self> {
        let action_names: Vec<&str> = ShortcutAction::ALL.iter().map(|a| a.name()).collect();
        let mut bindings = Self::default();
        for (name, value) in entries {
            let action = ShortcutAction::from_name(name)
                .ok_or_else(|| StealthError::config("shortcuts", name.clone(), &action_names))?;
            let combo = value
                .as_str()
                .ok_or_else(|| StealthError::config(name, value.to_string(), &["<key combo>"]))?;
            bindings.set(action, combo)?;
        }
        Ok(bindings)
    }

    pub fn set(&mut self, action: ShortcutAction, combo: impl Into<String>) -> Result<()> {
        let combo = combo.into();
        if normalize_combo(&combo).is_empty() {
            return Err(StealthError::config(action.name(), combo, &["<key combo>"]));
        }
        self.combos.insert(action, combo.trim().to_string());
        Ok(())
    }

    pub fn get(&self, action: ShortcutAction) -> &str {
        self.combos
            .get(&action)
            .map(String::as_str)
            .unwrap_or_else(|| action.default_combo())
    }

    /// Bindings in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ShortcutAction, &str)> {
        self.combos.iter().map(|(a, c)| (*a, c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }
}

impl<'de> Deserialize<'de> for ShortcutBindings {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = Map::<String, Value>::deserialize(deserializer)?;
        ShortcutBindings::from_json_map(&entries).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_action() {
        let bindings = ShortcutBindings::default();
        assert_eq!(bindings.len(), 12);
        assert_eq!(bindings.get(ShortcutAction::EmergencyErase), "Ctrl+Shift+E");
        let order: Vec<ShortcutAction> = bindings.iter().map(|(a, _)| a).collect();
        assert_eq!(order, ShortcutAction::ALL.to_vec());
    }

    #[test]
    fn normalization_ignores_case_and_modifier_order() {
        assert_eq!(normalize_combo("Shift+Ctrl+E"), "ctrl+shift+e");
        assert_eq!(normalize_combo("control + m"), normalize_combo("Ctrl+M"));
        assert_eq!(normalize_combo("CmdOrCtrl+]"), "ctrl+]");
        assert_eq!(normalize_combo("Ctrl++"), "ctrl++");
    }

    #[test]
    fn rejects_empty_combo_and_unknown_action() {
        let mut bindings = ShortcutBindings::default();
        assert!(bindings.set(ShortcutAction::MoveUp, "  ").is_err());
        assert_eq!(bindings.get(ShortcutAction::MoveUp), "Ctrl+Up");

        let mut entries = Map::new();
        entries.insert("teleport".into(), Value::String("Ctrl+T".into()));
        let err = ShortcutBindings::from_json_map(&entries).unwrap_err();
        assert!(err.to_string().contains("emergencyErase"));
    }

    #[test]
    fn serializes_as_flat_map() {
        let value = serde_json::to_value(ShortcutBindings::default()).unwrap();
        assert_eq!(value["toggleClickThrough"], "Ctrl+M");
        let back: ShortcutBindings = serde_json::from_value(value).unwrap();
        assert_eq!(back, ShortcutBindings::default());
    }
}
