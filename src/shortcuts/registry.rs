use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::shortcuts::bindings::{normalize_combo, ShortcutAction, ShortcutBindings};

/// OS-level global hotkey table.
pub trait HotkeyRegistrar: Send {
    fn register(&mut self, combo: &str, action: ShortcutAction) -> Result<()>;
    fn unregister(&mut self, combo: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedBinding {
    pub action: ShortcutAction,
    pub combo: String,
    pub winner: ShortcutAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedBinding {
    pub action: ShortcutAction,
    pub combo: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReport {
    pub registered: Vec<ShortcutAction>,
    pub unchanged: Vec<ShortcutAction>,
    pub dropped: Vec<DroppedBinding>,
    pub failed: Vec<FailedBinding>,
}

impl RegistrationReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && self.failed.is_empty()
    }
}

/// Tracks which combo is registered for which action and applies binding
/// changes as an unregister/register diff.
#[derive(Debug, Default)]
pub struct ShortcutRegistry {
    // normalized combo -> (action, combo as registered)
    active: BTreeMap<String, (ShortcutAction, String)>,
}

impl ShortcutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Brings the OS hotkey table in line with `bindings`.
    ///
    /// Two actions on one combo: the one registered later (declaration order)
    /// keeps it and the earlier binding is dropped with a warning. A failed
    /// registration is reported and does not stop the remaining ones.
    pub fn apply(
        &mut self,
        bindings: &ShortcutBindings,
        registrar: &mut dyn HotkeyRegistrar,
    ) -> RegistrationReport {
        let mut report = RegistrationReport::default();

        let mut desired: BTreeMap<String, (ShortcutAction, String)> = BTreeMap::new();
        for (action, combo) in bindings.iter() {
            let key = normalize_combo(combo);
            if let Some((earlier, _)) = desired.insert(key, (action, combo.to_string())) {
                log::warn!(
                    "Shortcut {} is bound to both {} and {}; keeping {}",
                    combo,
                    earlier.name(),
                    action.name(),
                    action.name()
                );
                report.dropped.push(DroppedBinding {
                    action: earlier,
                    combo: combo.to_string(),
                    winner: action,
                });
            }
        }

        let stale: Vec<String> = self
            .active
            .iter()
            .filter(|(key, (action, _))| desired.get(*key).map_or(true, |(want, _)| want != action))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            if let Some((action, combo)) = self.active.remove(&key) {
                if let Err(e) = registrar.unregister(&combo) {
                    log::warn!("Failed to unregister {} ({}): {}", combo, action.name(), e);
                }
            }
        }

        let mut pending: Vec<(String, ShortcutAction, String)> = desired
            .into_iter()
            .map(|(key, (action, combo))| (key, action, combo))
            .collect();
        pending.sort_by_key(|(_, action, _)| *action);

        for (key, action, combo) in pending {
            if self.active.contains_key(&key) {
                report.unchanged.push(action);
                continue;
            }
            match registrar.register(&combo, action) {
                Ok(()) => {
                    self.active.insert(key, (action, combo));
                    report.registered.push(action);
                }
                Err(e) => {
                    log::warn!("Failed to register {} for {}: {}", combo, action.name(), e);
                    report.failed.push(FailedBinding {
                        action,
                        combo,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    pub fn action_for(&self, combo: &str) -> Option<ShortcutAction> {
        self.active.get(&normalize_combo(combo)).map(|(action, _)| *action)
    }

    pub fn clear(&mut self, registrar: &mut dyn HotkeyRegistrar) {
        for (_, (action, combo)) in std::mem::take(&mut self.active) {
            if let Err(e) = registrar.unregister(&combo) {
                log::warn!("Failed to unregister {} ({}): {}", combo, action.name(), e);
            }
        }
    }
}
