use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// (display name, process label) pairs that read as ordinary utilities.
pub const IDENTITY_POOL: &[(&str, &str)] = &[
    ("System Monitor", "systemmonitor"),
    ("Activity Monitor", "activitymonitor"),
    ("Settings Helper", "settingshelper"),
    ("Audio Service", "audioservice"),
    ("Display Calibrator", "displaycalibrator"),
    ("Keyboard Utility", "keyboardutil"),
    ("Network Helper", "networkhelper"),
    ("Font Manager", "fontmanager"),
    ("Update Assistant", "updateassistant"),
    ("Backup Service", "backupservice"),
];

const FALLBACK: (&str, &str) = ("System Monitor", "systemmonitor");

/// Display identity chosen once per process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessIdentity {
    display_name: String,
    process_label: String,
}

impl ProcessIdentity {
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn process_label(&self) -> &str {
        &self.process_label
    }

    /// Pick from `pool`; an empty pool yields the fixed fallback.
    pub fn choose<R: Rng + ?Sized>(pool: &[(&str, &str)], rng: &mut R) -> Self {
        let (display_name, process_label) = pool.choose(rng).copied().unwrap_or(FALLBACK);
        Self {
            display_name: display_name.to_string(),
            process_label: process_label.to_string(),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self::choose(IDENTITY_POOL, &mut StdRng::seed_from_u64(seed))
    }

    pub fn randomize() -> Self {
        let identity = Self::choose(IDENTITY_POOL, &mut rand::thread_rng());
        log::debug!("Process identity selected: {}", identity.process_label);
        identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_identity() {
        assert_eq!(ProcessIdentity::from_seed(7), ProcessIdentity::from_seed(7));
    }

    #[test]
    fn choice_comes_from_the_pool() {
        for seed in 0..50 {
            let identity = ProcessIdentity::from_seed(seed);
            assert!(IDENTITY_POOL
                .iter()
                .any(|(name, label)| *name == identity.display_name() && *label == identity.process_label()));
        }
    }

    #[test]
    fn empty_pool_falls_back() {
        let identity = ProcessIdentity::choose(&[], &mut StdRng::seed_from_u64(1));
        assert_eq!(identity.display_name(), "System Monitor");
        assert_eq!(identity.process_label(), "systemmonitor");
    }
}
