use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::config::model::StealthLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    pub min_jitter: Duration,
    pub max_jitter: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            min_jitter: Duration::from_millis(100),
            max_jitter: Duration::from_millis(600),
        }
    }
}

/// A single environment check run before the window exists.
pub trait EnvironmentProbe: Send + Sync {
    fn name(&self) -> &str;
    fn detect(&self) -> bool;
}

/// Reports a signal when any of the listed environment variables is set.
pub struct EnvVarProbe {
    name: String,
    vars: Vec<String>,
}

impl EnvVarProbe {
    pub fn new(name: impl Into<String>, vars: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            vars: vars.into_iter().map(Into::into).collect(),
        }
    }
}

impl EnvironmentProbe for EnvVarProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self) -> bool {
        self.vars.iter().any(|var| std::env::var_os(var).is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Posture {
    Standard,
    Hardened,
}

impl Posture {
    /// Stealth level to start the window with.
    pub fn effective_level(&self, configured: StealthLevel) -> StealthLevel {
        match self {
            Posture::Standard => configured,
            Posture::Hardened => StealthLevel::Maximum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardReport {
    pub jitter_ms: u64,
    pub signals: Vec<String>,
    pub posture: Posture,
}

/// Startup gate: waits a random jitter, runs the probes and settles a posture.
/// Never fails; runs once per instance.
pub struct AntiAnalysisGuard {
    config: GuardConfig,
    probes: Vec<Box<dyn EnvironmentProbe>>,
    report: OnceCell<GuardReport>,
}

impl AntiAnalysisGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            probes: Vec::new(),
            report: OnceCell::new(),
        }
    }

    pub fn with_probe(mut self, probe: impl EnvironmentProbe + 'static) -> Self {
        self.probes.push(Box::new(probe));
        self
    }

    /// Runs the guard. Later calls return the first report without waiting.
    pub async fn run(&self) -> GuardReport {
        self.report.get_or_init(|| self.execute()).await.clone()
    }

    pub fn report(&self) -> Option<&GuardReport> {
        self.report.get()
    }

    fn pick_jitter(&self) -> Duration {
        let min = self.config.min_jitter.min(self.config.max_jitter);
        let max = self.config.min_jitter.max(self.config.max_jitter);
        if min == max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    async fn execute(&self) -> GuardReport {
        let jitter = self.pick_jitter();
        tokio::time::sleep(jitter).await;

        let signals: Vec<String> = self
            .probes
            .iter()
            .filter(|probe| probe.detect())
            .map(|probe| probe.name().to_string())
            .collect();

        let posture = if signals.is_empty() {
            Posture::Standard
        } else {
            Posture::Hardened
        };
        log::info!(
            "Startup guard finished after {}ms: posture {:?} ({} signal(s))",
            jitter.as_millis(),
            posture,
            signals.len()
        );

        GuardReport {
            jitter_ms: jitter.as_millis() as u64,
            signals,
            posture,
        }
    }
}
