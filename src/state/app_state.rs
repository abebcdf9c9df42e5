use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::store::ConfigStore;
use crate::session::runtime::SessionHandle;
use crate::stealth::guard::GuardReport;
use crate::stealth::identity::ProcessIdentity;
use crate::window::manager::StealthWindowManager;

/// Global application state managed by Tauri
pub struct AppState {
    pub window: Mutex<StealthWindowManager>,
    pub config: Mutex<ConfigStore>,
    pub session: SessionHandle,
    pub identity: ProcessIdentity,
    pub guard: GuardReport,
}

impl AppState {
    pub fn new(
        window: StealthWindowManager,
        config: ConfigStore,
        session: SessionHandle,
        identity: ProcessIdentity,
        guard: GuardReport,
    ) -> Self {
        Self {
            window: Mutex::new(window),
            config: Mutex::new(config),
            session,
            identity,
            guard,
        }
    }
}

/// Locks a state mutex, recovering the data if a previous holder panicked.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
