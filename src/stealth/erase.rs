use std::time::Duration;

use crate::session::runtime::SessionHandle;

/// Upper bound on how long erase waits for the session task before exiting anyway.
pub const ERASE_DEADLINE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseOutcome {
    Wiped,
    Failed,
    TimedOut,
}

/// Hides the overlay, wipes every session and the saved set, then calls `exit`.
/// `exit` always runs, even when the wipe fails or overruns the deadline.
pub async fn emergency_erase(
    session: &SessionHandle,
    conceal: impl FnOnce(),
    exit: impl FnOnce(),
) -> EraseOutcome {
    conceal();
    let outcome = match tokio::time::timeout(ERASE_DEADLINE, session.erase()).await {
        Ok(Ok(())) => EraseOutcome::Wiped,
        Ok(Err(e)) => {
            log::error!("Emergency erase failed: {}", e);
            EraseOutcome::Failed
        }
        Err(_) => {
            log::error!("Emergency erase exceeded {}ms", ERASE_DEADLINE.as_millis());
            EraseOutcome::TimedOut
        }
    };
    exit();
    outcome
}
