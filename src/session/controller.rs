use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{Result, StealthError};
use crate::session::history::{ConversationHistoryStore, SessionSummary};
use crate::session::model::{Session, SessionRequest, SessionState, Turn, TurnClock};
use crate::session::transport::StreamingDelta;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    Appended,
    Replaced,
    /// Empty, stale, or no session to apply it to.
    Discarded,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub turns: Vec<Turn>,
    pub cursor: Option<usize>,
    pub saved: Vec<i64>,
    pub current_turn: Option<Turn>,
}

/// Session lifecycle and turn ledger. Pure state: no I/O beyond history
/// persistence, so every transition is driven by the runtime task.
#[derive(Debug)]
pub struct StreamingSessionController {
    session: Option<Session>,
    history: ConversationHistoryStore,
    clock: TurnClock,
    cursor: usize,
    saved: BTreeSet<i64>,
    last_completed_response: Option<u64>,
}

impl StreamingSessionController {
    pub fn new(history: ConversationHistoryStore) -> Self {
        Self {
            session: None,
            history,
            clock: TurnClock::default(),
            cursor: 0,
            saved: BTreeSet::new(),
            last_completed_response: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.session.as_ref().map_or(SessionState::Idle, |s| s.state)
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_active)
    }

    /// Installs a new Active session after a successful handshake. The caller
    /// must have ended any previous session first.
    pub fn start(&mut self, request: &SessionRequest) -> Session {
        let mut session = Session::new(request);
        session.state = SessionState::Active;
        self.history.begin(&session.id);
        self.cursor = 0;
        self.saved.clear();
        self.last_completed_response = None;
        log::info!(
            "Session {} active (profile {:?}, language {}, key {})",
            session.id,
            session.profile,
            session.language.code(),
            session.api_key_ref.as_str()
        );
        self.session = Some(session.clone());
        session
    }

    /// Moves the active session to Ended. Returns its id, or None when there
    /// was nothing to end.
    pub fn end(&mut self, reason: &str) -> Option<String> {
        let session = self.session.as_mut().filter(|s| s.is_active())?;
        session.state = SessionState::Ended;
        session.streaming_busy = false;
        let id = session.id.clone();
        log::info!("Session {} ended: {}", id, reason);
        self.persist(&id);
        Some(id)
    }

    fn active_id(&self) -> Result<String> {
        match &self.session {
            Some(s) if s.is_active() => Ok(s.id.clone()),
            _ => Err(StealthError::Transport("No active session".into())),
        }
    }

    /// Records a user text turn. Fails when no session is Active.
    pub fn record_user_text(&mut self, text: &str) -> Result<Turn> {
        let id = self.active_id()?;
        let turn = Turn::user(text, self.clock.next());
        self.history.append(&id, turn.clone());
        if let Some(session) = self.session.as_mut() {
            session.streaming_busy = true;
        }
        Ok(turn)
    }

    /// Checks that media input may be sent.
    pub fn ensure_active(&self) -> Result<()> {
        self.active_id().map(|_| ())
    }

    pub fn apply_delta(&mut self, delta: &StreamingDelta) -> DeltaOutcome {
        let Ok(id) = self.active_id() else {
            return DeltaOutcome::Discarded;
        };
        if self
            .last_completed_response
            .is_some_and(|done| delta.response_id <= done)
        {
            log::debug!("Discarding stale delta for response {}", delta.response_id);
            return DeltaOutcome::Discarded;
        }
        if delta.text.is_empty() && !delta.is_complete {
            return DeltaOutcome::Discarded;
        }

        let open_timestamp = self
            .history
            .last(&id)
            .filter(|last| last.is_open_response())
            .map(|last| last.timestamp);

        let outcome = match open_timestamp {
            Some(timestamp) => {
                let turn = Turn::assistant(delta.text.clone(), delta.is_complete, timestamp);
                self.history.replace_last(&id, turn);
                DeltaOutcome::Replaced
            }
            None => {
                let turn = Turn::assistant(delta.text.clone(), delta.is_complete, self.clock.next());
                self.history.append(&id, turn);
                self.cursor = self.assistant_count().saturating_sub(1);
                DeltaOutcome::Appended
            }
        };

        if let Some(session) = self.session.as_mut() {
            session.streaming_busy = !delta.is_complete;
        }
        if delta.is_complete {
            self.last_completed_response = Some(delta.response_id);
            self.persist(&id);
        }
        outcome
    }

    /// Appends a terminal error turn. The session stays Active.
    pub fn apply_error(&mut self, message: &str) -> Option<Turn> {
        let id = self.active_id().ok()?;
        let turn = Turn::error(message, self.clock.next());
        self.history.append(&id, turn.clone());
        self.cursor = self.assistant_count().saturating_sub(1);
        if let Some(session) = self.session.as_mut() {
            session.streaming_busy = false;
        }
        self.persist(&id);
        Some(turn)
    }

    fn current_turns(&self) -> &[Turn] {
        match &self.session {
            Some(s) => self.history.turns(&s.id),
            None => &[],
        }
    }

    fn assistant_turns(&self) -> impl Iterator<Item = &Turn> {
        self.current_turns().iter().filter(|t| t.is_assistant())
    }

    fn assistant_count(&self) -> usize {
        self.assistant_turns().count()
    }

    pub fn cursor(&self) -> Option<usize> {
        (self.assistant_count() > 0).then_some(self.cursor)
    }

    pub fn current_turn(&self) -> Option<Turn> {
        self.assistant_turns().nth(self.cursor).cloned()
    }

    /// Steps the cursor over assistant turns, clamped at both ends.
    pub fn navigate(&mut self, direction: i32) -> Option<usize> {
        let count = self.assistant_count();
        if count == 0 {
            return None;
        }
        let target = self.cursor as i64 + i64::from(direction.signum());
        if (0..count as i64).contains(&target) {
            self.cursor = target as usize;
        }
        Some(self.cursor)
    }

    /// Flips saved membership of an assistant turn and returns the new
    /// membership. Unknown timestamps are ignored.
    pub fn toggle_saved(&mut self, timestamp: i64) -> bool {
        if !self.assistant_turns().any(|t| t.timestamp == timestamp) {
            log::warn!("toggle_saved: no assistant turn with timestamp {}", timestamp);
            return false;
        }
        if self.saved.remove(&timestamp) {
            false
        } else {
            self.saved.insert(timestamp);
            true
        }
    }

    pub fn is_saved(&self, timestamp: i64) -> bool {
        self.saved.contains(&timestamp)
    }

    pub fn history(&self, session_id: &str) -> Vec<Turn> {
        self.history.list_for_session(session_id)
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        self.history.list_sessions()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session.clone(),
            turns: self.current_turns().to_vec(),
            cursor: self.cursor(),
            saved: self.saved.iter().copied().collect(),
            current_turn: self.current_turn(),
        }
    }

    /// Wipes every session, the saved set and the cursor.
    pub fn erase(&mut self) -> Result<()> {
        self.session = None;
        self.cursor = 0;
        self.saved.clear();
        self.last_completed_response = None;
        self.history.erase()
    }

    fn persist(&self, session_id: &str) {
        if let Err(e) = self.history.persist(session_id) {
            log::warn!("Failed to persist session {}: {}", session_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::Role;

    fn active() -> StreamingSessionController {
        let mut controller = StreamingSessionController::new(ConversationHistoryStore::in_memory());
        let request = SessionRequest::parse("key", "interview", "en-US", "").unwrap();
        controller.start(&request);
        controller
    }

    fn delta(response_id: u64, text: &str, is_complete: bool) -> StreamingDelta {
        StreamingDelta {
            response_id,
            text: text.to_string(),
            is_complete,
        }
    }

    #[test]
    fn cumulative_deltas_merge_into_one_turn() {
        let mut c = active();
        c.record_user_text("hello").unwrap();
        assert_eq!(c.apply_delta(&delta(1, "Hi", false)), DeltaOutcome::Appended);
        assert_eq!(c.apply_delta(&delta(1, "Hi the", false)), DeltaOutcome::Replaced);
        assert_eq!(c.apply_delta(&delta(1, "Hi there!", true)), DeltaOutcome::Replaced);

        let turns = c.snapshot().turns;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].text, "Hi there!");
        assert!(turns[1].is_complete);
        assert!(!c.session().unwrap().streaming_busy);
    }

    #[test]
    fn completed_turn_is_immutable() {
        let mut c = active();
        c.apply_delta(&delta(1, "Done", true));
        assert_eq!(c.apply_delta(&delta(1, "Done again", false)), DeltaOutcome::Discarded);
        assert_eq!(c.apply_delta(&delta(1, "Done", true)), DeltaOutcome::Discarded);
        assert_eq!(c.snapshot().turns.len(), 1);

        assert_eq!(c.apply_delta(&delta(2, "Next", false)), DeltaOutcome::Appended);
        assert_eq!(c.snapshot().turns.len(), 2);
    }

    #[test]
    fn empty_partial_delta_is_ignored() {
        let mut c = active();
        assert_eq!(c.apply_delta(&delta(1, "", false)), DeltaOutcome::Discarded);
        assert!(c.snapshot().turns.is_empty());
    }

    #[test]
    fn error_turn_keeps_session_active() {
        let mut c = active();
        c.record_user_text("q").unwrap();
        c.apply_delta(&delta(1, "partial", false));
        let turn = c.apply_error("stream dropped").unwrap();
        assert!(turn.is_error && turn.is_complete);
        assert!(c.is_active());
        assert!(!c.session().unwrap().streaming_busy);
        assert!(c.record_user_text("again").is_ok());
        assert_eq!(c.snapshot().turns.len(), 4);
    }

    #[test]
    fn navigation_clamps_without_wrapping() {
        let mut c = active();
        assert_eq!(c.navigate(1), None);
        for id in 1..=3 {
            c.record_user_text("q").unwrap();
            c.apply_delta(&delta(id, &format!("answer {id}"), true));
        }
        assert_eq!(c.cursor(), Some(2));
        assert_eq!(c.navigate(1), Some(2));
        assert_eq!(c.navigate(-1), Some(1));
        assert_eq!(c.navigate(-1), Some(0));
        assert_eq!(c.navigate(-1), Some(0));
        assert_eq!(c.current_turn().unwrap().text, "answer 1");
    }

    #[test]
    fn toggle_saved_is_an_involution() {
        let mut c = active();
        c.apply_delta(&delta(1, "keep me", true));
        let ts = c.current_turn().unwrap().timestamp;
        assert!(c.toggle_saved(ts));
        assert!(c.is_saved(ts));
        assert!(!c.toggle_saved(ts));
        assert!(!c.is_saved(ts));
        assert!(!c.toggle_saved(ts + 1_000));
    }

    #[test]
    fn user_turn_cannot_be_saved() {
        let mut c = active();
        let user = c.record_user_text("mine").unwrap();
        assert!(!c.toggle_saved(user.timestamp));
        assert!(c.snapshot().saved.is_empty());
    }

    #[test]
    fn end_is_idempotent_and_blocks_input() {
        let mut c = active();
        assert!(c.end("done").is_some());
        assert!(c.end("done").is_none());
        assert_eq!(c.state(), SessionState::Ended);
        assert_eq!(c.record_user_text("late").unwrap_err().kind(), "TransportError");
        assert_eq!(c.apply_delta(&delta(1, "late", true)), DeltaOutcome::Discarded);
    }

    #[test]
    fn restart_resets_cursor_and_saved() {
        let mut c = active();
        c.apply_delta(&delta(1, "a", true));
        let ts = c.current_turn().unwrap().timestamp;
        c.toggle_saved(ts);
        let first = c.end("superseded").unwrap();

        let request = SessionRequest::parse("key", "sales", "en-GB", "").unwrap();
        let second = c.start(&request);
        let snapshot = c.snapshot();
        assert!(snapshot.turns.is_empty());
        assert!(snapshot.saved.is_empty());
        assert_eq!(snapshot.cursor, None);
        assert_eq!(c.history(&first).len(), 1);
        assert_eq!(c.list_sessions().len(), 2);
        assert_ne!(first, second.id);
    }

    #[test]
    fn erase_clears_everything() {
        let mut c = active();
        c.record_user_text("secret").unwrap();
        c.erase().unwrap();
        assert_eq!(c.state(), SessionState::Idle);
        assert!(c.list_sessions().is_empty());
    }
}
