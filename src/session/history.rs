use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::model::Turn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    session_id: String,
    started_at: i64,
    turns: Vec<Turn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: i64,
    pub turn_count: usize,
    pub last_activity: i64,
}

/// Ordered turn ledger per session. Turns are append-only; the only
/// in-place edit is replacing the newest turn while it is still streaming.
#[derive(Debug, Default)]
pub struct ConversationHistoryStore {
    records: HashMap<String, SessionRecord>,
    order: Vec<String>,
    dir: Option<PathBuf>,
}

impl ConversationHistoryStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a store backed by `<dir>/<session_id>.json`, loading prior sessions.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut loaded: Vec<SessionRecord> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(crate::error::StealthError::from)
                .and_then(|text| Ok(serde_json::from_str::<SessionRecord>(&text)?))
            {
                Ok(record) => loaded.push(record),
                Err(e) => log::warn!("Skipping unreadable history file {:?}: {}", path, e),
            }
        }
        loaded.sort_by_key(|r| r.started_at);

        let mut store = Self {
            records: HashMap::new(),
            order: Vec::new(),
            dir: Some(dir),
        };
        for record in loaded {
            store.order.push(record.session_id.clone());
            store.records.insert(record.session_id.clone(), record);
        }
        Ok(store)
    }

    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("cheddar-overlay")
            .join("history")
    }

    fn record_mut(&mut self, session_id: &str) -> &mut SessionRecord {
        if !self.records.contains_key(session_id) {
            self.order.push(session_id.to_string());
        }
        self.records
            .entry(session_id.to_string())
            .or_insert_with(|| SessionRecord {
                session_id: session_id.to_string(),
                started_at: chrono::Utc::now().timestamp_millis(),
                turns: Vec::new(),
            })
    }

    /// Registers an empty session so it shows up in listings before its first turn.
    pub fn begin(&mut self, session_id: &str) {
        self.record_mut(session_id);
    }

    pub fn append(&mut self, session_id: &str, turn: Turn) {
        self.record_mut(session_id).turns.push(turn);
    }

    /// Replaces the newest turn of a session. Returns false if the session has no turns.
    pub fn replace_last(&mut self, session_id: &str, turn: Turn) -> bool {
        match self.records.get_mut(session_id).and_then(|r| r.turns.last_mut()) {
            Some(last) => {
                *last = turn;
                true
            }
            None => false,
        }
    }

    pub fn last(&self, session_id: &str) -> Option<&Turn> {
        self.records.get(session_id).and_then(|r| r.turns.last())
    }

    pub fn list_for_session(&self, session_id: &str) -> Vec<Turn> {
        self.records
            .get(session_id)
            .map(|r| r.turns.clone())
            .unwrap_or_default()
    }

    pub fn turns(&self, session_id: &str) -> &[Turn] {
        self.records
            .get(session_id)
            .map(|r| r.turns.as_slice())
            .unwrap_or(&[])
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|r| SessionSummary {
                session_id: r.session_id.clone(),
                started_at: r.started_at,
                turn_count: r.turns.len(),
                last_activity: r.turns.last().map_or(r.started_at, |t| t.timestamp),
            })
            .collect()
    }

    /// Writes one session to disk. No-op for in-memory stores.
    pub fn persist(&self, session_id: &str) -> Result<()> {
        let (Some(dir), Some(record)) = (&self.dir, self.records.get(session_id)) else {
            return Ok(());
        };
        let path = session_path(dir, session_id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Drops every session from memory and removes every history file in
    /// the store directory, including ones `open` skipped and interrupted
    /// `.json.tmp` writes.
    pub fn erase(&mut self) -> Result<()> {
        self.order.clear();
        self.records.clear();
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !is_history_file(&path) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn is_history_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    path.is_file() && (name.ends_with(".json") || name.ends_with(".json.tmp"))
}

fn session_path(dir: &Path, session_id: &str) -> PathBuf {
    let safe: String = session_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    dir.join(format!("{safe}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appends_are_visible_in_order() {
        let mut store = ConversationHistoryStore::in_memory();
        store.append("s1", Turn::user("one", 1));
        store.append("s1", Turn::assistant("two", true, 2));
        store.append("s2", Turn::user("other", 3));

        let texts: Vec<String> = store.list_for_session("s1").into_iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert!(store.list_for_session("missing").is_empty());
    }

    #[test]
    fn replace_last_only_touches_newest_turn() {
        let mut store = ConversationHistoryStore::in_memory();
        assert!(!store.replace_last("s1", Turn::assistant("x", false, 1)));
        store.append("s1", Turn::user("q", 1));
        store.append("s1", Turn::assistant("Hi", false, 2));
        assert!(store.replace_last("s1", Turn::assistant("Hi there", true, 2)));
        let turns = store.list_for_session("s1");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].text, "Hi there");
    }

    #[test]
    fn persisted_sessions_reload() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = ConversationHistoryStore::open(dir.path()).unwrap();
            store.append("abc-1", Turn::user("hello", 10));
            store.append("abc-1", Turn::assistant("hi", true, 11));
            store.persist("abc-1").unwrap();
        }
        let store = ConversationHistoryStore::open(dir.path()).unwrap();
        let sessions = store.list_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].turn_count, 2);
        assert_eq!(sessions[0].last_activity, 11);
        assert_eq!(store.list_for_session("abc-1")[1].text, "hi");
    }

    #[test]
    fn erase_removes_memory_and_files() {
        let dir = TempDir::new().unwrap();
        let mut store = ConversationHistoryStore::open(dir.path()).unwrap();
        store.append("abc-2", Turn::user("secret", 1));
        store.persist("abc-2").unwrap();

        store.erase().unwrap();

        assert!(store.list_sessions().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn erase_also_removes_unloaded_and_partial_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("corrupt.json"), "{ nope").unwrap();
        std::fs::write(dir.path().join("abc-3.json.tmp"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        let mut store = ConversationHistoryStore::open(dir.path()).unwrap();
        assert!(store.list_sessions().is_empty());
        store.erase().unwrap();

        let left: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, vec!["notes.txt"]);
    }
}
