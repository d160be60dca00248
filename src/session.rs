use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "querybridge_session";

/// What one browser session remembers between requests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionState {
    generated_sql: Option<String>,
    show_sql: bool,
}

impl SessionState {
    /// Stores freshly generated SQL and hides it again, whatever the flag was before.
    pub fn set_generated_sql(&mut self, sql: String) {
        self.generated_sql = Some(sql);
        self.show_sql = false;
    }

    /// Flips SQL visibility. Does nothing until some SQL has been generated.
    pub fn toggle_sql(&mut self) -> bool {
        if self.has_sql() {
            self.show_sql = !self.show_sql;
        }
        self.show_sql
    }

    pub fn has_sql(&self) -> bool {
        self.generated_sql
            .as_deref()
            .is_some_and(|sql| !sql.is_empty())
    }

    pub fn generated_sql(&self) -> Option<&str> {
        self.generated_sql.as_deref()
    }

    #[cfg(test)]
    pub fn show_sql(&self) -> bool {
        self.show_sql
    }

    /// The SQL to render, only when the flag is set and there is something to show.
    pub fn visible_sql(&self) -> Option<&str> {
        if self.show_sql && self.has_sql() {
            self.generated_sql()
        } else {
            None
        }
    }
}

pub type SessionHandle = Arc<Mutex<SessionState>>;

struct SessionEntry {
    handle: SessionHandle,
    last_seen: Instant,
}

impl SessionEntry {
    // A handle still held by a request is never stale
    fn is_stale(&self, idle_timeout: Duration) -> bool {
        Arc::strong_count(&self.handle) == 1 && self.last_seen.elapsed() >= idle_timeout
    }
}

/// Process-local map from session id to that session's state.
///
/// Each session has its own mutex; handlers hold it for the whole of a submit or toggle so
/// a session never runs two actions at once while other sessions proceed independently.
/// Sessions idle for longer than `idle_timeout` are discarded.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// The live session for `id`, if any. Never creates one.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;

        let stale = sessions.get(id)?.is_stale(self.idle_timeout);
        if stale {
            sessions.remove(id);
            debug!("Expired session {}", id);
            return None;
        }

        let entry = sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.handle))
    }

    /// Returns the session for `id`, creating it when the id is absent, unknown or expired.
    /// The returned id is the one the client should keep using.
    pub async fn get_or_create(&self, id: Option<&str>) -> (String, SessionHandle) {
        if let Some(id) = id {
            if let Some(handle) = self.get(id).await {
                return (id.to_string(), handle);
            }
        }

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_stale(self.idle_timeout));
        if sessions.len() < before {
            debug!("Dropped {} idle sessions", before - sessions.len());
        }

        let id = uuid::Uuid::new_v4().to_string();
        let handle: SessionHandle = Arc::new(Mutex::new(SessionState::default()));
        sessions.insert(
            id.clone(),
            SessionEntry {
                handle: Arc::clone(&handle),
                last_seen: Instant::now(),
            },
        );
        debug!("Created session {}", id);

        (id, handle)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_has_nothing_to_show() {
        let state = SessionState::default();
        assert!(!state.has_sql());
        assert!(!state.show_sql());
        assert_eq!(state.visible_sql(), None);
    }

    #[test]
    fn new_sql_always_resets_visibility() {
        let mut state = SessionState::default();
        state.set_generated_sql("SELECT 1;".to_string());
        assert!(state.toggle_sql());

        state.set_generated_sql("SELECT 2;".to_string());
        assert!(!state.show_sql());
        assert_eq!(state.generated_sql(), Some("SELECT 2;"));
    }

    #[test]
    fn double_toggle_restores_flag() {
        let mut state = SessionState::default();
        state.set_generated_sql("SELECT 1;".to_string());
        let before = state.show_sql();

        state.toggle_sql();
        assert_eq!(state.visible_sql(), Some("SELECT 1;"));
        state.toggle_sql();
        assert_eq!(state.show_sql(), before);
    }

    #[test]
    fn toggle_without_sql_keeps_flag_false() {
        let mut state = SessionState::default();
        assert!(!state.toggle_sql());

        state.set_generated_sql(String::new());
        assert!(!state.toggle_sql());
        assert_eq!(state.visible_sql(), None);
    }

    #[tokio::test]
    async fn store_reuses_known_ids_and_replaces_unknown_ones() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let (id, handle) = store.get_or_create(None).await;
        handle.lock().await.set_generated_sql("SELECT 1;".to_string());
        drop(handle);

        let (same_id, same) = store.get_or_create(Some(&id)).await;
        assert_eq!(same_id, id);
        assert!(same.lock().await.has_sql());

        let (other_id, other) = store.get_or_create(Some("stale-id")).await;
        assert_ne!(other_id, "stale-id");
        assert!(!other.lock().await.has_sql());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn lookup_never_creates() {
        let store = SessionStore::new(Duration::from_secs(3600));
        assert!(store.get("unknown").await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn idle_sessions_are_dropped() {
        let store = SessionStore::new(Duration::ZERO);
        let (first, handle) = store.get_or_create(None).await;
        drop(handle);

        let (_second, _held) = store.get_or_create(None).await;
        assert_eq!(store.len().await, 1);
        assert!(store.get(&first).await.is_none());
    }

    #[tokio::test]
    async fn sessions_in_use_are_not_dropped() {
        let store = SessionStore::new(Duration::ZERO);
        let (first, _held) = store.get_or_create(None).await;

        let (_second, _other) = store.get_or_create(None).await;
        assert_eq!(store.len().await, 2);
        assert!(store.get(&first).await.is_some());
    }
}
