#![cfg(feature = "web")]
//! Per-browser session context
//!
//! A session holds the table handed from the inspection stage to the
//! visualization stage, plus the open workbook while the user picks a sheet.
//! Sessions live in a [`SessionStore`] owned by the application state and are
//! looked up by the `session` cookie.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::loader::Workbook;
use crate::table::Table;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// Default idle time before a session is dropped
pub const SESSION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Workbook uploaded in this session and the sheet currently shown
#[derive(Clone, Debug)]
pub struct OpenWorkbook {
    pub key: String,
    pub workbook: Arc<Workbook>,
    pub selected: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub file_name: Option<String>,
    pub table: Option<Arc<Table>>,
    pub workbook: Option<OpenWorkbook>,
    last_seen: Instant,
}

impl Session {
    fn new() -> Self {
        Session {
            file_name: None,
            table: None,
            workbook: None,
            last_seen: Instant::now(),
        }
    }

    /// Replaces the session data with a parsed CSV table
    pub fn set_table(&mut self, file_name: Option<String>, table: Arc<Table>) {
        self.file_name = file_name;
        self.workbook = None;
        self.table = Some(table);
    }

    /// Replaces the session data with a freshly uploaded workbook
    ///
    /// The previous table is dropped until a sheet is selected.
    pub fn set_workbook(&mut self, file_name: Option<String>, key: String, workbook: Arc<Workbook>) {
        self.file_name = file_name;
        self.table = None;
        self.workbook = Some(OpenWorkbook {
            key,
            workbook,
            selected: None,
        });
    }

    /// Stores the table parsed from sheet `name` of the open workbook
    pub fn set_sheet(&mut self, name: String, table: Arc<Table>) {
        if let Some(open) = self.workbook.as_mut() {
            open.selected = Some(name);
        }
        self.table = Some(table);
    }

    pub fn sheet_names(&self) -> Option<&[String]> {
        self.workbook.as_ref().map(|w| w.workbook.sheet_names())
    }
}

/// All live sessions, keyed by session id
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_DURATION)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a live session id for the cookie value `id`
    ///
    /// Unknown or expired ids get a new, empty session. Expired sessions are
    /// purged whenever one is created.
    ///
    /// # Returns
    /// * `(String, bool)` - The session id and whether it was just created
    pub fn resolve(&self, id: Option<&str>) -> (String, bool) {
        let now = Instant::now();
        let mut sessions = self.lock();

        if let Some(session) = id.and_then(|id| sessions.get_mut(id)) {
            if now.duration_since(session.last_seen) < self.ttl {
                session.last_seen = now;
                return (id.unwrap_or_default().to_string(), false);
            }
        }

        let before = sessions.len();
        let ttl = self.ttl;
        sessions.retain(|_, s| now.duration_since(s.last_seen) < ttl);
        if sessions.len() < before {
            log::debug!("purged {} expired sessions", before - sessions.len());
        }

        let id = Uuid::new_v4().to_string();
        sessions.insert(id.clone(), Session::new());
        log::debug!("created session {}", id);
        (id, true)
    }

    /// Snapshot of a session; tables and workbooks are shared, not copied
    pub fn get(&self, id: &str) -> Option<Session> {
        self.lock().get(id).cloned()
    }

    /// Runs `f` on the session with the store locked
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.lock().get_mut(id).map(f)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::from_csv;

    #[test]
    fn test_resolve_creates_and_reuses() {
        let store = SessionStore::default();

        let (id, created) = store.resolve(None);
        assert!(created);

        let (again, created) = store.resolve(Some(&id));
        assert!(!created);
        assert_eq!(id, again);

        let (other, created) = store.resolve(Some("bogus"));
        assert!(created);
        assert_ne!(other, id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_expired_sessions_are_replaced_and_purged() {
        let store = SessionStore::new(Duration::ZERO);
        let (id, _) = store.resolve(None);

        let (next, created) = store.resolve(Some(&id));
        assert!(created);
        assert_ne!(next, id);
        assert!(store.get(&id).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::default();
        let (a, _) = store.resolve(None);
        let (b, _) = store.resolve(None);

        let table = Arc::new(from_csv(b"x\n1\n").unwrap());
        store.update(&a, |s| s.set_table(Some("x.csv".into()), table));

        assert!(store.get(&a).unwrap().table.is_some());
        assert!(store.get(&b).unwrap().table.is_none());
    }

    #[test]
    fn test_new_upload_replaces_table() {
        let mut session = Session::new();
        session.set_table(None, Arc::new(from_csv(b"x\n1\n").unwrap()));
        session.set_table(None, Arc::new(from_csv(b"y\n2\n3\n").unwrap()));

        let table = session.table.unwrap();
        assert_eq!(table.column_names(), vec!["y"]);
        assert_eq!(table.row_count(), 2);
    }
}
