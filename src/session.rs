//! In-memory session store: session id → subscription list.
//!
//! Sessions are created on page load, replaced wholesale on every successful
//! upload, and mutated only through [`SessionStore::set_category`]. Nothing
//! expires; the store lives as long as the process.
//!
//! The map sits behind an async `RwLock`, so concurrent requests for the same
//! session (two browser tabs) serialise rather than race.

use crate::model::{Category, SubscriptionRecord};
use crate::pipeline::normalize::ID_PREFIX;
use crate::report::{Report, Totals};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Session {
    records: Vec<SubscriptionRecord>,
    /// Next record number; only ever grows, so ids are never reused.
    next_id: u64,
}

/// Shared handle to every session. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh, empty session and return its id.
    pub async fn create(&self) -> String {
        let sid = Uuid::new_v4().to_string();
        self.create_with(&sid).await;
        sid
    }

    /// Reset `sid` to an empty session.
    pub async fn create_with(&self, sid: &str) {
        let mut store = self.inner.write().await;
        store.insert(sid.to_string(), Session::default());
        debug!(sid = %sid, sessions = store.len(), "session created");
    }

    /// Replace the session's records, creating the session if needed.
    ///
    /// Ids are re-stamped from the session's counter so an id handed out by
    /// an earlier upload never points at a record from a later one.
    pub async fn replace(&self, sid: &str, records: Vec<SubscriptionRecord>) {
        let mut store = self.inner.write().await;
        let session = store.entry(sid.to_string()).or_default();

        session.records = records
            .into_iter()
            .map(|mut r| {
                r.id = format!("{ID_PREFIX}{}", session.next_id);
                session.next_id += 1;
                r
            })
            .collect();
        debug!(sid = %sid, records = session.records.len(), "session replaced");
    }

    /// Set the category of the first record with `record_id`.
    ///
    /// Returns `false`, without error, when the session or record is unknown.
    pub async fn set_category(&self, sid: &str, record_id: &str, category: Category) -> bool {
        let mut store = self.inner.write().await;
        let Some(record) = store
            .get_mut(sid)
            .and_then(|s| s.records.iter_mut().find(|r| r.id == record_id))
        else {
            warn!(sid = %sid, record_id = %record_id, "categorize: unknown session or record");
            return false;
        };
        record.category = category;
        debug!(sid = %sid, record_id = %record_id, category = %category, "record categorized");
        true
    }

    /// Snapshot of the session's records; empty for an unknown session.
    pub async fn records(&self, sid: &str) -> Vec<SubscriptionRecord> {
        let store = self.inner.read().await;
        store.get(sid).map(|s| s.records.clone()).unwrap_or_default()
    }

    pub async fn contains(&self, sid: &str) -> bool {
        self.inner.read().await.contains_key(sid)
    }

    pub async fn totals(&self, sid: &str) -> Totals {
        let store = self.inner.read().await;
        store
            .get(sid)
            .map(|s| Totals::from_records(&s.records))
            .unwrap_or_default()
    }

    pub async fn report(&self, sid: &str) -> Report {
        let store = self.inner.read().await;
        store
            .get(sid)
            .map(|s| Report::from_records(&s.records))
            .unwrap_or_default()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
