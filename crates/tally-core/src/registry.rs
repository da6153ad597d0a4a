use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::info;

use crate::domain::{Level, UserRecord};

/// Thread-safe owner of every persistent per-user record.
///
/// One mutex guards the whole map; the persistence writer snapshots under the
/// same lock so a flush never observes a record mid-mutation. Nothing may hold
/// this lock across a network call.
#[derive(Default)]
pub struct UserRegistry {
    inner: Mutex<HashMap<String, UserRecord>>,
}

impl UserRegistry {
    pub fn new(records: HashMap<String, UserRecord>) -> Self {
        Self {
            inner: Mutex::new(records),
        }
    }

    pub async fn get(&self, name: &str) -> Option<UserRecord> {
        self.inner.lock().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.inner.lock().await.contains_key(name)
    }

    /// Insert or replace a record wholesale.
    pub async fn upsert(&self, record: UserRecord) {
        self.inner
            .lock()
            .await
            .insert(record.name.clone(), record);
    }

    /// Ensure a record exists for `name`, creating a default one on first
    /// sight. Returns a copy of the current record.
    pub async fn ensure(&self, name: &str) -> UserRecord {
        let mut map = self.inner.lock().await;
        map.entry(name.to_string())
            .or_insert_with(|| {
                info!(user = name, "adding new user");
                UserRecord::new(name)
            })
            .clone()
    }

    /// Read-modify-write a single record under the lock. No-op if the record
    /// is absent.
    pub async fn update<F>(&self, name: &str, mutate: F)
    where
        F: FnOnce(&mut UserRecord),
    {
        let mut map = self.inner.lock().await;
        if let Some(record) = map.get_mut(name) {
            mutate(record);
        }
    }

    /// Change a user's level. Records already at Mod or Owner are left
    /// untouched, so the public API cannot accidentally demote staff.
    pub async fn set_level(&self, name: &str, level: Level) {
        let mut map = self.inner.lock().await;
        let Some(record) = map.get_mut(name) else {
            return;
        };
        if matches!(record.level, Level::Mod | Level::Owner) {
            return;
        }
        info!(user = name, level = level.label(), "setting user level");
        record.level = level;
    }

    /// Consistent snapshot of every record, for the persistence flush and for
    /// system-wide sweeps.
    pub async fn all(&self) -> Vec<UserRecord> {
        self.inner.lock().await.values().cloned().collect()
    }

    /// Zero every user's vote stamp. Runs when a poll concludes; the reset is
    /// deliberately global rather than scoped to that poll's voters.
    pub async fn reset_vote_stamps(&self) {
        let mut map = self.inner.lock().await;
        for record in map.values_mut() {
            record.last_vote = 0.0;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
