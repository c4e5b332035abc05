use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct Entry {
    record: SessionRecord,
    expires_at: DateTime<Utc>,
}

/// Single-process session store. TTL is enforced on read; `spawn_sweeper`
/// keeps memory bounded by evicting records nobody reads again.
pub struct MemorySessionStore {
    records: DashMap<UserId, Entry>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops expired records, returning how many went.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.records.len();
        self.records.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.records.len())
    }

    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = store.sweep();
                        if evicted > 0 {
                            debug!(evicted, "expired sessions swept");
                        }
                    }
                }
            }
        })
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(
        &self,
        user_id: UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        let expires_at = self.clock.now() + ttl;
        self.records.insert(
            user_id,
            Entry {
                record: record.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, user_id: UserId) -> Result<Option<SessionRecord>, SessionStoreError> {
        let now = self.clock.now();
        let expired = match self.records.get(&user_id) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.record.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.records.remove_if(&user_id, |_, entry| entry.expires_at <= now);
        }
        Ok(None)
    }

    async fn delete(&self, user_id: UserId) -> Result<(), SessionStoreError> {
        self.records.remove(&user_id);
        Ok(())
    }
}
