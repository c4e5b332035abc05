use crate::domain_model::*;
use std::time::Duration;

/// Maps a subject to the single session record currently allowed to rotate.
///
/// `put` is an unconditional overwrite and is the only way a previous session
/// gets revoked. Implementations need read-your-writes on one instance, not
/// linearizability across instances.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(
        &self,
        user_id: UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), SessionStoreError>;

    async fn get(&self, user_id: UserId) -> Result<Option<SessionRecord>, SessionStoreError>;

    /// Absent records are not an error.
    async fn delete(&self, user_id: UserId) -> Result<(), SessionStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt session record: {0}")]
    Corrupt(String),
}
