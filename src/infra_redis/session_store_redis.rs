use crate::domain_model::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// One key per subject, `{prefix}:session:{user_id}`, holding the refresh
/// fingerprint with a TTL equal to the refresh window.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisSessionStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, user_id: UserId) -> String {
        session_key(&self.prefix, user_id)
    }
}

fn session_key(prefix: &str, user_id: UserId) -> String {
    format!("{}:session:{}", prefix, user_id)
}

fn unavailable(e: redis::RedisError) -> SessionStoreError {
    SessionStoreError::Unavailable(e.to_string())
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(
        &self,
        user_id: UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(&key, record.as_str(), ttl.as_secs().max(1))
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn get(&self, user_id: UserId) -> Result<Option<SessionRecord>, SessionStoreError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(&key).await.map_err(unavailable)?;
        match value {
            Some(v) if v.is_empty() => Err(SessionStoreError::Corrupt(key)),
            Some(v) => Ok(Some(SessionRecord(v))),
            None => Ok(None),
        }
    }

    async fn delete(&self, user_id: UserId) -> Result<(), SessionStoreError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let _: () = conn.del(&key).await.map_err(unavailable)?;
        Ok(())
    }
}
