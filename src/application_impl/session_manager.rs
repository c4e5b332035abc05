use super::deadline::bounded;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const FINGERPRINT_LABEL: &[u8] = b"palimpsest/session-fingerprint/v1";

/// Key for session fingerprints, derived from `secret` under a fixed label.
pub fn derive_fingerprint_key(secret: &[u8]) -> Result<Vec<u8>, AuthError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
    mac.update(FINGERPRINT_LABEL);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Owns the session record of each subject: opening it on login, rotating it
/// on refresh and closing it on logout.
pub struct SessionManager {
    token_issuer: Arc<dyn TokenIssuer>,
    session_store: Arc<dyn SessionStore>,
    fingerprint_key: Vec<u8>,
    clock: Arc<dyn Clock>,
    io_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        token_issuer: Arc<dyn TokenIssuer>,
        session_store: Arc<dyn SessionStore>,
        fingerprint_key: Vec<u8>,
        clock: Arc<dyn Clock>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            token_issuer,
            session_store,
            fingerprint_key,
            clock,
            io_timeout,
        }
    }

    /// Issues a fresh pair and makes its refresh token the only live one for
    /// the subject.
    pub async fn open(&self, user_id: UserId) -> Result<TokenPair, AuthError> {
        let tokens = self
            .token_issuer
            .issue(user_id)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        self.store(user_id, &tokens).await?;
        Ok(tokens)
    }

    /// Exchanges a refresh token for a new pair. The new record is written
    /// before the pair is returned, so a client adopting it always finds a
    /// matching record.
    pub async fn rotate(&self, refresh_token: &RefreshToken) -> Result<(UserId, TokenPair), AuthError> {
        let user_id = self
            .token_issuer
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let stored = bounded(
            "session_store",
            self.io_timeout,
            self.session_store.get(user_id),
        )
        .await?;

        match stored {
            Some(record) if self.matches(refresh_token, &record) => {}
            Some(_) => {
                warn!(%user_id, "refresh token superseded by a later rotation, possible reuse");
                return Err(AuthError::SessionRevoked);
            }
            None => {
                info!(%user_id, "refresh token presented with no live session");
                return Err(AuthError::SessionRevoked);
            }
        }

        let tokens = self.open(user_id).await?;
        info!(%user_id, "session rotated");
        Ok((user_id, tokens))
    }

    pub async fn close(&self, user_id: UserId) -> Result<(), AuthError> {
        bounded(
            "session_store",
            self.io_timeout,
            self.session_store.delete(user_id),
        )
        .await
    }

    async fn store(&self, user_id: UserId, tokens: &TokenPair) -> Result<(), AuthError> {
        let record = self.fingerprint(&tokens.refresh_token)?;
        let ttl = self.ttl(tokens.refresh_token_expires_at);
        bounded(
            "session_store",
            self.io_timeout,
            self.session_store.put(user_id, &record, ttl),
        )
        .await
    }

    fn mac(&self) -> Result<Hmac<Sha256>, AuthError> {
        Hmac::<Sha256>::new_from_slice(&self.fingerprint_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }

    fn fingerprint(&self, token: &RefreshToken) -> Result<SessionRecord, AuthError> {
        let mut mac = self.mac()?;
        mac.update(token.0.as_bytes());
        Ok(SessionRecord(hex::encode(mac.finalize().into_bytes())))
    }

    fn matches(&self, token: &RefreshToken, record: &SessionRecord) -> bool {
        let Ok(expected) = hex::decode(record.as_str()) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(token.0.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    fn ttl(&self, until: DateTime<Utc>) -> Duration {
        let secs = (until - self.clock.now()).num_seconds();
        if secs <= 0 {
            Duration::from_secs(1)
        } else {
            Duration::from_secs(secs as u64)
        }
    }
}
