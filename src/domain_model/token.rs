use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

// Token values must not end up in logs.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshToken(..)")
    }
}

/// A freshly issued access/refresh pair. Never persisted as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Whatever credentials the client sent with a request. Either may be absent.
#[derive(Debug, Clone, Default)]
pub struct PresentedTokens {
    pub access_token: Option<AccessToken>,
    pub refresh_token: Option<RefreshToken>,
}

impl PresentedTokens {
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        // An empty cookie value is what a cleared cookie looks like.
        Self {
            access_token: access_token.filter(|s| !s.is_empty()).map(AccessToken),
            refresh_token: refresh_token.filter(|s| !s.is_empty()).map(RefreshToken),
        }
    }
}
