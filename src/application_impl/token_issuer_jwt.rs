use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::Clock;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    iss: String,
    aud: String,
    jti: String,
    typ: TokenKind,
}

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl KindKeys {
    fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs: ttl.as_secs() as i64,
        }
    }
}

/// HS256 token pairs. Access and refresh tokens are signed with separate
/// secrets and tagged with their kind, so neither verifies as the other.
pub struct JwtHs256Issuer {
    issuer: String,
    audience: String,
    access: KindKeys,
    refresh: KindKeys,
    clock: Arc<dyn Clock>,
}

impl JwtHs256Issuer {
    pub fn new(cfg: JwtConfig, clock: Arc<dyn Clock>) -> Self {
        JwtHs256Issuer {
            access: KindKeys::new(&cfg.access_secret, cfg.access_ttl),
            refresh: KindKeys::new(&cfg.refresh_secret, cfg.refresh_ttl),
            issuer: cfg.issuer,
            audience: cfg.audience,
            clock,
        }
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn encode(
        &self,
        kind: TokenKind,
        user_id: UserId,
        iat: i64,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let keys = self.keys(kind);
        let exp = iat + keys.ttl_secs;
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| TokenError::Encode("expiry out of range".to_string()))?;
        let claims = Claims {
            sub: user_id.to_string(),
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            typ: kind,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))?;
        Ok((token, expires_at))
    }

    fn decode(&self, kind: TokenKind, token: &str) -> Result<UserId, TokenError> {
        let mut v = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock.
        v.validate_exp = false;
        v.leeway = 0;
        v.set_audience(&[self.audience.as_str()]);
        v.set_issuer(&[self.issuer.as_str()]);
        v.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let data = decode::<Claims>(token, &self.keys(kind).decoding, &v).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            }
        })?;
        let claims = data.claims;

        if claims.typ != kind {
            return Err(TokenError::InvalidSignature);
        }
        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| TokenError::Malformed)?;

        if self.clock.now().timestamp() >= claims.exp {
            let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(TokenError::Malformed)?;
            return Err(TokenError::Expired { user_id, issued_at });
        }
        Ok(user_id)
    }
}

impl TokenIssuer for JwtHs256Issuer {
    fn issue(&self, user_id: UserId) -> Result<TokenPair, TokenError> {
        let iat = self.clock.now().timestamp();
        let (access, access_exp) = self.encode(TokenKind::Access, user_id, iat)?;
        let (refresh, refresh_exp) = self.encode(TokenKind::Refresh, user_id, iat)?;
        Ok(TokenPair {
            access_token: AccessToken(access),
            refresh_token: RefreshToken(refresh),
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }

    fn verify_access(&self, token: &AccessToken) -> Result<UserId, TokenError> {
        self.decode(TokenKind::Access, &token.0)
    }

    fn verify_refresh(&self, token: &RefreshToken) -> Result<UserId, TokenError> {
        self.decode(TokenKind::Refresh, &token.0)
    }
}
