use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("access token missing")]
    MissingAccessToken,
    #[error("token invalid")]
    InvalidToken,
    #[error("access token expired and no refresh token presented")]
    RefreshRequired,
    #[error("refresh token invalid")]
    InvalidRefreshToken,
    #[error("session revoked")]
    SessionRevoked,
    #[error("user not found")]
    UserNotFound,
    #[error("account banned")]
    Banned { reason: Option<String> },
    #[error("access denied")]
    AccessDenied,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user already exists")]
    UserExists,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
    #[error("dependency timed out: {0}")]
    DependencyTimeout(&'static str),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// True when the system is degraded rather than the caller unauthorized.
    pub fn is_dependency_failure(&self) -> bool {
        matches!(
            self,
            AuthError::DependencyUnavailable(_) | AuthError::DependencyTimeout(_)
        )
    }
}

impl From<SessionStoreError> for AuthError {
    fn from(err: SessionStoreError) -> Self {
        AuthError::DependencyUnavailable(err.to_string())
    }
}

impl From<ResolveError> for AuthError {
    fn from(err: ResolveError) -> Self {
        AuthError::DependencyUnavailable(err.to_string())
    }
}

impl From<AccountRepoError> for AuthError {
    fn from(err: AccountRepoError) -> Self {
        match err {
            AccountRepoError::UsernameTaken => AuthError::UserExists,
            AccountRepoError::NotFound => AuthError::UserNotFound,
            AccountRepoError::Store(e) => AuthError::DependencyUnavailable(e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token malformed")]
    Malformed,
    #[error("token signature invalid")]
    InvalidSignature,
    /// Authentic but past its expiry; the subject and issue time are still
    /// reported.
    #[error("token expired")]
    Expired {
        user_id: UserId,
        issued_at: DateTime<Utc>,
    },
    #[error("token encoding failed: {0}")]
    Encode(String),
}

/// Signs and verifies token pairs. Pure computation, never blocks.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user_id: UserId) -> Result<TokenPair, TokenError>;
    fn verify_access(&self, token: &AccessToken) -> Result<UserId, TokenError>;
    fn verify_refresh(&self, token: &RefreshToken) -> Result<UserId, TokenError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Whether a route insists on an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    Required,
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Authenticated(Identity),
    Anonymous,
}

impl GateOutcome {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            GateOutcome::Authenticated(identity) => Some(identity),
            GateOutcome::Anonymous => None,
        }
    }
}

/// Role check run after the gate has produced an identity.
pub fn authorize(identity: &Identity, allowed: &[Role]) -> Result<(), AuthError> {
    if identity.role.is_one_of(allowed) {
        Ok(())
    } else {
        Err(AuthError::AccessDenied)
    }
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(
        &self,
        request: SignupInput,
        transport: &dyn CookieTransport,
    ) -> Result<Identity, AuthError>;

    async fn login(
        &self,
        request: LoginInput,
        transport: &dyn CookieTransport,
    ) -> Result<Identity, AuthError>;

    /// Client-initiated rotation. Clears client tokens on any authentication
    /// failure.
    async fn refresh(
        &self,
        refresh_token: Option<RefreshToken>,
        transport: &dyn CookieTransport,
    ) -> Result<Identity, AuthError>;

    /// Best-effort; always succeeds from the caller's point of view.
    async fn logout(&self, presented: PresentedTokens, transport: &dyn CookieTransport);

    /// Runs the request gate over whatever the client presented.
    async fn authenticate(
        &self,
        presented: PresentedTokens,
        mode: GateMode,
        transport: &dyn CookieTransport,
    ) -> Result<GateOutcome, AuthError>;
}
