use crate::domain_model::*;

/// Authoritative lookup of the current user record. Queried on every
/// authenticated request; callers must not cache results across requests.
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, user_id: UserId) -> Result<Option<Identity>, ResolveError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("identity backend unavailable: {0}")]
    Unavailable(String),
}
