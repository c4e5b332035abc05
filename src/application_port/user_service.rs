use crate::application_port::AuthError;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    async fn profile(&self, user_id: UserId) -> Result<Identity, AuthError>;

    async fn set_banned(
        &self,
        target: UserId,
        banned: bool,
        reason: Option<String>,
    ) -> Result<Identity, AuthError>;

    async fn set_role(&self, target: UserId, role: Role) -> Result<Identity, AuthError>;
}
