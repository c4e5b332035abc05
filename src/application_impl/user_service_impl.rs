use super::deadline::bounded;
use crate::application_port::{AuthError, UserService};
use crate::domain_model::*;
use crate::domain_port::AccountRepo;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct RealUserService {
    account_repo: Arc<dyn AccountRepo>,
    io_timeout: Duration,
}

impl RealUserService {
    pub fn new(account_repo: Arc<dyn AccountRepo>, io_timeout: Duration) -> RealUserService {
        RealUserService {
            account_repo,
            io_timeout,
        }
    }
}

#[async_trait::async_trait]
impl UserService for RealUserService {
    async fn profile(&self, user_id: UserId) -> Result<Identity, AuthError> {
        let record = bounded(
            "account_repo",
            self.io_timeout,
            self.account_repo.find_by_id(user_id),
        )
        .await?
        .ok_or(AuthError::UserNotFound)?;
        Ok(record.identity)
    }

    async fn set_banned(
        &self,
        target: UserId,
        banned: bool,
        reason: Option<String>,
    ) -> Result<Identity, AuthError> {
        let identity = bounded(
            "account_repo",
            self.io_timeout,
            self.account_repo.set_banned(target, banned, reason),
        )
        .await?;
        info!(user_id = %target, banned, "ban status changed");
        Ok(identity)
    }

    async fn set_role(&self, target: UserId, role: Role) -> Result<Identity, AuthError> {
        let identity = bounded(
            "account_repo",
            self.io_timeout,
            self.account_repo.set_role(target, role),
        )
        .await?;
        info!(user_id = %target, %role, "role changed");
        Ok(identity)
    }
}
