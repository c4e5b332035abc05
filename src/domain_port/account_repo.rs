use crate::domain_model::*;

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub identity: Identity,
    pub password_hash: String,
}

#[async_trait::async_trait]
pub trait AccountRepo: Send + Sync {
    async fn create(&self, account: NewAccount) -> Result<AccountRecord, AccountRepoError>;

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AccountRecord>, AccountRepoError>;

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<AccountRecord>, AccountRepoError>;

    async fn set_banned(
        &self,
        user_id: UserId,
        banned: bool,
        reason: Option<String>,
    ) -> Result<Identity, AccountRepoError>;

    async fn set_role(&self, user_id: UserId, role: Role) -> Result<Identity, AccountRepoError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AccountRepoError {
    #[error("username already taken")]
    UsernameTaken,
    #[error("account not found")]
    NotFound,
    #[error("account store error: {0}")]
    Store(String),
}
