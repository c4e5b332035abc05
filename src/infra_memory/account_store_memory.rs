use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Accounts held in process memory. Doubles as the identity resolver, since
/// it is the authority on role and ban state.
pub struct MemoryAccountStore {
    accounts: DashMap<UserId, AccountRecord>,
    usernames: DashMap<String, UserId>,
    clock: Arc<dyn Clock>,
}

impl MemoryAccountStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: DashMap::new(),
            usernames: DashMap::new(),
            clock,
        }
    }

    fn username_key(username: &str) -> String {
        username.to_ascii_lowercase()
    }
}

#[async_trait::async_trait]
impl AccountRepo for MemoryAccountStore {
    async fn create(&self, account: NewAccount) -> Result<AccountRecord, AccountRepoError> {
        match self.usernames.entry(Self::username_key(&account.username)) {
            Entry::Occupied(_) => Err(AccountRepoError::UsernameTaken),
            Entry::Vacant(slot) => {
                let user_id = UserId::new_random();
                let record = AccountRecord {
                    identity: Identity {
                        user_id,
                        username: account.username,
                        email: account.email,
                        role: account.role,
                        is_banned: false,
                        ban_reason: None,
                        created_at: self.clock.now(),
                    },
                    password_hash: account.password_hash,
                };
                self.accounts.insert(user_id, record.clone());
                slot.insert(user_id);
                Ok(record)
            }
        }
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AccountRecord>, AccountRepoError> {
        let user_id = match self.usernames.get(&Self::username_key(username)) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.accounts.get(&user_id).map(|r| r.value().clone()))
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<AccountRecord>, AccountRepoError> {
        Ok(self.accounts.get(&user_id).map(|r| r.value().clone()))
    }

    async fn set_banned(
        &self,
        user_id: UserId,
        banned: bool,
        reason: Option<String>,
    ) -> Result<Identity, AccountRepoError> {
        let mut record = self
            .accounts
            .get_mut(&user_id)
            .ok_or(AccountRepoError::NotFound)?;
        record.identity.is_banned = banned;
        record.identity.ban_reason = if banned { reason } else { None };
        Ok(record.identity.clone())
    }

    async fn set_role(&self, user_id: UserId, role: Role) -> Result<Identity, AccountRepoError> {
        let mut record = self
            .accounts
            .get_mut(&user_id)
            .ok_or(AccountRepoError::NotFound)?;
        record.identity.role = role;
        Ok(record.identity.clone())
    }
}

#[async_trait::async_trait]
impl IdentityResolver for MemoryAccountStore {
    async fn resolve(&self, user_id: UserId) -> Result<Option<Identity>, ResolveError> {
        Ok(self.accounts.get(&user_id).map(|r| r.identity.clone()))
    }
}
