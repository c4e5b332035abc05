use super::deadline::bounded;
use super::{AuthGate, SessionManager};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct RealAuthService {
    account_repo: Arc<dyn AccountRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_issuer: Arc<dyn TokenIssuer>,
    sessions: Arc<SessionManager>,
    gate: Arc<AuthGate>,
    clock: Arc<dyn Clock>,
    refresh_window: Duration,
    io_timeout: Duration,
    min_username_len: usize,
    max_username_len: usize,
    min_password_len: usize,
}

impl RealAuthService {
    pub fn new(
        account_repo: Arc<dyn AccountRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_issuer: Arc<dyn TokenIssuer>,
        sessions: Arc<SessionManager>,
        gate: Arc<AuthGate>,
        clock: Arc<dyn Clock>,
        refresh_window: Duration,
        io_timeout: Duration,
    ) -> Self {
        Self {
            account_repo,
            credential_hasher,
            token_issuer,
            sessions,
            gate,
            clock,
            refresh_window,
            io_timeout,
            min_username_len: 3,
            max_username_len: 32,
            min_password_len: 8,
        }
    }

    fn validate_signup(&self, request: &SignupInput) -> Result<(), AuthError> {
        let username = request.username.as_str();
        if username.len() < self.min_username_len || username.len() > self.max_username_len {
            return Err(AuthError::InvalidInput(format!(
                "username must be {}-{} characters",
                self.min_username_len, self.max_username_len
            )));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AuthError::InvalidInput(
                "username may only contain letters, digits and underscores".to_string(),
            ));
        }
        match request.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(AuthError::InvalidInput("email is not valid".to_string())),
        }
        if request.password.len() < self.min_password_len {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {} characters",
                self.min_password_len
            )));
        }
        Ok(())
    }

    /// Subject named by an authentic token. An expired token still counts
    /// while a refresh token issued alongside it could be live. Access token
    /// first, then refresh token.
    fn subject_of(&self, presented: &PresentedTokens) -> Option<UserId> {
        let authentic = |result: Result<UserId, TokenError>| match result {
            Ok(user_id) => Some(user_id),
            Err(TokenError::Expired { user_id, issued_at }) => {
                let lapsed = chrono::Duration::from_std(self.refresh_window)
                    .ok()
                    .and_then(|window| issued_at.checked_add_signed(window))
                    .is_none_or(|until| self.clock.now() >= until);
                (!lapsed).then_some(user_id)
            }
            Err(_) => None,
        };

        presented
            .access_token
            .as_ref()
            .and_then(|t| authentic(self.token_issuer.verify_access(t)))
            .or_else(|| {
                presented
                    .refresh_token
                    .as_ref()
                    .and_then(|t| authentic(self.token_issuer.verify_refresh(t)))
            })
    }

    async fn start_session(
        &self,
        identity: &Identity,
        transport: &dyn CookieTransport,
    ) -> Result<(), AuthError> {
        let tokens = self.sessions.open(identity.user_id).await?;
        transport.persist(&tokens);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(
        &self,
        request: SignupInput,
        transport: &dyn CookieTransport,
    ) -> Result<Identity, AuthError> {
        self.validate_signup(&request)?;

        let password_hash = self
            .credential_hasher
            .hash_password(&request.password)
            .await?;
        let record = bounded(
            "account_repo",
            self.io_timeout,
            self.account_repo.create(NewAccount {
                username: request.username,
                email: request.email,
                password_hash,
                role: Role::Reader,
            }),
        )
        .await?;

        let user_id = record.identity.user_id;
        if let Err(e) = self.start_session(&record.identity, transport).await {
            // The account stays; the client recovers by logging in.
            warn!(%user_id, error = %e, "account registered without a session");
            return Err(e);
        }
        info!(%user_id, "account registered");
        Ok(record.identity)
    }

    async fn login(
        &self,
        request: LoginInput,
        transport: &dyn CookieTransport,
    ) -> Result<Identity, AuthError> {
        let LoginInput { username, password } = request;

        let rec = bounded(
            "account_repo",
            self.io_timeout,
            self.account_repo.find_by_username(&username),
        )
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

        let ok = self
            .credential_hasher
            .verify_password(&password, &rec.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        if rec.identity.is_banned {
            return Err(AuthError::Banned {
                reason: rec.identity.ban_reason,
            });
        }

        self.start_session(&rec.identity, transport).await?;
        info!(user_id = %rec.identity.user_id, "logged in");
        Ok(rec.identity)
    }

    async fn refresh(
        &self,
        refresh_token: Option<RefreshToken>,
        transport: &dyn CookieTransport,
    ) -> Result<Identity, AuthError> {
        let presented = PresentedTokens {
            access_token: None,
            refresh_token,
        };
        let result = self.gate.refresh(&presented, transport).await;
        if let Err(e) = &result {
            if !e.is_dependency_failure() {
                transport.clear();
            }
        }
        result
    }

    async fn logout(&self, presented: PresentedTokens, transport: &dyn CookieTransport) {
        if let Some(user_id) = self.subject_of(&presented) {
            match self.sessions.close(user_id).await {
                Ok(()) => info!(%user_id, "logged out"),
                Err(e) => warn!(%user_id, error = %e, "session record not removed on logout"),
            }
        }
        transport.clear();
    }

    async fn authenticate(
        &self,
        presented: PresentedTokens,
        mode: GateMode,
        transport: &dyn CookieTransport,
    ) -> Result<GateOutcome, AuthError> {
        self.gate.authenticate(&presented, mode, transport).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::Argon2PasswordHasher;
    use crate::application_impl::session_manager::tests::{
        ACCESS_TTL, DownStore, Fixture, REFRESH_TTL, fixture, sessions_over,
    };
    use crate::infra_memory::MemoryAccountStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct LastInstruction {
        last: Mutex<Option<Option<TokenPair>>>,
    }

    impl LastInstruction {
        fn persisted(&self) -> TokenPair {
            match self.last.lock().unwrap().clone() {
                Some(Some(tokens)) => tokens,
                other => panic!("expected persisted tokens, got {other:?}"),
            }
        }

        fn cleared(&self) -> bool {
            matches!(*self.last.lock().unwrap(), Some(None))
        }
    }

    impl CookieTransport for LastInstruction {
        fn persist(&self, tokens: &TokenPair) {
            *self.last.lock().unwrap() = Some(Some(tokens.clone()));
        }

        fn clear(&self) {
            *self.last.lock().unwrap() = Some(None);
        }
    }

    fn service() -> (RealAuthService, Fixture, Arc<MemoryAccountStore>) {
        let f = fixture();
        let sessions = f.sessions.clone();
        service_with(f, sessions)
    }

    /// A service whose session store is unreachable.
    fn service_without_store() -> (RealAuthService, Fixture, Arc<MemoryAccountStore>) {
        let f = fixture();
        let sessions = sessions_over(&f, Arc::new(DownStore), Duration::from_millis(200));
        service_with(f, sessions)
    }

    fn service_with(
        f: Fixture,
        sessions: Arc<SessionManager>,
    ) -> (RealAuthService, Fixture, Arc<MemoryAccountStore>) {
        let accounts = Arc::new(MemoryAccountStore::new(f.clock.clone()));
        let gate = Arc::new(AuthGate::new(
            f.issuer.clone(),
            sessions.clone(),
            accounts.clone(),
            Duration::from_millis(200),
        ));
        let service = RealAuthService::new(
            accounts.clone(),
            Arc::new(Argon2PasswordHasher),
            f.issuer.clone(),
            sessions,
            gate,
            f.clock.clone(),
            REFRESH_TTL,
            Duration::from_millis(200),
        );
        (service, f, accounts)
    }

    fn signup(username: &str) -> SignupInput {
        SignupInput {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "hunter2hunter2".to_string(),
        }
    }

    fn login(username: &str) -> LoginInput {
        LoginInput {
            username: username.to_string(),
            password: "hunter2hunter2".to_string(),
        }
    }

    #[tokio::test]
    async fn register_opens_a_session() {
        let (service, f, _) = service();
        let transport = LastInstruction::default();

        let identity = service.register(signup("alice"), &transport).await.unwrap();
        assert_eq!(identity.role, Role::Reader);

        let tokens = transport.persisted();
        assert_eq!(
            f.issuer.verify_access(&tokens.access_token).unwrap(),
            identity.user_id
        );
    }

    #[tokio::test]
    async fn register_validates_input() {
        let (service, _, _) = service();
        let transport = LastInstruction::default();

        for bad in [
            SignupInput { username: "ab".into(), ..signup("x") },
            SignupInput { username: "no spaces".into(), ..signup("x") },
            SignupInput { email: "nobody".into(), ..signup("valid_name") },
            SignupInput { password: "short".into(), ..signup("valid_name") },
        ] {
            assert!(matches!(
                service.register(bad, &transport).await,
                Err(AuthError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let (service, _, _) = service();
        let transport = LastInstruction::default();
        service.register(signup("bob"), &transport).await.unwrap();

        assert!(matches!(
            service.register(signup("bob"), &transport).await,
            Err(AuthError::UserExists)
        ));
    }

    #[tokio::test]
    async fn login_with_wrong_password_or_unknown_user() {
        let (service, _, _) = service();
        let transport = LastInstruction::default();
        service.register(signup("carol"), &transport).await.unwrap();

        let wrong = LoginInput {
            password: "not-the-password".into(),
            ..login("carol")
        };
        assert!(matches!(
            service.login(wrong, &transport).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login(login("nobody"), &transport).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn banned_account_cannot_log_in() {
        let (service, _, accounts) = service();
        let transport = LastInstruction::default();
        let identity = service.register(signup("dave"), &transport).await.unwrap();
        accounts
            .set_banned(identity.user_id, true, None)
            .await
            .unwrap();

        let fresh = LastInstruction::default();
        assert!(matches!(
            service.login(login("dave"), &fresh).await,
            Err(AuthError::Banned { reason: None })
        ));
        assert!(fresh.last.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_then_reuse_of_first_token_is_revoked() {
        let (service, _, _) = service();
        let t1 = LastInstruction::default();
        service.register(signup("erin"), &t1).await.unwrap();
        let first = t1.persisted();

        let t2 = LastInstruction::default();
        service
            .refresh(Some(first.refresh_token.clone()), &t2)
            .await
            .unwrap();
        let second = t2.persisted();
        assert_ne!(first.refresh_token, second.refresh_token);

        let t3 = LastInstruction::default();
        assert!(matches!(
            service.refresh(Some(first.refresh_token.clone()), &t3).await,
            Err(AuthError::SessionRevoked)
        ));
        assert!(t3.cleared());
    }

    #[tokio::test]
    async fn refresh_without_token_clears() {
        let (service, _, _) = service();
        let transport = LastInstruction::default();
        assert!(matches!(
            service.refresh(None, &transport).await,
            Err(AuthError::RefreshRequired)
        ));
        assert!(transport.cleared());
    }

    #[tokio::test]
    async fn refresh_of_banned_user_clears() {
        let (service, _, accounts) = service();
        let t1 = LastInstruction::default();
        let identity = service.register(signup("frank"), &t1).await.unwrap();
        accounts
            .set_banned(identity.user_id, true, Some("abuse".into()))
            .await
            .unwrap();

        let t2 = LastInstruction::default();
        assert!(matches!(
            service.refresh(Some(t1.persisted().refresh_token), &t2).await,
            Err(AuthError::Banned { .. })
        ));
        assert!(t2.cleared());
    }

    #[tokio::test]
    async fn logout_revokes_and_clears() {
        let (service, _, _) = service();
        let t1 = LastInstruction::default();
        service.register(signup("grace"), &t1).await.unwrap();
        let pair = t1.persisted();

        let t2 = LastInstruction::default();
        service
            .logout(
                PresentedTokens {
                    access_token: Some(pair.access_token.clone()),
                    refresh_token: Some(pair.refresh_token.clone()),
                },
                &t2,
            )
            .await;
        assert!(t2.cleared());

        let t3 = LastInstruction::default();
        assert!(matches!(
            service.refresh(Some(pair.refresh_token), &t3).await,
            Err(AuthError::SessionRevoked)
        ));
    }

    #[tokio::test]
    async fn logout_with_expired_access_token_still_revokes() {
        let (service, f, _) = service();
        let t1 = LastInstruction::default();
        service.register(signup("heidi"), &t1).await.unwrap();
        let pair = t1.persisted();
        f.clock.advance(ACCESS_TTL);

        let t2 = LastInstruction::default();
        service
            .logout(
                PresentedTokens {
                    access_token: Some(pair.access_token.clone()),
                    refresh_token: None,
                },
                &t2,
            )
            .await;
        assert!(t2.cleared());

        let t3 = LastInstruction::default();
        assert!(matches!(
            service.refresh(Some(pair.refresh_token), &t3).await,
            Err(AuthError::SessionRevoked)
        ));
    }

    #[tokio::test]
    async fn logout_with_garbage_still_clears() {
        let (service, _, _) = service();
        let transport = LastInstruction::default();
        service
            .logout(
                PresentedTokens::new(Some("junk".into()), Some("junk".into())),
                &transport,
            )
            .await;
        assert!(transport.cleared());
    }

    #[tokio::test]
    async fn logout_ignores_an_access_token_past_the_refresh_window() {
        let (service, f, _) = service();
        let t1 = LastInstruction::default();
        service.register(signup("ivan"), &t1).await.unwrap();
        let leaked = t1.persisted();

        f.clock.advance(REFRESH_TTL);
        let t2 = LastInstruction::default();
        service.login(login("ivan"), &t2).await.unwrap();
        let live = t2.persisted();

        let t3 = LastInstruction::default();
        service
            .logout(
                PresentedTokens {
                    access_token: Some(leaked.access_token.clone()),
                    refresh_token: None,
                },
                &t3,
            )
            .await;
        assert!(t3.cleared());

        // The session opened after the stale token lapsed is untouched.
        let t4 = LastInstruction::default();
        service
            .refresh(Some(live.refresh_token), &t4)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn explicit_refresh_during_store_outage_keeps_cookies() {
        let (service, f, accounts) = service_without_store();
        let identity = accounts
            .create(NewAccount {
                username: "judy".to_string(),
                email: "judy@example.com".to_string(),
                password_hash: "unused".to_string(),
                role: Role::Reader,
            })
            .await
            .unwrap()
            .identity;
        let pair = f.issuer.issue(identity.user_id).unwrap();

        let transport = LastInstruction::default();
        assert!(matches!(
            service.refresh(Some(pair.refresh_token), &transport).await,
            Err(AuthError::DependencyUnavailable(_))
        ));
        assert!(transport.last.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_during_store_outage_still_clears() {
        let (service, f, _) = service_without_store();
        let pair = f.issuer.issue(UserId::new_random()).unwrap();

        let transport = LastInstruction::default();
        service
            .logout(
                PresentedTokens {
                    access_token: Some(pair.access_token),
                    refresh_token: Some(pair.refresh_token),
                },
                &transport,
            )
            .await;
        assert!(transport.cleared());
    }

    #[tokio::test]
    async fn register_without_a_session_keeps_the_account() {
        let (service, _, accounts) = service_without_store();
        let transport = LastInstruction::default();

        assert!(matches!(
            service.register(signup("kate"), &transport).await,
            Err(AuthError::DependencyUnavailable(_))
        ));
        assert!(transport.last.lock().unwrap().is_none());
        assert!(accounts.find_by_username("kate").await.unwrap().is_some());

        // Retrying is a conflict; logging in is the way back.
        assert!(matches!(
            service.register(signup("kate"), &transport).await,
            Err(AuthError::UserExists)
        ));
    }
}
