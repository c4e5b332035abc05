use crate::api::v1::CookiePolicy;
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{SeedAdmin, Settings};
use anyhow::anyhow;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub user_service: Arc<dyn UserService>,
    pub cookie_policy: Arc<CookiePolicy>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        Self::with_clock(settings, Arc::new(SystemClock)).await
    }

    /// Wires every collaborator from settings, reading time from `clock`.
    pub async fn with_clock(settings: &Settings, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        settings.validate()?;
        let io_timeout = settings.auth.dependency_timeout();
        let cancel = CancellationToken::new();

        let mut sweeper_handle = None;
        let session_store: Arc<dyn SessionStore> = match settings.session.backend.as_str() {
            "memory" => {
                let store = Arc::new(MemorySessionStore::new(clock.clone()));
                sweeper_handle = Some(store.spawn_sweeper(
                    std::time::Duration::from_secs(settings.session.sweep_interval_secs),
                    cancel.clone(),
                ));
                store
            }
            "redis" => {
                let dsn = settings
                    .session
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("session.redis_dsn is required"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisSessionStore::new(
                    redis_manager,
                    settings.session.key_prefix.clone(),
                ))
            }
            other => return Err(anyhow!("Unknown session backend: {}", other)),
        };

        let accounts = match settings.accounts.backend.as_str() {
            "memory" => Arc::new(MemoryAccountStore::new(clock.clone())),
            other => return Err(anyhow!("Unknown accounts backend: {}", other)),
        };
        let account_repo: Arc<dyn AccountRepo> = accounts.clone();
        let identity_resolver: Arc<dyn IdentityResolver> = accounts;

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        if let Some(seed) = &settings.accounts.seed_admin {
            seed_admin(account_repo.as_ref(), credential_hasher.as_ref(), seed).await?;
        }

        let auth = &settings.auth;
        let token_issuer: Arc<dyn TokenIssuer> = Arc::new(JwtHs256Issuer::new(
            JwtConfig {
                issuer: auth.issuer.clone(),
                audience: auth.audience.clone(),
                access_ttl: auth.access_ttl(),
                refresh_ttl: auth.refresh_ttl(),
                access_secret: auth.access_secret.expose().as_bytes().to_vec(),
                refresh_secret: auth.refresh_secret.expose().as_bytes().to_vec(),
            },
            clock.clone(),
        ));

        let sessions = Arc::new(SessionManager::new(
            token_issuer.clone(),
            session_store,
            derive_fingerprint_key(auth.refresh_secret.expose().as_bytes())?,
            clock.clone(),
            io_timeout,
        ));
        let gate = Arc::new(AuthGate::new(
            token_issuer.clone(),
            sessions.clone(),
            identity_resolver,
            io_timeout,
        ));

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            account_repo.clone(),
            credential_hasher,
            token_issuer,
            sessions,
            gate,
            clock,
            auth.refresh_ttl(),
            io_timeout,
        ));
        let user_service: Arc<dyn UserService> =
            Arc::new(RealUserService::new(account_repo, io_timeout));

        let cookie_policy = Arc::new(CookiePolicy::from_settings(
            &settings.cookie,
            auth.refresh_ttl_secs,
        )?);

        info!(
            session_backend = %settings.session.backend,
            accounts_backend = %settings.accounts.backend,
            "server started"
        );

        Ok(Self {
            auth_service,
            user_service,
            cookie_policy,
            sweeper_handle: Mutex::new(sweeper_handle),
            cancel,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = match self.sweeper_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let r = handle.await;
            info!("session sweeper stopped: {:?}", r);
        }
    }
}

async fn seed_admin(
    account_repo: &dyn AccountRepo,
    credential_hasher: &dyn CredentialHasher,
    seed: &SeedAdmin,
) -> anyhow::Result<()> {
    let password_hash = credential_hasher
        .hash_password(seed.password.expose())
        .await?;
    let created = account_repo
        .create(NewAccount {
            username: seed.username.clone(),
            email: seed.email.clone(),
            password_hash,
            role: Role::Admin,
        })
        .await;
    match created {
        Ok(record) => {
            info!(user_id = %record.identity.user_id, username = %seed.username, "admin account seeded");
            Ok(())
        }
        Err(AccountRepoError::UsernameTaken) => {
            info!(username = %seed.username, "admin account already present");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
