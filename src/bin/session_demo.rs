/// Walks through the session lifecycle against in-memory backends and a
/// manual clock: register, transparent rotation on access expiry, reuse
/// detection, logout, bans, role checks and two tabs racing a refresh.
///
/// Run with `cargo run --bin session_demo`.
use chrono::Utc;
use futures_util::future::join_all;
use palimpsest::application_impl::*;
use palimpsest::application_port::*;
use palimpsest::domain_model::*;
use palimpsest::domain_port::*;
use palimpsest::infra_memory::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
const REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Stands in for a browser's cookie jar.
#[derive(Default)]
struct Jar {
    tokens: Mutex<Option<TokenPair>>,
}

impl Jar {
    fn presented(&self) -> PresentedTokens {
        match self.tokens.lock().ok().and_then(|t| t.clone()) {
            Some(pair) => PresentedTokens {
                access_token: Some(pair.access_token),
                refresh_token: Some(pair.refresh_token),
            },
            None => PresentedTokens::default(),
        }
    }

    fn refresh_token(&self) -> Option<RefreshToken> {
        self.presented().refresh_token
    }

    fn holds_tokens(&self) -> bool {
        self.presented().access_token.is_some()
    }
}

impl CookieTransport for Jar {
    fn persist(&self, tokens: &TokenPair) {
        if let Ok(mut slot) = self.tokens.lock() {
            *slot = Some(tokens.clone());
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.tokens.lock() {
            *slot = None;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::new("session_demo=info,palimpsest=info");

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    // region wiring
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let accounts = Arc::new(MemoryAccountStore::new(clock.clone()));
    let session_store = Arc::new(MemorySessionStore::new(clock.clone()));
    let token_issuer: Arc<dyn TokenIssuer> = Arc::new(JwtHs256Issuer::new(
        JwtConfig {
            issuer: "palimpsest.demo".to_string(),
            audience: "palimpsest-web".to_string(),
            access_ttl: ACCESS_TTL,
            refresh_ttl: REFRESH_TTL,
            access_secret: b"demo-access-secret".to_vec(),
            refresh_secret: b"demo-refresh-secret".to_vec(),
        },
        clock.clone(),
    ));
    let io_timeout = Duration::from_secs(2);
    let sessions = Arc::new(SessionManager::new(
        token_issuer.clone(),
        session_store.clone(),
        derive_fingerprint_key(b"demo-refresh-secret")?,
        clock.clone(),
        io_timeout,
    ));
    let gate = Arc::new(AuthGate::new(
        token_issuer.clone(),
        sessions.clone(),
        accounts.clone(),
        io_timeout,
    ));
    let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
        accounts.clone(),
        Arc::new(Argon2PasswordHasher),
        token_issuer,
        sessions,
        gate,
        clock.clone(),
        REFRESH_TTL,
        io_timeout,
    ));
    let user_service: Arc<dyn UserService> =
        Arc::new(RealUserService::new(accounts.clone(), io_timeout));
    // endregion

    // region register, refresh, reuse
    let browser = Jar::default();
    let identity = auth_service
        .register(
            SignupInput {
                username: "ursula".to_string(),
                email: "ursula@example.com".to_string(),
                password: "correct horse battery".to_string(),
            },
            &browser,
        )
        .await?;
    info!(user_id = %identity.user_id, role = %identity.role, "registered, holding (A1, R1)");
    let r1 = browser.refresh_token();

    auth_service.refresh(browser.refresh_token(), &browser).await?;
    info!("explicit refresh, holding (A2, R2); store now matches R2 only");

    let attacker = Jar::default();
    let reused = auth_service.refresh(r1.clone(), &attacker).await;
    info!(result = ?reused.err(), "R1 presented again");
    // endregion

    // region transparent rotation
    clock.advance(ACCESS_TTL);
    let before = browser.presented().access_token;
    let outcome = auth_service
        .authenticate(browser.presented(), GateMode::Required, &browser)
        .await?;
    info!(
        authenticated = outcome.identity().is_some(),
        rotated = before != browser.presented().access_token,
        "request with an expired access token"
    );
    let again = auth_service
        .authenticate(browser.presented(), GateMode::Required, &browser)
        .await?;
    info!(
        authenticated = again.identity().is_some(),
        "new access token works without a further rotation"
    );
    // endregion

    // region role check and ban
    let denied = match outcome.identity() {
        Some(reader) => authorize(reader, &[Role::Author, Role::Admin]).err(),
        None => None,
    };
    info!(result = ?denied, "reader calls an author-only operation");

    user_service
        .set_banned(identity.user_id, true, Some("spam".to_string()))
        .await?;
    let banned = auth_service
        .authenticate(browser.presented(), GateMode::Required, &browser)
        .await;
    info!(result = ?banned.err(), "valid access token of a banned user");
    user_service.set_banned(identity.user_id, false, None).await?;
    // endregion

    // region concurrent tabs
    let tab_a = Jar::default();
    let tab_b = Jar::default();
    let shared = browser.refresh_token();
    let results = join_all([
        auth_service.refresh(shared.clone(), &tab_a),
        auth_service.refresh(shared.clone(), &tab_b),
    ])
    .await;
    info!(
        succeeded = results.iter().filter(|r| r.is_ok()).count(),
        "two tabs refreshed the same token at once"
    );
    let mut survivors = 0;
    for tab in [&tab_a, &tab_b] {
        if tab.holds_tokens() && auth_service.refresh(tab.refresh_token(), tab).await.is_ok() {
            survivors += 1;
        }
    }
    info!(survivors, "tabs still able to refresh afterwards (last writer wins)");
    // endregion

    // region logout
    let live = if tab_a.holds_tokens() { &tab_a } else { &tab_b };
    let before_logout = live.refresh_token();
    auth_service.logout(live.presented(), live).await;
    let after = auth_service.refresh(before_logout, &Jar::default()).await;
    info!(
        cleared = !live.holds_tokens(),
        result = ?after.err(),
        "logged out, then presented the old refresh token"
    );
    // endregion

    info!(sessions_left = session_store.len(), "done");
    Ok(())
}
