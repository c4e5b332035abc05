use super::SessionManager;
use super::deadline::bounded;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use nanoid::nanoid;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info_span};

/// Per-request progress through the gate. `Authenticated` and `Anonymous`
/// are terminal; rejection leaves the machine as an `Err`.
#[derive(Debug)]
enum GateState {
    Unauthenticated,
    AccessValid(UserId),
    AccessExpired,
    RefreshedOnce(UserId),
    Authenticated(Identity),
    Anonymous,
}

impl GateState {
    fn name(&self) -> &'static str {
        match self {
            GateState::Unauthenticated => "unauthenticated",
            GateState::AccessValid(_) => "access_valid",
            GateState::AccessExpired => "access_expired",
            GateState::RefreshedOnce(_) => "refreshed_once",
            GateState::Authenticated(_) => "authenticated",
            GateState::Anonymous => "anonymous",
        }
    }
}

/// Request-time authority: verifies presented tokens, rotates them on access
/// expiry and resolves a fresh, ban-checked identity.
pub struct AuthGate {
    token_issuer: Arc<dyn TokenIssuer>,
    sessions: Arc<SessionManager>,
    identity_resolver: Arc<dyn IdentityResolver>,
    io_timeout: Duration,
}

impl AuthGate {
    pub fn new(
        token_issuer: Arc<dyn TokenIssuer>,
        sessions: Arc<SessionManager>,
        identity_resolver: Arc<dyn IdentityResolver>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            token_issuer,
            sessions,
            identity_resolver,
            io_timeout,
        }
    }

    pub async fn authenticate(
        &self,
        presented: &PresentedTokens,
        mode: GateMode,
        transport: &dyn CookieTransport,
    ) -> Result<GateOutcome, AuthError> {
        let span = info_span!("auth_gate", request_id = %nanoid!(10), ?mode);
        self.drive(GateState::Unauthenticated, presented, mode, transport)
            .instrument(span)
            .await
    }

    /// Explicit rotation: the machine entered as if the access token had
    /// just expired.
    pub async fn refresh(
        &self,
        presented: &PresentedTokens,
        transport: &dyn CookieTransport,
    ) -> Result<Identity, AuthError> {
        let span = info_span!("auth_refresh", request_id = %nanoid!(10));
        let outcome = self
            .drive(GateState::AccessExpired, presented, GateMode::Required, transport)
            .instrument(span)
            .await?;
        match outcome {
            GateOutcome::Authenticated(identity) => Ok(identity),
            GateOutcome::Anonymous => Err(AuthError::RefreshRequired),
        }
    }

    async fn drive(
        &self,
        start: GateState,
        presented: &PresentedTokens,
        mode: GateMode,
        transport: &dyn CookieTransport,
    ) -> Result<GateOutcome, AuthError> {
        let mut state = start;
        loop {
            debug!(state = state.name(), "gate transition");
            state = match state {
                GateState::Unauthenticated => self.check_access(presented, mode)?,
                GateState::AccessExpired => self.rotate(presented, transport).await?,
                GateState::AccessValid(user_id) | GateState::RefreshedOnce(user_id) => {
                    self.admit(user_id).await?
                }
                GateState::Authenticated(identity) => {
                    return Ok(GateOutcome::Authenticated(identity));
                }
                GateState::Anonymous => return Ok(GateOutcome::Anonymous),
            };
        }
    }

    fn check_access(
        &self,
        presented: &PresentedTokens,
        mode: GateMode,
    ) -> Result<GateState, AuthError> {
        let Some(access_token) = presented.access_token.as_ref() else {
            return match mode {
                GateMode::Optional => Ok(GateState::Anonymous),
                GateMode::Required => Err(AuthError::MissingAccessToken),
            };
        };

        // Only expiry leads to rotation.
        match self.token_issuer.verify_access(access_token) {
            Ok(user_id) => Ok(GateState::AccessValid(user_id)),
            Err(TokenError::Expired { .. }) => Ok(GateState::AccessExpired),
            Err(e) => {
                debug!(error = %e, "access token rejected");
                Err(AuthError::InvalidToken)
            }
        }
    }

    async fn rotate(
        &self,
        presented: &PresentedTokens,
        transport: &dyn CookieTransport,
    ) -> Result<GateState, AuthError> {
        let Some(refresh_token) = presented.refresh_token.as_ref() else {
            transport.clear();
            return Err(AuthError::RefreshRequired);
        };

        match self.sessions.rotate(refresh_token).await {
            Ok((user_id, tokens)) => {
                transport.persist(&tokens);
                Ok(GateState::RefreshedOnce(user_id))
            }
            Err(e) => {
                if !e.is_dependency_failure() {
                    transport.clear();
                }
                Err(e)
            }
        }
    }

    async fn admit(&self, user_id: UserId) -> Result<GateState, AuthError> {
        let identity = bounded(
            "identity_resolver",
            self.io_timeout,
            self.identity_resolver.resolve(user_id),
        )
        .await?
        .ok_or(AuthError::UserNotFound)?;

        if identity.is_banned {
            debug!(%user_id, "banned identity refused");
            return Err(AuthError::Banned {
                reason: identity.ban_reason,
            });
        }
        Ok(GateState::Authenticated(identity))
    }
}
