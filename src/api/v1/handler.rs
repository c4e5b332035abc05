use super::cookies::ResponseCookies;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::reply::Response;
use warp::{Rejection, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Renders a service result, attaching whatever cookie instruction the
/// service left behind on both the success and the failure path.
fn respond<T: Serialize>(
    cookies: &ResponseCookies,
    result: Result<T, AuthError>,
) -> Result<Response, Rejection> {
    match result {
        Ok(data) => Ok(cookies.apply(warp::reply::json(&ApiResponse::ok(data)))),
        Err(e) => Err(reject::custom(ApiRejection::new(e, cookies.take_headers()))),
    }
}

/// Like `respond`, for operations addressing another account by id: a
/// missing target is a 404, not an authentication failure.
fn respond_about_target<T: Serialize>(
    cookies: &ResponseCookies,
    result: Result<T, AuthError>,
) -> Result<Response, Rejection> {
    match result {
        Err(AuthError::UserNotFound) => Err(reject::custom(ApiRejection {
            code: ApiErrorCode::NotFound,
            message: "User not found".to_string(),
            set_cookies: cookies.take_headers(),
        })),
        other => respond(cookies, other),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    body: RegisterRequest,
    cookies: Arc<ResponseCookies>,
    auth_service: Arc<dyn AuthService>,
) -> Result<Response, Rejection> {
    let input = SignupInput {
        username: body.username,
        email: body.email,
        password: body.password,
    };
    let result = auth_service.register(input, cookies.as_ref()).await;
    respond(&cookies, result)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    body: LoginRequest,
    cookies: Arc<ResponseCookies>,
    auth_service: Arc<dyn AuthService>,
) -> Result<Response, Rejection> {
    let input = LoginInput {
        username: body.username,
        password: body.password,
    };
    let result = auth_service.login(input, cookies.as_ref()).await;
    respond(&cookies, result)
}

pub async fn refresh(
    presented: PresentedTokens,
    cookies: Arc<ResponseCookies>,
    auth_service: Arc<dyn AuthService>,
) -> Result<Response, Rejection> {
    let result = auth_service
        .refresh(presented.refresh_token, cookies.as_ref())
        .await;
    respond(&cookies, result)
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

pub async fn logout(
    presented: PresentedTokens,
    cookies: Arc<ResponseCookies>,
    auth_service: Arc<dyn AuthService>,
) -> Result<Response, Rejection> {
    auth_service.logout(presented, cookies.as_ref()).await;
    respond(&cookies, Ok(LogoutResponse { logged_out: true }))
}

pub async fn me(cookies: Arc<ResponseCookies>, identity: Identity) -> Result<Response, Rejection> {
    respond(&cookies, Ok(identity))
}

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub identity: Option<Identity>,
}

pub async fn session_status(
    cookies: Arc<ResponseCookies>,
    outcome: GateOutcome,
) -> Result<Response, Rejection> {
    let status = SessionStatus {
        authenticated: outcome.identity().is_some(),
        identity: outcome.identity().cloned(),
    };
    respond(&cookies, Ok(status))
}

/// What other signed-in users may see about an account.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

pub async fn profile(
    target: UserId,
    cookies: Arc<ResponseCookies>,
    _viewer: Identity,
    user_service: Arc<dyn UserService>,
) -> Result<Response, Rejection> {
    let result = user_service
        .profile(target)
        .await
        .map(|identity| PublicProfile {
            user_id: identity.user_id,
            username: identity.username,
            role: identity.role,
            created_at: identity.created_at,
        });
    respond_about_target(&cookies, result)
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub banned: bool,
    pub reason: Option<String>,
}

pub async fn set_banned(
    target: UserId,
    body: BanRequest,
    cookies: Arc<ResponseCookies>,
    admin: Identity,
    user_service: Arc<dyn UserService>,
) -> Result<Response, Rejection> {
    info!(admin = %admin.user_id, target = %target, banned = body.banned, "moderation: ban");
    let reason = if body.banned { body.reason } else { None };
    let result = user_service.set_banned(target, body.banned, reason).await;
    respond_about_target(&cookies, result)
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

pub async fn set_role(
    target: UserId,
    body: RoleRequest,
    cookies: Arc<ResponseCookies>,
    admin: Identity,
    user_service: Arc<dyn UserService>,
) -> Result<Response, Rejection> {
    info!(admin = %admin.user_id, target = %target, role = %body.role, "moderation: role");
    let result = user_service.set_role(target, body.role).await;
    respond_about_target(&cookies, result)
}
