use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::header::SET_COOKIE;
use warp::http::{HeaderValue, StatusCode};
use warp::reply::{Reply, Response};
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<Response, Infallible> {
    let (code, message, set_cookies) = if let Some(rejection) = err.find::<ApiRejection>() {
        (
            rejection.code,
            rejection.message.clone(),
            rejection.set_cookies.clone(),
        )
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (ApiErrorCode::BadRequest, e.to_string(), Vec::new())
    } else if err.find::<reject::UnsupportedMediaType>().is_some() {
        (
            ApiErrorCode::BadRequest,
            "Expected a JSON body".to_string(),
            Vec::new(),
        )
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        let code = ApiErrorCode::MethodNotAllowed;
        (code, code.to_string(), Vec::new())
    } else if err.is_not_found() {
        let code = ApiErrorCode::NotFound;
        (code, code.to_string(), Vec::new())
    } else {
        error!(?err, "unhandled rejection");
        let code = ApiErrorCode::InternalError;
        (code, code.to_string(), Vec::new())
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code, message));
    let mut response = warp::reply::with_status(json, code.status()).into_response();
    for value in set_cookies {
        response.headers_mut().append(SET_COOKIE, value);
    }
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Access token missing")]
    MissingAccessToken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Session expired, refresh token required")]
    RefreshRequired,
    #[error("Refresh token is not valid")]
    InvalidRefreshToken,
    #[error("Session has been revoked")]
    SessionRevoked,
    #[error("User not found")]
    UserNotFound,
    #[error("Account is banned")]
    Banned,
    #[error("Access denied")]
    AccessDenied,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Username already taken")]
    UserExists,
    #[error("Invalid input")]
    InvalidInput,
    #[error("Bad request")]
    BadRequest,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Service temporarily unavailable")]
    DependencyUnavailable,
    #[error("Service timed out")]
    DependencyTimeout,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::MissingAccessToken
            | ApiErrorCode::InvalidToken
            | ApiErrorCode::RefreshRequired
            | ApiErrorCode::InvalidRefreshToken
            | ApiErrorCode::SessionRevoked
            | ApiErrorCode::UserNotFound
            | ApiErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiErrorCode::Banned | ApiErrorCode::AccessDenied => StatusCode::FORBIDDEN,
            ApiErrorCode::UserExists => StatusCode::CONFLICT,
            ApiErrorCode::InvalidInput | ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::DependencyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::DependencyTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A failed request together with whatever cookie instruction was pending
/// when it failed, so cleared or rotated cookies still reach the client.
#[derive(Debug)]
pub struct ApiRejection {
    pub code: ApiErrorCode,
    pub message: String,
    pub set_cookies: Vec<HeaderValue>,
}

impl ApiRejection {
    pub fn new(error: AuthError, set_cookies: Vec<HeaderValue>) -> Self {
        let (code, message) = match error {
            AuthError::MissingAccessToken => (ApiErrorCode::MissingAccessToken, None),
            AuthError::InvalidToken => (ApiErrorCode::InvalidToken, None),
            AuthError::RefreshRequired => (ApiErrorCode::RefreshRequired, None),
            AuthError::InvalidRefreshToken => (ApiErrorCode::InvalidRefreshToken, None),
            AuthError::SessionRevoked => (ApiErrorCode::SessionRevoked, None),
            AuthError::UserNotFound => (ApiErrorCode::UserNotFound, None),
            AuthError::Banned { reason } => (
                ApiErrorCode::Banned,
                reason.map(|r| format!("Account is banned: {}", r)),
            ),
            AuthError::AccessDenied => (ApiErrorCode::AccessDenied, None),
            AuthError::InvalidCredentials => (ApiErrorCode::InvalidCredentials, None),
            AuthError::UserExists => (ApiErrorCode::UserExists, None),
            AuthError::InvalidInput(detail) => (ApiErrorCode::InvalidInput, Some(detail)),
            AuthError::DependencyUnavailable(e) => {
                warn!(error = %e, "dependency unavailable");
                (ApiErrorCode::DependencyUnavailable, None)
            }
            AuthError::DependencyTimeout(dependency) => {
                warn!(dependency, "dependency timed out");
                (ApiErrorCode::DependencyTimeout, None)
            }
            AuthError::InternalError(e) => {
                error!(error = %e, "internal error");
                (ApiErrorCode::InternalError, None)
            }
        };
        ApiRejection {
            code,
            message: message.unwrap_or_else(|| code.to_string()),
            set_cookies,
        }
    }
}

impl reject::Reject for ApiRejection {}
