use super::cookies::{CookiePolicy, ResponseCookies};
use super::error::*;
use super::handler;
use crate::application_port::*;
use crate::domain_model::*;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, Rejection, http, reject};

/// Path filters come before method filters so an unknown path is a 404
/// rather than a 405 from some other route's method check.
pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let policy = server.cookie_policy.clone();
    let auth_service = server.auth_service.clone();

    let register = warp::path("register")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_transport(policy.clone()))
        .and(with(auth_service.clone()))
        .and_then(handler::register);

    let login = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_transport(policy.clone()))
        .and(with(auth_service.clone()))
        .and_then(handler::login);

    let refresh = warp::path("refresh")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_presented(policy.clone()))
        .and(with_transport(policy.clone()))
        .and(with(auth_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::path("logout")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_presented(policy.clone()))
        .and(with_transport(policy.clone()))
        .and(with(auth_service.clone()))
        .and_then(handler::logout);

    let me = warp::path("me")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_identity(auth_service.clone(), policy.clone()))
        .and_then(handler::me);

    let session = warp::path("session")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_session(auth_service.clone(), policy.clone(), GateMode::Optional))
        .and_then(handler::session_status);

    let profile = warp::path!("users" / UserId)
        .and(warp::get())
        .and(with_identity(auth_service.clone(), policy.clone()))
        .and(with(server.user_service.clone()))
        .and_then(handler::profile);

    let ban = warp::path!("admin" / "users" / UserId / "ban")
        .and(warp::put())
        .and(warp::body::json())
        .and(with_role(auth_service.clone(), policy.clone(), &[Role::Admin]))
        .and(with(server.user_service.clone()))
        .and_then(handler::set_banned);

    let set_role = warp::path!("admin" / "users" / UserId / "role")
        .and(warp::put())
        .and(warp::body::json())
        .and(with_role(auth_service, policy, &[Role::Admin]))
        .and(with(server.user_service.clone()))
        .and_then(handler::set_role);

    register
        .or(login)
        .or(refresh)
        .or(logout)
        .or(me)
        .or(session)
        .or(profile)
        .or(ban)
        .or(set_role)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Tokens the client sent in its `Cookie` header.
fn with_presented(
    policy: Arc<CookiePolicy>,
) -> impl Filter<Extract = (PresentedTokens,), Error = Infallible> + Clone {
    warp::header::optional::<String>(http::header::COOKIE.as_str())
        .map(move |header: Option<String>| policy.presented(header.as_deref()))
        .or_else(|_| async { Ok::<_, Infallible>((PresentedTokens::default(),)) })
}

/// A fresh, empty cookie instruction slot for this request.
fn with_transport(
    policy: Arc<CookiePolicy>,
) -> impl Filter<Extract = (Arc<ResponseCookies>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::new(ResponseCookies::new(policy.clone())))
}

/// Runs the gate. A rejection carries any cookie instruction the gate issued.
fn with_session(
    auth_service: Arc<dyn AuthService>,
    policy: Arc<CookiePolicy>,
    mode: GateMode,
) -> impl Filter<Extract = (Arc<ResponseCookies>, GateOutcome), Error = Rejection> + Clone {
    with_presented(policy.clone())
        .and(with_transport(policy))
        .and_then(move |presented: PresentedTokens, cookies: Arc<ResponseCookies>| {
            let auth_service = auth_service.clone();
            async move {
                match auth_service
                    .authenticate(presented, mode, cookies.as_ref())
                    .await
                {
                    Ok(outcome) => Ok((cookies, outcome)),
                    Err(e) => Err(reject::custom(ApiRejection::new(e, cookies.take_headers()))),
                }
            }
        })
        .untuple_one()
}

fn with_identity(
    auth_service: Arc<dyn AuthService>,
    policy: Arc<CookiePolicy>,
) -> impl Filter<Extract = (Arc<ResponseCookies>, Identity), Error = Rejection> + Clone {
    with_session(auth_service, policy, GateMode::Required)
        .and_then(
            |cookies: Arc<ResponseCookies>, outcome: GateOutcome| async move {
                match outcome {
                    GateOutcome::Authenticated(identity) => Ok((cookies, identity)),
                    GateOutcome::Anonymous => Err(reject::custom(ApiRejection::new(
                        AuthError::MissingAccessToken,
                        cookies.take_headers(),
                    ))),
                }
            },
        )
        .untuple_one()
}

fn with_role(
    auth_service: Arc<dyn AuthService>,
    policy: Arc<CookiePolicy>,
    allowed: &'static [Role],
) -> impl Filter<Extract = (Arc<ResponseCookies>, Identity), Error = Rejection> + Clone {
    with_identity(auth_service, policy)
        .and_then(
            move |cookies: Arc<ResponseCookies>, identity: Identity| async move {
                match authorize(&identity, allowed) {
                    Ok(()) => Ok((cookies, identity)),
                    // A rotation done by the gate must still reach the client.
                    Err(e) => Err(reject::custom(ApiRejection::new(e, cookies.take_headers()))),
                }
            },
        )
        .untuple_one()
}
