#![allow(dead_code)]

use chrono::Utc;
use palimpsest::api;
use palimpsest::application_impl::ManualClock;
use palimpsest::server::Server;
use palimpsest::settings::*;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use warp::http::Response;
use warp::hyper::body::Bytes;
use warp::test::RequestBuilder;

pub const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
pub const REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub const ADMIN_USERNAME: &str = "root_admin";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub fn test_settings() -> Settings {
    Settings {
        auth: Auth {
            issuer: "palimpsest.test".into(),
            audience: "palimpsest-web".into(),
            access_secret: Secret::new("test-access-secret"),
            refresh_secret: Secret::new("test-refresh-secret"),
            access_ttl_secs: ACCESS_TTL.as_secs(),
            refresh_ttl_secs: REFRESH_TTL.as_secs(),
            dependency_timeout_ms: 1000,
        },
        session: Session {
            backend: "memory".into(),
            redis_dsn: None,
            key_prefix: "palimpsest:test".into(),
            sweep_interval_secs: 60,
        },
        accounts: Accounts {
            backend: "memory".into(),
            seed_admin: Some(SeedAdmin {
                username: ADMIN_USERNAME.into(),
                email: "admin@example.com".into(),
                password: Secret::new(ADMIN_PASSWORD),
            }),
        },
        cookie: Cookie {
            access_name: "access_token".into(),
            refresh_name: "refresh_token".into(),
            secure: true,
            same_site: "lax".into(),
            path: "/".into(),
            domain: None,
        },
        http: Http {
            address: "127.0.0.1:0".into(),
            tls: None,
        },
        log: Log {
            filter: "warn".into(),
        },
    }
}

/// A running server over in-memory backends whose clock only moves on
/// request.
pub struct TestApp {
    pub clock: Arc<ManualClock>,
    pub server: Arc<Server>,
}

impl TestApp {
    pub async fn start() -> TestApp {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let server = Server::with_clock(&test_settings(), clock.clone())
            .await
            .expect("server should start");
        TestApp {
            clock,
            server: Arc::new(server),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub async fn send(&self, request: RequestBuilder) -> Response<Bytes> {
        request.reply(&api::service(self.server.clone())).await
    }
}

/// Browser-like cookie jar: remembers `Set-Cookie` values and sends them
/// back on the next request.
#[derive(Debug, Default, Clone)]
pub struct Browser {
    pub cookies: HashMap<String, String>,
}

impl Browser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn holds_session(&self) -> bool {
        self.cookie("access_token").is_some() && self.cookie("refresh_token").is_some()
    }

    pub async fn call(
        &mut self,
        app: &TestApp,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> (u16, Value) {
        let mut request = warp::test::request().method(method).path(path);
        if !self.cookies.is_empty() {
            let header = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header("cookie", header);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = app.send(request).await;
        self.absorb(&response);
        let status = response.status().as_u16();
        let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
        (status, body)
    }

    pub fn absorb(&mut self, response: &Response<Bytes>) {
        for value in response.headers().get_all("set-cookie") {
            let value = value.to_str().expect("set-cookie is ascii");
            let (pair, attributes) = value.split_once(';').unwrap_or((value, ""));
            let (name, cookie_value) = pair.split_once('=').expect("cookie has a name");
            if cookie_value.is_empty() || attributes.contains("Max-Age=0") {
                self.cookies.remove(name);
            } else {
                self.cookies
                    .insert(name.to_string(), cookie_value.to_string());
            }
        }
    }

    pub async fn register(&mut self, app: &TestApp, username: &str) -> Value {
        let (status, body) = self
            .call(
                app,
                "POST",
                "/api/v1/register",
                Some(json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "a-long-password",
                })),
            )
            .await;
        assert_eq!(status, 200, "register failed: {}", body);
        body["data"].clone()
    }

    pub async fn login(&mut self, app: &TestApp, username: &str, password: &str) -> (u16, Value) {
        self.call(
            app,
            "POST",
            "/api/v1/login",
            Some(json!({ "username": username, "password": password })),
        )
        .await
    }

    pub async fn login_admin(app: &TestApp) -> Browser {
        let mut admin = Browser::new();
        let (status, body) = admin.login(app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
        assert_eq!(status, 200, "admin login failed: {}", body);
        admin
    }
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or("")
}
