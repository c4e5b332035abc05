use crate::domain_model::*;
use crate::domain_port::CookieTransport;
use crate::settings;
use anyhow::{Result, bail};
use std::sync::{Arc, Mutex};
use warp::http::HeaderValue;
use warp::http::header::SET_COOKIE;
use warp::reply::Reply;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// How the two token cookies are written.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub access_name: String,
    pub refresh_name: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub domain: Option<String>,
    /// Both cookies live as long as the refresh window, so an expired access
    /// token is still sent back and can trigger rotation.
    pub max_age_secs: u64,
}

impl CookiePolicy {
    pub fn from_settings(cookie: &settings::Cookie, max_age_secs: u64) -> Result<Self> {
        let same_site = match cookie.same_site.to_ascii_lowercase().as_str() {
            "strict" => SameSite::Strict,
            "lax" => SameSite::Lax,
            "none" => SameSite::None,
            other => bail!("unknown cookie.same_site: {}", other),
        };
        if same_site == SameSite::None && !cookie.secure {
            bail!("SameSite=None cookies must be Secure");
        }
        Ok(Self {
            access_name: cookie.access_name.clone(),
            refresh_name: cookie.refresh_name.clone(),
            secure: cookie.secure,
            same_site,
            path: cookie.path.clone(),
            domain: cookie.domain.clone(),
            max_age_secs,
        })
    }

    fn build(&self, name: &str, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite={}",
            name,
            value,
            self.path,
            max_age,
            self.same_site.as_str()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        if let Some(domain) = &self.domain {
            cookie.push_str(&format!("; Domain={}", domain));
        }
        cookie
    }

    /// Reads both token cookies out of a `Cookie` request header.
    pub fn presented(&self, cookie_header: Option<&str>) -> PresentedTokens {
        let Some(header) = cookie_header else {
            return PresentedTokens::default();
        };
        let find = |name: &str| {
            header.split(';').find_map(|part| {
                let (key, value) = part.trim().split_once('=')?;
                (key.trim() == name).then(|| value.trim().to_string())
            })
        };
        PresentedTokens::new(find(&self.access_name), find(&self.refresh_name))
    }
}

#[derive(Debug, Clone)]
enum CookieInstruction {
    Persist { access: String, refresh: String },
    Clear,
}

/// Per-request `CookieTransport`. Holds at most one pending instruction; a
/// later one replaces an earlier one, so both cookies always move together.
pub struct ResponseCookies {
    policy: Arc<CookiePolicy>,
    pending: Mutex<Option<CookieInstruction>>,
}

impl ResponseCookies {
    pub fn new(policy: Arc<CookiePolicy>) -> Self {
        Self {
            policy,
            pending: Mutex::new(None),
        }
    }

    fn set(&self, instruction: CookieInstruction) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(instruction);
        }
    }

    /// Renders and drains the pending instruction as `Set-Cookie` values.
    pub fn take_headers(&self) -> Vec<HeaderValue> {
        let instruction = match self.pending.lock() {
            Ok(mut pending) => pending.take(),
            Err(_) => None,
        };
        let p = &self.policy;
        let cookies = match instruction {
            Some(CookieInstruction::Persist { access, refresh }) => vec![
                p.build(&p.access_name, &access, p.max_age_secs),
                p.build(&p.refresh_name, &refresh, p.max_age_secs),
            ],
            Some(CookieInstruction::Clear) => vec![
                p.build(&p.access_name, "", 0),
                p.build(&p.refresh_name, "", 0),
            ],
            None => Vec::new(),
        };
        cookies
            .into_iter()
            .filter_map(|c| match HeaderValue::from_str(&c) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(error = %e, "unencodable Set-Cookie value dropped");
                    None
                }
            })
            .collect()
    }

    pub fn apply(&self, reply: impl Reply) -> warp::reply::Response {
        let mut response = reply.into_response();
        for value in self.take_headers() {
            response.headers_mut().append(SET_COOKIE, value);
        }
        response
    }
}

impl CookieTransport for ResponseCookies {
    fn persist(&self, tokens: &TokenPair) {
        self.set(CookieInstruction::Persist {
            access: tokens.access_token.0.clone(),
            refresh: tokens.refresh_token.0.clone(),
        });
    }

    fn clear(&self) {
        self.set(CookieInstruction::Clear);
    }
}
