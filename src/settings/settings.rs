use anyhow::{Result, anyhow, bail};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub session: Session,
    pub accounts: Accounts,
    pub cookie: Cookie,
    pub http: Http,
    pub log: Log,
}

/// A configured secret. Never printed.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    pub access_secret: Secret,
    pub refresh_secret: Secret,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub dependency_timeout_ms: u64,
}

impl Auth {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    pub fn dependency_timeout(&self) -> Duration {
        Duration::from_millis(self.dependency_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub backend: String, // "redis" or "memory"
    pub redis_dsn: Option<String>,
    pub key_prefix: String,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Accounts {
    pub backend: String, // "memory"
    pub seed_admin: Option<SeedAdmin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAdmin {
    pub username: String,
    pub email: String,
    pub password: Secret,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cookie {
    pub access_name: String,
    pub refresh_name: String,
    pub secure: bool,
    pub same_site: String, // "strict", "lax" or "none"
    pub path: String,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    pub address: String,
    pub tls: Option<Tls>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tls {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub filter: String,
}

impl Settings {
    /// Startup checks the token scheme relies on.
    pub fn validate(&self) -> Result<()> {
        let auth = &self.auth;
        if auth.access_secret.expose().is_empty() || auth.refresh_secret.expose().is_empty() {
            bail!("auth secrets must not be empty");
        }
        if auth.access_secret.expose() == auth.refresh_secret.expose() {
            bail!("auth.access_secret and auth.refresh_secret must differ");
        }
        if auth.access_ttl_secs == 0 || auth.refresh_ttl_secs == 0 {
            bail!("token TTLs must be non-zero");
        }
        if auth.access_ttl_secs >= auth.refresh_ttl_secs {
            bail!("access TTL must be shorter than refresh TTL");
        }
        if auth.dependency_timeout_ms == 0 {
            bail!("auth.dependency_timeout_ms must be non-zero");
        }
        if self.session.backend == "redis" && self.session.redis_dsn.is_none() {
            bail!("session.redis_dsn is required for the redis backend");
        }
        if self.session.sweep_interval_secs == 0 {
            bail!("session.sweep_interval_secs must be non-zero");
        }
        if self.cookie.access_name == self.cookie.refresh_name {
            bail!("cookie names must differ");
        }
        Ok(())
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Loads the TOML file, then applies `PALIMPSEST__SECTION__KEY` overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix("PALIMPSEST").separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;
    Ok(settings)
}
