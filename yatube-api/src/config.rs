use serde::Deserialize;
use std::{net::IpAddr, time::Duration};
use thiserror::Error;
use yatube_common::{
    model::user::UserHandle,
    util::{NonPositiveDurationError, PositiveDuration},
};

pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 20;
pub const DEFAULT_CACHE_KEY_PREFIX: &str = "index_page";
pub const DEFAULT_LOGIN_URL: &str = "/auth/login/";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://yatube.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid token lifetime: {0}")]
    TokenLifetime(#[from] NonPositiveDurationError),
}

/// Process environment, read once at start-up.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_cache_key_prefix")]
    pub cache_key_prefix: String,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default)]
    pub admin_handles: Vec<String>,
    #[serde(default)]
    pub token_lifetime_seconds: Option<u64>,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_owned()
}

fn default_cache_ttl_seconds() -> u64 {
    DEFAULT_CACHE_TTL_SECONDS
}

fn default_cache_key_prefix() -> String {
    DEFAULT_CACHE_KEY_PREFIX.to_owned()
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_owned()
}

/// The part of the configuration request handlers look at.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Settings {
    pub login_url: String,
    pub admin_handles: Vec<String>,
    pub token_lifetime: Option<PositiveDuration>,
    pub cache_ttl: Duration,
    pub cache_key_prefix: String,
}

impl Settings {
    #[must_use]
    pub fn is_admin_handle(&self, handle: &UserHandle) -> bool {
        self.admin_handles
            .iter()
            .any(|admin| admin.trim() == handle.get())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            admin_handles: Vec::new(),
            token_lifetime: None,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            cache_key_prefix: default_cache_key_prefix(),
        }
    }
}

impl TryFrom<&Env> for Settings {
    type Error = ConfigError;

    fn try_from(env: &Env) -> Result<Self, Self::Error> {
        let token_lifetime = env
            .token_lifetime_seconds
            .map(|seconds| PositiveDuration::try_from(time::Duration::seconds(seconds.cast_signed())))
            .transpose()?;

        Ok(Self {
            login_url: env.login_url.clone(),
            admin_handles: env.admin_handles.clone(),
            token_lifetime,
            cache_ttl: Duration::from_secs(env.cache_ttl_seconds),
            cache_key_prefix: env.cache_key_prefix.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{DEFAULT_CACHE_TTL_SECONDS, Env, Settings};
    use std::time::Duration;
    use yatube_common::model::user::UserHandle;

    fn env(vars: &[(&str, &str)]) -> Result<Env, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned())),
        )
    }

    #[test]
    fn defaults() {
        let env = env(&[("SERVER_ADDRESS", "127.0.0.1"), ("SERVER_PORT", "8000")]).unwrap();
        let settings = Settings::try_from(&env).unwrap();

        assert_eq!(env.server_port, 8000);
        assert_eq!(env.cache_ttl_seconds, DEFAULT_CACHE_TTL_SECONDS);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn overrides() {
        let env = env(&[
            ("SERVER_ADDRESS", "0.0.0.0"),
            ("SERVER_PORT", "80"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("CACHE_TTL_SECONDS", "60"),
            ("LOGIN_URL", "/login/"),
            ("ADMIN_HANDLES", "root,editor"),
            ("TOKEN_LIFETIME_SECONDS", "3600"),
        ])
        .unwrap();
        let settings = Settings::try_from(&env).unwrap();

        assert_eq!(env.database_url, "sqlite::memory:");
        assert_eq!(settings.cache_ttl, Duration::from_secs(60));
        assert_eq!(settings.login_url, "/login/");
        assert_eq!(
            settings.token_lifetime.map(|lifetime| lifetime.whole_seconds()),
            Some(3600)
        );
        assert!(settings.is_admin_handle(&UserHandle::new("editor".to_owned()).unwrap()));
        assert!(!settings.is_admin_handle(&UserHandle::new("reader".to_owned()).unwrap()));
    }

    #[test]
    fn rejects_zero_token_lifetime() {
        let env = env(&[
            ("SERVER_ADDRESS", "127.0.0.1"),
            ("SERVER_PORT", "8000"),
            ("TOKEN_LIFETIME_SECONDS", "0"),
        ])
        .unwrap();

        assert!(Settings::try_from(&env).is_err());
    }

    #[test]
    fn requires_an_address() {
        assert!(env(&[("SERVER_PORT", "8000")]).is_err());
    }
}
