use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3000));
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_GITHUB_OAUTH_URL: &str = "https://github.com";
const DEFAULT_PAGE_SIZE: u32 = 15;
const DEFAULT_QUERY_STALE_SECS: u64 = 300;
const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub public_url: String,
    pub github_client_id: String,
    pub github_client_secret: String,
    pub github_api_url: String,
    pub github_oauth_url: String,
    pub page_size: u32,
    pub query_stale_after: Duration,
    pub session_ttl_secs: i64,
    pub github_max_retries: u32,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("public_url", &self.public_url)
            .field("github_client_id", &self.github_client_id)
            .field("github_client_secret", &"<redacted>")
            .field("github_api_url", &self.github_api_url)
            .field("github_oauth_url", &self.github_oauth_url)
            .field("page_size", &self.page_size)
            .field("query_stale_after", &self.query_stale_after)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("github_max_retries", &self.github_max_retries)
            .finish()
    }
}

fn parse<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let page_size = parse("PAGE_SIZE", lookup("PAGE_SIZE"), DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "PAGE_SIZE",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            bind_addr: parse("BIND_ADDR", lookup("BIND_ADDR"), DEFAULT_BIND_ADDR)?,
            public_url: lookup("PUBLIC_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            github_client_id: required("GITHUB_CLIENT_ID")?,
            github_client_secret: required("GITHUB_CLIENT_SECRET")?,
            github_api_url: lookup("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            github_oauth_url: lookup("GITHUB_OAUTH_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_OAUTH_URL.to_string()),
            page_size,
            query_stale_after: Duration::from_secs(parse(
                "QUERY_STALE_SECS",
                lookup("QUERY_STALE_SECS"),
                DEFAULT_QUERY_STALE_SECS,
            )?),
            session_ttl_secs: parse(
                "SESSION_TTL_SECS",
                lookup("SESSION_TTL_SECS"),
                DEFAULT_SESSION_TTL_SECS,
            )?,
            github_max_retries: parse("GITHUB_MAX_RETRIES", lookup("GITHUB_MAX_RETRIES"), 0)?,
        })
    }

    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/auth/callback/github", self.public_url)
    }

    /// Cookies get the `Secure` attribute when the dashboard is served over TLS.
    pub fn secure_cookies(&self) -> bool {
        self.public_url.starts_with("https://")
    }
}
