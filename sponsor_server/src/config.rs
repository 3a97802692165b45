use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use sponsor_common::{helpers::parse_boolean_flag, Secret};
use sponsor_engine::rate_limiter::{RateLimitConfig, DEFAULT_MAX_CALLS, DEFAULT_WINDOW};
use wxpay_tools::WxPayConfig;

const DEFAULT_SPS_HOST: &str = "127.0.0.1";
const DEFAULT_SPS_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/sponsor_store.db";
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;
const DEFAULT_MAIL_FROM: &str = "no-reply@localhost";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, pending database migrations are applied at startup
    pub auto_migrate: bool,
    /// Bearer token for the `/api/admin` routes. When empty, the admin routes refuse every request.
    pub admin_token: Secret<String>,
    pub rate_limit: RateLimitConfig,
    pub rate_limit_backend: RateLimitBackend,
    /// Capacity of each event channel between the order engine and the e-mail hooks
    pub event_buffer_size: usize,
    /// The externally reachable base URL of this server. Used to build download links in e-mails.
    pub public_url: String,
    pub mail: MailConfig,
    pub wxpay: WxPayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPS_HOST.to_string(),
            port: DEFAULT_SPS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auto_migrate: true,
            admin_token: Secret::default(),
            rate_limit: RateLimitConfig::default(),
            rate_limit_backend: RateLimitBackend::default(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            public_url: format!("http://{DEFAULT_SPS_HOST}:{DEFAULT_SPS_PORT}"),
            mail: MailConfig::default(),
            wxpay: WxPayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, public_url: format!("http://{host}:{port}"), ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPS_HOST").ok().unwrap_or_else(|| DEFAULT_SPS_HOST.into());
        let port = env::var("SPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPS_PORT. {e} Using the default, {DEFAULT_SPS_PORT}, instead."
                    );
                    DEFAULT_SPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPS_PORT);
        let database_url = env::var("SPS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SPS_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auto_migrate = parse_boolean_flag(env::var("SPS_AUTO_MIGRATE").ok(), true);
        let admin_token = Secret::new(env::var("SPS_ADMIN_TOKEN").ok().unwrap_or_else(|| {
            warn!("🪛️ SPS_ADMIN_TOKEN is not set. The admin routes are disabled.");
            String::default()
        }));
        let max_calls = parse_env("SPS_RATE_LIMIT_MAX", DEFAULT_MAX_CALLS);
        let window = Duration::from_secs(parse_env("SPS_RATE_LIMIT_WINDOW_SECS", DEFAULT_WINDOW.as_secs()));
        let rate_limit = RateLimitConfig { max_calls, window };
        let rate_limit_backend = parse_env("SPS_RATE_LIMIT_BACKEND", RateLimitBackend::default());
        let event_buffer_size = parse_env("SPS_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        let public_url = env::var("SPS_PUBLIC_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://{host}:{port}"));
        let mail = MailConfig::from_env_or_default();
        let wxpay = WxPayConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            auto_migrate,
            admin_token,
            rate_limit,
            rate_limit_backend,
            event_buffer_size,
            public_url,
            mail,
            wxpay,
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

//-------------------------------------------------  RateLimitBackend  -------------------------------------------------
/// Where the order rate limiter keeps its counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RateLimitBackend {
    /// In this process only. Correct for a single server instance.
    #[default]
    Memory,
    /// In the shared database, so that every instance enforces the same limit
    Database,
}

impl FromStr for RateLimitBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "database" | "db" => Ok(Self::Database),
            other => Err(format!("{other} is not a rate limit backend. Use 'memory' or 'database'.")),
        }
    }
}

impl Display for RateLimitBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Database => write!(f, "database"),
        }
    }
}

//-------------------------------------------------  MailConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct MailConfig {
    /// HTTP endpoint of the transactional mail provider. When unset, e-mails are only written to the log.
    pub endpoint: Option<String>,
    pub api_key: Secret<String>,
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self { endpoint: None, api_key: Secret::default(), from: DEFAULT_MAIL_FROM.to_string() }
    }
}

impl MailConfig {
    pub fn from_env_or_default() -> Self {
        let endpoint = env::var("SPS_MAIL_ENDPOINT").ok().filter(|s| !s.trim().is_empty());
        if endpoint.is_none() {
            info!("🪛️ SPS_MAIL_ENDPOINT is not set. Buyer e-mails will be logged, not sent.");
        }
        let api_key = Secret::new(env::var("SPS_MAIL_API_KEY").unwrap_or_default());
        if endpoint.is_some() && api_key.is_empty() {
            warn!("🪛️ SPS_MAIL_ENDPOINT is set, but SPS_MAIL_API_KEY is not. The mail provider may reject requests.");
        }
        let from = env::var("SPS_MAIL_FROM").unwrap_or_else(|_| DEFAULT_MAIL_FROM.to_string());
        Self { endpoint, api_key, from }
    }
}
