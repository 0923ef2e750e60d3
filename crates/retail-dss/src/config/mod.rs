use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::ranking::{CriterionId, RankingConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Everything the ranking service needs at startup, read from `.env` and the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub analysis: RankingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            environment: AppEnvironment::parse(&text_var("APP_ENV", "development")),
            server: ServerConfig::from_env()?,
            telemetry: TelemetryConfig {
                log_level: text_var("APP_LOG_LEVEL", "info"),
            },
            analysis: analysis_from_env()?,
        })
    }
}

/// Where the HTTP listener binds.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let port = match parse_var::<u16>("APP_PORT") {
            Ok(port) => port.unwrap_or(3000),
            Err(_) => return Err(ConfigError::InvalidPort),
        };

        Ok(Self {
            host: text_var("APP_HOST", "127.0.0.1"),
            port,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::from(([127, 0, 0, 1], self.port)));
        }

        self.host
            .parse::<IpAddr>()
            .map(|ip| SocketAddr::new(ip, self.port))
            .map_err(|source| ConfigError::InvalidHost { source })
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
}

fn analysis_from_env() -> Result<RankingConfig, ConfigError> {
    let defaults = RankingConfig::default();

    let analysis = RankingConfig {
        default_top_n: parse_var("APP_ANALYSIS_DEFAULT_TOP_N")?.unwrap_or(defaults.default_top_n),
        max_top_n: parse_var("APP_ANALYSIS_MAX_TOP_N")?.unwrap_or(defaults.max_top_n),
        run_timeout_ms: parse_var("APP_ANALYSIS_TIMEOUT_MS")?,
        statistics_criterion: optional_var("APP_ANALYSIS_STATS_CRITERION")
            .map(CriterionId::new)
            .unwrap_or(defaults.statistics_criterion),
    };

    analysis.validate().map_err(ConfigError::InvalidAnalysis)?;
    Ok(analysis)
}

/// Trimmed value of `name`; blank counts as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn text_var(name: &str, default: &str) -> String {
    optional_var(name).unwrap_or_else(|| default.to_string())
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    optional_var(name)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidNumber { name, value })
        })
        .transpose()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str, value: String },
    InvalidAnalysis(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => f.write_str("APP_PORT must be a port number (0-65535)"),
            ConfigError::InvalidHost { source } => {
                write!(f, "APP_HOST is not an IP address or 'localhost': {source}")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be a non-negative integer, got '{value}'")
            }
            ConfigError::InvalidAnalysis(reason) => {
                write!(f, "invalid analysis settings: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let ConfigError::InvalidHost { source } = self {
            Some(source)
        } else {
            None
        }
    }
}
