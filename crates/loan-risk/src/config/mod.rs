use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::scoring::advisory::AdvisoryConfig;
use crate::scoring::applicant::{Categorical, LoanGrade};
use crate::scoring::risk::{RiskError, RiskThresholds};
use crate::scoring::ScoringPolicy;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub artifacts: ArtifactPaths,
    pub policy: ScoringPolicy,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let artifacts = ArtifactPaths {
            model: env_path("LOAN_MODEL_PATH", "models/loan_risk_model.json"),
            scaler: env_path("LOAN_SCALER_PATH", "models/scaler.csv"),
            schema: env_path("LOAN_SCHEMA_PATH", "models/feature_columns.json"),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            artifacts,
            policy: load_policy()?,
        })
    }
}

fn load_policy() -> Result<ScoringPolicy, ConfigError> {
    let defaults = ScoringPolicy::default();

    let risk = RiskThresholds::new(
        env_parse("RISK_MEDIUM_THRESHOLD", defaults.risk.medium())?,
        env_parse("RISK_HIGH_THRESHOLD", defaults.risk.high())?,
    )
    .map_err(|source| ConfigError::InvalidThresholds { source })?;

    let strong_grades = match env::var("ADVICE_STRONG_GRADES") {
        Ok(raw) => parse_grades(&raw).ok_or(ConfigError::InvalidValue {
            key: "ADVICE_STRONG_GRADES",
            value: raw,
        })?,
        Err(_) => defaults.advisory.strong_grades.clone(),
    };

    let advisory = AdvisoryConfig {
        strong_income_threshold: env_parse(
            "ADVICE_INCOME_THRESHOLD",
            defaults.advisory.strong_income_threshold,
        )?,
        max_loan_to_income_ratio: env_parse(
            "ADVICE_LOAN_TO_INCOME_RATIO",
            defaults.advisory.max_loan_to_income_ratio,
        )?,
        min_credit_history_years: env_parse(
            "ADVICE_MIN_CREDIT_HISTORY_YEARS",
            defaults.advisory.min_credit_history_years,
        )?,
        strong_grades,
    };

    Ok(ScoringPolicy { risk, advisory })
}

fn env_path(key: &str, default: &str) -> PathBuf {
    PathBuf::from(env::var(key).unwrap_or_else(|_| default.to_string()))
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_grades(raw: &str) -> Option<Vec<LoanGrade>> {
    let grades = raw
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| LoanGrade::parse(part).ok())
        .collect::<Option<Vec<_>>>()?;

    if grades.is_empty() {
        None
    } else {
        Some(grades)
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Locations of the model, scaler, and feature-schema artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub schema: PathBuf,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { key: &'static str, value: String },
    InvalidThresholds { source: RiskError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "{key} has an invalid value '{value}'")
            }
            ConfigError::InvalidThresholds { source } => {
                write!(f, "risk thresholds are inconsistent: {source}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidThresholds { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "LOAN_MODEL_PATH",
            "LOAN_SCALER_PATH",
            "LOAN_SCHEMA_PATH",
            "RISK_MEDIUM_THRESHOLD",
            "RISK_HIGH_THRESHOLD",
            "ADVICE_INCOME_THRESHOLD",
            "ADVICE_LOAN_TO_INCOME_RATIO",
            "ADVICE_MIN_CREDIT_HISTORY_YEARS",
            "ADVICE_STRONG_GRADES",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(
            config.artifacts.model,
            PathBuf::from("models/loan_risk_model.json")
        );
        assert_eq!(config.policy, ScoringPolicy::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn policy_thresholds_come_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("RISK_MEDIUM_THRESHOLD", "0.08");
        env::set_var("RISK_HIGH_THRESHOLD", "0.2");
        env::set_var("ADVICE_INCOME_THRESHOLD", "250000");
        env::set_var("ADVICE_STRONG_GRADES", "a, b ,C");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.policy.risk.medium(), 0.08);
        assert_eq!(config.policy.risk.high(), 0.2);
        assert_eq!(config.policy.advisory.strong_income_threshold, 250_000);
        assert_eq!(
            config.policy.advisory.strong_grades,
            vec![LoanGrade::A, LoanGrade::B, LoanGrade::C]
        );
        reset_env();
    }

    #[test]
    fn rejects_inverted_risk_thresholds() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("RISK_MEDIUM_THRESHOLD", "0.3");
        env::set_var("RISK_HIGH_THRESHOLD", "0.1");

        let result = AppConfig::load();
        reset_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidThresholds { .. })
        ));
    }

    #[test]
    fn rejects_unknown_strong_grade() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ADVICE_STRONG_GRADES", "A,Z");

        let result = AppConfig::load();
        reset_env();
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "ADVICE_STRONG_GRADES"),
            other => panic!("expected invalid value, got {other:?}"),
        }
    }
}
