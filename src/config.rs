use dotenv::dotenv;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use thiserror::Error;

const DEV_SECRET_KEY: &str = "your-secret-key-for-development";
const MAX_WINDOW_SECS: i64 = 365 * 24 * 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Runtime configuration, read from the environment (and `.env` if present).
///
/// | Variable                  | Default                          |
/// |---------------------------|----------------------------------|
/// | `JWT_SECRET_KEY`          | development secret (warns)       |
/// | `HOST`                    | `0.0.0.0`                        |
/// | `PORT`                    | `5000`                           |
/// | `DEBUG` / `FLASK_DEBUG`   | `false`                          |
/// | `RATE_LIMIT_MAX_REQUESTS` | `10`                             |
/// | `RATE_LIMIT_WINDOW_SECS`  | `60`                             |
/// | `RATE_LIMIT_PRUNE_SECS`   | `300` (`0` disables the sweep)   |
/// | `TRUST_FORWARDED_FOR`     | `false`                          |
/// | `SIMULATED_AUTH`          | `true`                           |
/// | `FINGERPRINT_HASH_COST`   | `12`                             |
/// | `LANDMARK_DETECTOR_URL`   | `http://127.0.0.1:5001/detect`   |
/// | `REDIS_URL`               | unset, state stays in memory     |
#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: String,
    pub host: IpAddr,
    pub port: u16,
    pub debug: bool,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window_secs: i64,
    pub rate_limit_prune_secs: u64,
    pub trust_forwarded_for: bool,
    pub simulated_auth: bool,
    pub fingerprint_hash_cost: u32,
    pub detector_url: String,
    pub redis_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret_key: DEV_SECRET_KEY.to_string(),
            host: IpAddr::from([0, 0, 0, 0]),
            port: 5000,
            debug: false,
            rate_limit_max_requests: 10,
            rate_limit_window_secs: 60,
            rate_limit_prune_secs: 300,
            trust_forwarded_for: false,
            simulated_auth: true,
            fingerprint_hash_cost: bcrypt::DEFAULT_COST,
            detector_url: "http://127.0.0.1:5001/detect".to_string(),
            redis_url: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        let defaults = Self::default();

        let secret_key = non_empty("JWT_SECRET_KEY").unwrap_or(defaults.secret_key);

        let debug = match non_empty("DEBUG").or_else(|| non_empty("FLASK_DEBUG")) {
            Some(raw) => parse_bool("DEBUG", &raw)?,
            None => defaults.debug,
        };

        let fingerprint_hash_cost: u32 =
            parsed("FINGERPRINT_HASH_COST", defaults.fingerprint_hash_cost)?;
        if !(4..=31).contains(&fingerprint_hash_cost) {
            return Err(ConfigError::InvalidValue {
                name: "FINGERPRINT_HASH_COST",
                value: fingerprint_hash_cost.to_string(),
            });
        }

        let rate_limit_window_secs = window_secs(parsed(
            "RATE_LIMIT_WINDOW_SECS",
            defaults.rate_limit_window_secs,
        )?)?;

        Ok(Self {
            secret_key,
            host: parsed("HOST", defaults.host)?,
            port: parsed("PORT", defaults.port)?,
            debug,
            rate_limit_max_requests: parsed(
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            )?,
            rate_limit_window_secs,
            rate_limit_prune_secs: parsed("RATE_LIMIT_PRUNE_SECS", defaults.rate_limit_prune_secs)?,
            trust_forwarded_for: flag("TRUST_FORWARDED_FOR", defaults.trust_forwarded_for)?,
            simulated_auth: flag("SIMULATED_AUTH", defaults.simulated_auth)?,
            fingerprint_hash_cost,
            detector_url: non_empty("LANDMARK_DETECTOR_URL").unwrap_or(defaults.detector_url),
            redis_url: non_empty("REDIS_URL"),
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.secret_key == DEV_SECRET_KEY
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// A window is between one second and a year long.
fn window_secs(secs: i64) -> Result<i64, ConfigError> {
    if (1..=MAX_WINDOW_SECS).contains(&secs) {
        Ok(secs)
    } else {
        Err(ConfigError::InvalidValue {
            name: "RATE_LIMIT_WINDOW_SECS",
            value: secs.to_string(),
        })
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}

fn flag(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match non_empty(name) {
        Some(raw) => parse_bool(name, &raw),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
        }),
    }
}
