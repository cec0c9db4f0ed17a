use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use rand::{Rng, distr::Alphanumeric};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub store_backend: StoreBackend,
    pub store_prefix: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub otp_ttl_secs: i64,
    pub reset_session_ttl_secs: i64,
    pub otp_max_attempts: u32,
    pub mail_relay_url: Option<String>,
    pub etu_default_capacity: u32,
}

impl Config {
    pub fn load() -> Self {
        let store_backend = try_load("STORE_BACKEND", "redis");

        let jwt_secret = match (read_secret("JWT_SECRET"), store_backend) {
            (Some(secret), _) => secret,
            (None, StoreBackend::Memory) => {
                warn!("JWT_SECRET not set, generating one for the memory backend");
                random_secret()
            }
            (None, StoreBackend::Redis) => panic!("Secrets misconfigured!"),
        };

        Self {
            port: try_load("RUST_PORT", "8070"),
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379"),
            store_backend,
            store_prefix: try_load("STORE_PREFIX", "hospital"),
            jwt_secret,
            token_ttl_hours: try_load("TOKEN_TTL_HOURS", "24"),
            bcrypt_cost: try_load("BCRYPT_COST", "10"),
            otp_ttl_secs: try_load("OTP_TTL_SECS", "600"),
            reset_session_ttl_secs: try_load("RESET_SESSION_TTL_SECS", "600"),
            otp_max_attempts: try_load("OTP_MAX_ATTEMPTS", "5"),
            mail_relay_url: var("MAIL_RELAY_URL").ok().filter(|url| !url.is_empty()),
            etu_default_capacity: try_load("ETU_DEFAULT_CAPACITY", "25"),
        }
    }

    /// Defaults with the memory backend and a fixed signing key, for local runs and tests.
    pub fn with_secret(secret: &str) -> Self {
        Self {
            port: 8070,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            store_backend: StoreBackend::Memory,
            store_prefix: "hospital".to_string(),
            jwt_secret: secret.to_string(),
            token_ttl_hours: 24,
            bcrypt_cost: 10,
            otp_ttl_secs: 600,
            reset_session_ttl_secs: 600,
            otp_max_attempts: 5,
            mail_relay_url: None,
            etu_default_capacity: 25,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

/// Docker secret first, then a plain environment variable.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .or_else(|_| env::var(secret_name))
        .ok()
        .filter(|secret| !secret.is_empty())
}

fn random_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("redis".parse::<StoreBackend>(), Ok(StoreBackend::Redis));
        assert_eq!(" Memory ".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("mongo".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_random_secret_shape() {
        let a = random_secret();
        let b = random_secret();

        assert_eq!(a.len(), 48);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
