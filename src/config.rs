use std::{env, fmt::Display, str::FromStr};

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{event, Level};

const DEFAULT_PORT: &str = "8000";
const DEFAULT_SESSION_TTL_MINUTES: &str = "20160";
// one hundred years
const MAX_SESSION_TTL_MINUTES: i64 = 100 * 365 * 24 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    MongoDb(MongoDbInitializationInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoDbInitializationInfo {
    pub uri: String,
    pub database: String,
    pub cookie_stand_collection: String,
    pub user_collection: String,
}

#[derive(Debug, Clone)]
pub struct BootstrapUser {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub log_path: Option<String>,
    pub log_level: Level,
    pub storage: StorageBackend,
    /// `None` means a random secret is generated for this process.
    pub session_secret: Option<String>,
    pub session_ttl: Duration,
    pub bootstrap_user: Option<BootstrapUser>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage = match lookup("STORAGE_BACKEND")
            .unwrap_or_else(|| String::from("memory"))
            .to_lowercase()
            .as_str()
        {
            "memory" => StorageBackend::Memory,
            "mongodb" => StorageBackend::MongoDb(MongoDbInitializationInfo {
                uri: required(&lookup, "MONGODB_URI")?,
                database: required(&lookup, "MONGODB_DB")?,
                cookie_stand_collection: lookup("MONGODB_COOKIE_STAND_COLLECTION")
                    .unwrap_or_else(|| String::from("cookie_stands")),
                user_collection: lookup("MONGODB_USER_COLLECTION")
                    .unwrap_or_else(|| String::from("users")),
            }),
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    reason: format!("unknown backend '{}'", other),
                })
            }
        };

        let bootstrap_user = match (lookup("BOOTSTRAP_USERNAME"), lookup("BOOTSTRAP_PASSWORD")) {
            (Some(username), Some(password)) => Some(BootstrapUser { username, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("BOOTSTRAP_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("BOOTSTRAP_USERNAME")),
        };

        let session_ttl = session_ttl(parse_or_default(
            &lookup,
            "SESSION_TTL_MINUTES",
            DEFAULT_SESSION_TTL_MINUTES,
        )?)?;

        Ok(Config {
            port: parse_or_default(&lookup, "AXUM_PORT", DEFAULT_PORT)?,
            log_path: lookup("LOG_PATH").filter(|path| !path.is_empty()),
            log_level: parse_or_default(&lookup, "LOG_LEVEL", "info")?,
            storage,
            session_secret: lookup("SESSION_SECRET").filter(|secret| !secret.is_empty()),
            session_ttl,
            bootstrap_user,
        })
    }
}

/// Sessions must expire at a representable instant, so the lifetime is bounded.
fn session_ttl(minutes: i64) -> Result<Duration, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "SESSION_TTL_MINUTES",
        reason,
    };

    if minutes <= 0 {
        return Err(invalid(String::from("must be positive")));
    }
    if minutes > MAX_SESSION_TTL_MINUTES {
        return Err(invalid(format!("must be at most {}", MAX_SESSION_TTL_MINUTES)));
    }

    Duration::try_minutes(minutes)
        .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
        .ok_or_else(|| invalid(String::from("out of range")))
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or(ConfigError::Missing(key))
}

fn parse_or_default<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        event!(Level::DEBUG, "{} not set, using default: {}", key, default);
        default.to_string()
    });

    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_in_memory_storage() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.session_ttl, Duration::minutes(20160));
        assert!(config.session_secret.is_none());
        assert!(config.bootstrap_user.is_none());
        assert!(config.log_path.is_none());
    }

    #[test]
    fn mongodb_backend_requires_uri_and_database() {
        let err = Config::from_lookup(lookup_from(&[("STORAGE_BACKEND", "mongodb")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("MONGODB_URI")));

        let config = Config::from_lookup(lookup_from(&[
            ("STORAGE_BACKEND", "MongoDB"),
            ("MONGODB_URI", "mongodb://localhost:27017"),
            ("MONGODB_DB", "cookies"),
        ]))
        .unwrap();

        assert_eq!(
            config.storage,
            StorageBackend::MongoDb(MongoDbInitializationInfo {
                uri: String::from("mongodb://localhost:27017"),
                database: String::from("cookies"),
                cookie_stand_collection: String::from("cookie_stands"),
                user_collection: String::from("users"),
            })
        );
    }

    #[test]
    fn rejects_unparseable_values() {
        let err = Config::from_lookup(lookup_from(&[("AXUM_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "AXUM_PORT", .. }));

        let err = Config::from_lookup(lookup_from(&[("SESSION_TTL_MINUTES", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SESSION_TTL_MINUTES", .. }));

        let err = Config::from_lookup(lookup_from(&[("STORAGE_BACKEND", "postgres")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "STORAGE_BACKEND", .. }));
    }

    #[test]
    fn rejects_session_lifetimes_that_overflow() {
        for minutes in [i64::MAX.to_string(), String::from("200000000000")] {
            let err = Config::from_lookup(lookup_from(&[("SESSION_TTL_MINUTES", minutes.as_str())]))
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { key: "SESSION_TTL_MINUTES", .. }),
                "{}",
                minutes
            );
        }

        let longest = MAX_SESSION_TTL_MINUTES.to_string();
        let config =
            Config::from_lookup(lookup_from(&[("SESSION_TTL_MINUTES", longest.as_str())])).unwrap();
        assert_eq!(config.session_ttl, Duration::minutes(MAX_SESSION_TTL_MINUTES));
    }

    #[test]
    fn bootstrap_user_needs_both_halves() {
        let err = Config::from_lookup(lookup_from(&[("BOOTSTRAP_USERNAME", "admin")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("BOOTSTRAP_PASSWORD")));

        let config = Config::from_lookup(lookup_from(&[
            ("BOOTSTRAP_USERNAME", "admin"),
            ("BOOTSTRAP_PASSWORD", "pass"),
            ("LOG_LEVEL", "debug"),
        ]))
        .unwrap();
        let user = config.bootstrap_user.unwrap();
        assert_eq!(user.username, "admin");
        assert_eq!(user.password, "pass");
        assert_eq!(config.log_level, Level::DEBUG);
    }
}
