//! Service configuration parsed from environment variables.
//!
//! `.env` is loaded by `main` through `dotenvy` before [`AppConfig::from_env`]
//! runs. Every knob has a default except the database URL, which is only
//! required when the Postgres backend is selected.

use time::{OffsetDateTime, UtcOffset};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SESSION_TTL_SECS: i64 = 12 * 60 * 60;
pub const DEFAULT_NOTIFY_DELAY_MS: u64 = 100;
pub const DEFAULT_NOTIFY_MAX_ERRORS: usize = 50;
pub const DEFAULT_MAX_PHOTO_BYTES: usize = 2 * 1024 * 1024;
pub const DEFAULT_RESET_CODE_TTL_SECS: i64 = 5 * 60;
pub const DEFAULT_RESET_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RESET_REQUEST_LIMIT: usize = 3;
pub const DEFAULT_RESET_REQUEST_WINDOW_SECS: u64 = 15 * 60;
pub const DEFAULT_CAMPUS_NAME: &str = "Campus Administration";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub session_ttl: time::Duration,
    pub cookie_secure: bool,
    /// Staff contact allowed to request password-reset codes when no email
    /// is stored with the password record.
    pub staff_email: Option<String>,
    /// Accepted at login until a password has been set.
    pub bootstrap_password: Option<String>,
    pub notify_delay: std::time::Duration,
    pub notify_max_errors: usize,
    pub max_photo_bytes: usize,
    pub reset_code_ttl: time::Duration,
    pub reset_max_attempts: u32,
    /// Reset codes that may be requested per address inside the window.
    pub reset_request_limit: usize,
    pub reset_request_window: std::time::Duration,
    pub campus_name: String,
    /// Offset used to decide what "today" means on campus.
    pub utc_offset: UtcOffset,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            store_backend: StoreBackend::Memory,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            session_ttl: time::Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            cookie_secure: false,
            staff_email: None,
            bootstrap_password: None,
            notify_delay: std::time::Duration::from_millis(DEFAULT_NOTIFY_DELAY_MS),
            notify_max_errors: DEFAULT_NOTIFY_MAX_ERRORS,
            max_photo_bytes: DEFAULT_MAX_PHOTO_BYTES,
            reset_code_ttl: time::Duration::seconds(DEFAULT_RESET_CODE_TTL_SECS),
            reset_max_attempts: DEFAULT_RESET_MAX_ATTEMPTS,
            reset_request_limit: DEFAULT_RESET_REQUEST_LIMIT,
            reset_request_window: std::time::Duration::from_secs(DEFAULT_RESET_REQUEST_WINDOW_SECS),
            campus_name: DEFAULT_CAMPUS_NAME.to_owned(),
            utc_offset: UtcOffset::UTC,
        }
    }
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// - `PORT` (3000)
    /// - `STORE_BACKEND`: `postgres` (default) or `memory`
    /// - `DATABASE_URL`: required for `postgres`
    /// - `DB_MAX_CONNECTIONS` (5)
    /// - `SESSION_TTL_SECS` (43200)
    /// - `COOKIE_SECURE` (false)
    /// - `STAFF_EMAIL`, `STAFF_BOOTSTRAP_PASSWORD`
    /// - `NOTIFY_DELAY_MS` (100), `NOTIFY_MAX_ERRORS` (50)
    /// - `MAX_PHOTO_BYTES` (2 MiB)
    /// - `RESET_CODE_TTL_SECS` (300), `RESET_MAX_ATTEMPTS` (3)
    /// - `RESET_REQUEST_LIMIT` (3) per `RESET_REQUEST_WINDOW_SECS` (900)
    /// - `CAMPUS_NAME`, `CAMPUS_UTC_OFFSET` (`+00:00`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown backend, an unparsable offset,
    /// or a missing `DATABASE_URL` with the Postgres backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let store_backend = parse_backend(std::env::var("STORE_BACKEND").ok().as_deref())?;
        let database_url = env_string("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let utc_offset = match env_string("CAMPUS_UTC_OFFSET") {
            Some(raw) => {
                parse_utc_offset(&raw).ok_or(ConfigError::Invalid { key: "CAMPUS_UTC_OFFSET", value: raw })?
            }
            None => defaults.utc_offset,
        };

        Ok(Self {
            port: env_parse("PORT", defaults.port),
            store_backend,
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            session_ttl: time::Duration::seconds(env_parse("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(defaults.cookie_secure),
            staff_email: env_string("STAFF_EMAIL").map(|e| e.to_ascii_lowercase()),
            bootstrap_password: env_string("STAFF_BOOTSTRAP_PASSWORD"),
            notify_delay: std::time::Duration::from_millis(env_parse("NOTIFY_DELAY_MS", DEFAULT_NOTIFY_DELAY_MS)),
            notify_max_errors: env_parse("NOTIFY_MAX_ERRORS", defaults.notify_max_errors),
            max_photo_bytes: env_parse("MAX_PHOTO_BYTES", defaults.max_photo_bytes),
            reset_code_ttl: time::Duration::seconds(env_parse("RESET_CODE_TTL_SECS", DEFAULT_RESET_CODE_TTL_SECS)),
            reset_max_attempts: env_parse("RESET_MAX_ATTEMPTS", defaults.reset_max_attempts),
            reset_request_limit: env_parse("RESET_REQUEST_LIMIT", defaults.reset_request_limit),
            reset_request_window: std::time::Duration::from_secs(env_parse(
                "RESET_REQUEST_WINDOW_SECS",
                DEFAULT_RESET_REQUEST_WINDOW_SECS,
            )),
            campus_name: env_string("CAMPUS_NAME").unwrap_or(defaults.campus_name),
            utc_offset,
        })
    }

    /// Current time at the campus offset.
    #[must_use]
    pub fn local_now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.utc_offset)
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

/// Non-empty, trimmed value of `key`.
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_backend(raw: Option<&str>) -> Result<StoreBackend, ConfigError> {
    match raw.map(str::trim).unwrap_or("postgres") {
        "postgres" => Ok(StoreBackend::Postgres),
        "memory" => Ok(StoreBackend::Memory),
        other => Err(ConfigError::Invalid { key: "STORE_BACKEND", value: other.to_owned() }),
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HH` or `Z`.
pub(crate) fn parse_utc_offset(raw: &str) -> Option<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") {
        return Some(UtcOffset::UTC);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1i8, &raw[1..]),
        b'-' => (-1i8, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i8>().ok()?, m.parse::<i8>().ok()?),
        None => (rest.parse::<i8>().ok()?, 0),
    };
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
