use std::{env, str::FromStr};

use secrecy::SecretString;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::debug;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/shiftboard.db";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_MAIL_FROM: &str = "Shiftboard <noreply@localhost>";
const DEFAULT_SESSION_TTL_HOURS: i64 = 16;
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465.
    Tls,
    #[default]
    Starttls,
    /// Plain text. Only for local relays such as mailpit.
    None,
}

#[derive(Debug)]
pub struct MailConfig {
    /// Mail is disabled when unset.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub security: SmtpSecurity,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub from: String,
    pub recipients: Vec<String>,
}

impl MailConfig {
    pub fn disabled() -> Self {
        Self {
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            security: SmtpSecurity::default(),
            username: None,
            password: None,
            from: DEFAULT_MAIL_FROM.to_string(),
            recipients: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.smtp_host.is_some() && !self.recipients.is_empty()
    }
}

#[derive(Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Key material for signing session cookies. A random key is used when
    /// absent, which logs everyone out on restart.
    pub session_secret: Option<SecretString>,
    pub session_ttl_hours: i64,
    /// Adds the `Secure` attribute to the session cookie.
    pub secure_cookies: bool,
    pub admin_passcode: SecretString,
    pub employee_passcode: SecretString,
    /// Offset from UTC of the restaurant's business day.
    pub utc_offset_hours: i32,
    pub mail: MailConfig,
}

impl AppConfig {
    /// Read configuration from the process environment, loading `.env` first
    /// when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => {
                return Err(ConfigError::Invalid {
                    name: ".env",
                    reason: e.to_string(),
                });
            }
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let session_secret = match get("SESSION_SECRET") {
            Some(secret) if secret.len() < MIN_SESSION_SECRET_LEN => {
                return Err(ConfigError::Invalid {
                    name: "SESSION_SECRET",
                    reason: format!("must be at least {MIN_SESSION_SECRET_LEN} bytes"),
                });
            }
            other => other.map(SecretString::from),
        };

        let utc_offset_hours = parse_or(&get, "UTC_OFFSET_HOURS", 0i32)?;
        if !(-12..=14).contains(&utc_offset_hours) {
            return Err(ConfigError::Invalid {
                name: "UTC_OFFSET_HOURS",
                reason: "must be between -12 and 14".to_string(),
            });
        }

        let session_ttl_hours = parse_or(&get, "SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            return Err(ConfigError::Invalid {
                name: "SESSION_TTL_HOURS",
                reason: format!("must be between 1 and {MAX_SESSION_TTL_HOURS}"),
            });
        }

        let mail = MailConfig {
            smtp_host: get("SMTP_HOST"),
            smtp_port: parse_or(&get, "SMTP_PORT", DEFAULT_SMTP_PORT)?,
            security: parse_or(&get, "SMTP_SECURITY", SmtpSecurity::default())?,
            username: get("SMTP_USERNAME"),
            password: get("SMTP_PASSWORD").map(SecretString::from),
            from: get("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            recipients: get("MAIL_RECIPIENTS")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            session_secret,
            session_ttl_hours,
            secure_cookies: parse_or(&get, "COOKIE_SECURE", false)?,
            admin_passcode: get("ADMIN_PASSCODE")
                .map(SecretString::from)
                .ok_or(ConfigError::Missing("ADMIN_PASSCODE"))?,
            employee_passcode: get("EMPLOYEE_PASSCODE")
                .map(SecretString::from)
                .ok_or(ConfigError::Missing("EMPLOYEE_PASSCODE"))?,
            utc_offset_hours,
            mail,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
