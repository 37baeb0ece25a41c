//! Staff sessions.
//!
//! There are no user accounts: staff pick a name and prove their role with the
//! shared passcode of that role. The resulting [`Actor`] travels in a cookie
//! as `base64url(json claims).hex(hmac-sha256)`.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum_macros::{Display, EnumString};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::warn;
use ts_rs::TS;

use super::config::AppConfig;

pub const SESSION_COOKIE: &str = "shiftboard_session";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Name is required")]
    MissingName,
    #[error("Invalid passcode")]
    InvalidPasscode,
    #[error("Invalid session key")]
    InvalidKey,
    #[error("Session lifetime is out of range")]
    TtlOutOfRange,
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActorRole {
    Admin,
    Employee,
}

/// The person behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Actor {
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct LoginRequest {
    pub name: String,
    pub role: ActorRole,
    pub passcode: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(flatten)]
    actor: Actor,
    expires_at: DateTime<Utc>,
}

/// Check the passcode of the requested role and return the actor to store in
/// the session.
pub fn authenticate(config: &AppConfig, request: &LoginRequest) -> Result<Actor, SessionError> {
    let name = utils::text::normalize_name(&request.name);
    if name.is_empty() {
        return Err(SessionError::MissingName);
    }
    let expected = match request.role {
        ActorRole::Admin => &config.admin_passcode,
        ActorRole::Employee => &config.employee_passcode,
    };
    if !passcode_matches(expected, &request.passcode) {
        return Err(SessionError::InvalidPasscode);
    }
    Ok(Actor {
        name,
        role: request.role,
    })
}

// Digests have a fixed length, so the comparison does not leak the passcode
// length either.
fn passcode_matches(expected: &SecretString, given: &str) -> bool {
    let expected = Sha256::digest(expected.expose_secret().as_bytes());
    let given = Sha256::digest(given.as_bytes());
    expected.as_slice().ct_eq(given.as_slice()).into()
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionSigner {
    mac: HmacSha256,
    ttl: Duration,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionSigner {
    pub fn new(key: &[u8], ttl: Duration) -> Result<Self, SessionError> {
        let mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::InvalidKey)?;
        Ok(Self { mac, ttl })
    }

    /// Signer keyed with `SESSION_SECRET`, or with a random key when it is
    /// not configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, SessionError> {
        let ttl =
            Duration::try_hours(config.session_ttl_hours).ok_or(SessionError::TtlOutOfRange)?;
        match &config.session_secret {
            Some(secret) => Self::new(secret.expose_secret().as_bytes(), ttl),
            None => {
                warn!("SESSION_SECRET is not set; sessions will not survive a restart");
                let mut key = [0u8; 64];
                rand::thread_rng().fill_bytes(&mut key);
                Self::new(&key, ttl)
            }
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, actor: &Actor) -> Result<String, SessionError> {
        self.issue_at(actor, Utc::now())
    }

    fn issue_at(&self, actor: &Actor, now: DateTime<Utc>) -> Result<String, SessionError> {
        let claims = SessionClaims {
            actor: actor.clone(),
            expires_at: now
                .checked_add_signed(self.ttl)
                .ok_or(SessionError::TtlOutOfRange)?,
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let tag = self
            .mac
            .clone()
            .chain_update(payload.as_bytes())
            .finalize()
            .into_bytes();
        let signature = hex::encode(tag);
        Ok(format!("{payload}.{signature}"))
    }

    /// The actor of a token that is well formed, correctly signed and not
    /// expired.
    pub fn verify(&self, token: &str) -> Option<Actor> {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Option<Actor> {
        let (payload, signature) = token.split_once('.')?;
        let signature = hex::decode(signature).ok()?;
        self.mac
            .clone()
            .chain_update(payload.as_bytes())
            .verify_slice(&signature)
            .ok()?;
        let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let claims: SessionClaims = serde_json::from_slice(&bytes).ok()?;
        (claims.expires_at > now).then_some(claims.actor)
    }
}
