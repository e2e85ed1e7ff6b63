//! Telegram Mini App Authentication
//!
//! Validates the `initData` string Telegram hands to a Mini App. The client
//! forwards it verbatim in the `Authorization` header.
//!
//! ```text
//! secret_key        = HMAC_SHA256(key = "WebAppData", msg = bot_token)
//! data_check_string = sorted("key=value" for every field except hash).join("\n")
//! hash              = hex(HMAC_SHA256(key = secret_key, msg = data_check_string))
//! ```

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

/// Key used to derive the secret from the bot token.
const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";

/// Telegram user embedded in `initData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramUser {
    /// Telegram user id.
    pub id: i64,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Last name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Username without `@`.
    #[serde(default)]
    pub username: Option<String>,
    /// IETF language tag.
    #[serde(default)]
    pub language_code: Option<String>,
}

impl TelegramUser {
    /// Name to show in game.
    pub fn display_name(&self) -> String {
        if !self.first_name.is_empty() {
            self.first_name.clone()
        } else if let Some(username) = &self.username {
            username.clone()
        } else {
            format!("player{}", self.id)
        }
    }
}

/// Verified `initData` contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitData {
    /// Launching user.
    pub user: TelegramUser,
    /// Unix timestamp at which Telegram signed the data.
    pub auth_date: Option<i64>,
    /// Inline query session id.
    pub query_id: Option<String>,
}

/// Authentication errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No bot token configured on server.
    #[error("authentication not configured")]
    NotConfigured,
    /// Header missing or empty.
    #[error("missing init data")]
    Missing,
    /// No `hash` field.
    #[error("init data has no hash")]
    MissingHash,
    /// Hash does not match the payload.
    #[error("invalid init data signature")]
    InvalidSignature,
    /// `auth_date` older than allowed.
    #[error("init data expired")]
    Expired,
    /// Required field is missing.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// Field could not be parsed.
    #[error("malformed field: {0}")]
    Malformed(&'static str),
}

fn secret_key(bot_token: &str) -> Result<HmacSha256, AuthError> {
    let mut derive =
        HmacSha256::new_from_slice(WEB_APP_DATA_KEY).map_err(|_| AuthError::NotConfigured)?;
    derive.update(bot_token.as_bytes());
    let secret = derive.finalize().into_bytes();
    HmacSha256::new_from_slice(&secret).map_err(|_| AuthError::NotConfigured)
}

fn data_check_string<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut lines: Vec<String> = pairs
        .filter(|(key, _)| *key != "hash")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    lines.sort();
    lines.join("\n")
}

/// Validate `init_data` against `bot_token`.
///
/// `now` is the current Unix time; `max_age` bounds how old `auth_date` may be.
pub fn validate_init_data(
    init_data: &str,
    bot_token: &str,
    max_age: Option<Duration>,
    now: i64,
) -> Result<InitData, AuthError> {
    if bot_token.is_empty() {
        return Err(AuthError::NotConfigured);
    }
    if init_data.trim().is_empty() {
        return Err(AuthError::Missing);
    }

    let pairs: Vec<(String, String)> = form_urlencoded::parse(init_data.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let field = |name: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    let received = field("hash").ok_or(AuthError::MissingHash)?;
    let received = hex::decode(received).map_err(|_| AuthError::InvalidSignature)?;

    let check = data_check_string(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    let mut mac = secret_key(bot_token)?;
    mac.update(check.as_bytes());
    mac.verify_slice(&received)
        .map_err(|_| AuthError::InvalidSignature)?;

    let auth_date = match field("auth_date") {
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| AuthError::Malformed("auth_date"))?),
        None => None,
    };
    if let Some(max_age) = max_age {
        let signed_at = auth_date.ok_or(AuthError::MissingField("auth_date"))?;
        if now.saturating_sub(signed_at) > max_age.as_secs() as i64 {
            return Err(AuthError::Expired);
        }
    }

    let user_raw = field("user").ok_or(AuthError::MissingField("user"))?;
    let user: TelegramUser =
        serde_json::from_str(user_raw).map_err(|_| AuthError::Malformed("user"))?;

    Ok(InitData {
        user,
        auth_date,
        query_id: field("query_id").map(String::from),
    })
}

/// Produce a signed `initData` string for `fields`, as Telegram would.
/// Used by tests and local tooling.
pub fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> Result<String, AuthError> {
    let check = data_check_string(fields.iter().copied());
    let mut mac = secret_key(bot_token)?;
    mac.update(check.as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, value);
    }
    serializer.append_pair("hash", &hash);
    Ok(serializer.finish())
}

// =============================================================================
// TESTS
// =============================================================================
