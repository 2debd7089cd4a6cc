//! Verification of the opaque signed init blob carried on control requests.
//!
//! The blob is a `&`-separated list of `key=value` pairs carrying `userId`,
//! `locale`, `authDate`, and an HMAC-SHA256 `hash` over the remaining pairs
//! (sorted by key, joined with newlines) keyed by the shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::dto::protocol::{UserId, UserLocale};

type HmacSha256 = Hmac<Sha256>;

/// Signed blobs older than this are rejected.
pub const INIT_DATA_MAX_AGE_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid init data")]
    Invalid,
    #[error("init data expired")]
    Expired,
}

/// Identity extracted from a verified init blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitData {
    pub user_id: UserId,
    pub locale: UserLocale,
    pub auth_date: i64,
}

/// Parse the blob without checking its signature or freshness.
///
/// Debug builds accept unsigned blobs through this path; release mode goes
/// through [`verify_init_data`].
pub fn parse_init_data(raw: &str) -> Result<InitData, AuthError> {
    let mut user_id = None;
    let mut locale = UserLocale::default();
    let mut auth_date = None;

    for (key, value) in pairs(raw) {
        match key {
            "userId" if !value.is_empty() => user_id = Some(UserId(value.to_owned())),
            "locale" => locale = UserLocale::from_tag(value),
            "authDate" => auth_date = value.parse::<i64>().ok(),
            _ => {}
        }
    }

    Ok(InitData {
        user_id: user_id.ok_or(AuthError::Invalid)?,
        locale,
        auth_date: auth_date.ok_or(AuthError::Invalid)?,
    })
}

/// Verify the blob's signature and freshness, then parse it.
pub fn verify_init_data(raw: &str, secret: &str, now: i64) -> Result<InitData, AuthError> {
    let provided = pairs(raw)
        .find(|(key, _)| *key == "hash")
        .map(|(_, value)| value)
        .ok_or(AuthError::Invalid)?;
    let signature = hex::decode(provided).map_err(|_| AuthError::Invalid)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::Invalid)?;
    mac.update(check_string(raw).as_bytes());
    mac.verify_slice(&signature).map_err(|_| AuthError::Invalid)?;

    let data = parse_init_data(raw)?;
    if now - data.auth_date > INIT_DATA_MAX_AGE_SECONDS {
        return Err(AuthError::Expired);
    }
    Ok(data)
}

/// Produce a signed blob for the given identity.
pub fn sign_init_data(user_id: &UserId, locale: UserLocale, auth_date: i64, secret: &str) -> String {
    let unsigned = format!(
        "authDate={auth_date}&locale={}&userId={user_id}",
        locale.as_str()
    );
    let hash = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(check_string(&unsigned).as_bytes());
            hex::encode(mac.finalize().into_bytes())
        }
        Err(_) => String::new(),
    };
    format!("{unsigned}&hash={hash}")
}

fn pairs(raw: &str) -> impl Iterator<Item = (&str, &str)> {
    raw.split('&')
        .filter_map(|pair| pair.split_once('='))
}

/// Pairs except `hash`, sorted by key, joined with newlines.
fn check_string(raw: &str) -> String {
    let mut entries: Vec<(&str, &str)> = pairs(raw).filter(|(key, _)| *key != "hash").collect();
    entries.sort();
    entries
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}
