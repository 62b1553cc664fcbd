use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use stashpad_types::api::{Claims, PurposeClaims};

pub const EMAIL_VERIFY: &str = "email_verify";
pub const PASSWORD_RESET: &str = "password_reset";

pub fn session_lifetime() -> Duration {
    Duration::days(7)
}

pub fn verify_lifetime() -> Duration {
    Duration::hours(24)
}

pub fn reset_lifetime() -> Duration {
    Duration::hours(1)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("link has expired")]
    Expired,
    #[error("link is invalid")]
    Invalid,
}

pub fn create_session_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (Utc::now() + session_lifetime()).timestamp() as usize,
    };
    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}

pub fn decode_session_token(secret: &str, token: &str) -> Result<Claims, TokenError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(classify)
}

/// Short stable digest of a stored password hash. Embedding it in a
/// purpose token makes the token useless once the password changes.
pub fn password_fingerprint(password_hash: &str) -> String {
    let digest = hex::encode(Sha256::digest(password_hash.as_bytes()));
    digest[..16].to_string()
}

pub fn create_purpose_token(
    secret: &str,
    user_id: Uuid,
    purpose: &str,
    password_hash: &str,
    lifetime: Duration,
) -> anyhow::Result<String> {
    let claims = PurposeClaims {
        sub: user_id,
        purpose: purpose.to_string(),
        pwd: password_fingerprint(password_hash),
        exp: (Utc::now() + lifetime).timestamp() as usize,
    };
    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}

/// Signature, expiry and purpose only. Callers still have to compare
/// `pwd` against the user's current hash with [`matches_password`].
pub fn decode_purpose_token(secret: &str, token: &str, purpose: &str) -> Result<PurposeClaims, TokenError> {
    let claims = decode::<PurposeClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map_err(classify)?
        .claims;
    if claims.purpose != purpose {
        return Err(TokenError::Invalid);
    }
    Ok(claims)
}

pub fn matches_password(claims: &PurposeClaims, password_hash: &str) -> bool {
    claims.pwd == password_fingerprint(password_hash)
}

fn classify(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    }
}
