use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::Deserialize;
use thiserror::Error;

use marquee_model::{Claims, Role, TokenType};

use crate::infra::{config::AuthConfig, errors::AppError};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::unauthorized("token expired"),
            TokenError::Invalid(_) => AppError::unauthorized("invalid token"),
        }
    }
}

/// Signing material for access and refresh tokens. Each token type has its
/// own secret, so a refresh token never verifies as an access token.
#[derive(Clone)]
pub struct JwtKeys {
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_token_secret.as_bytes().to_vec(),
            refresh_secret: config.refresh_token_secret.as_bytes().to_vec(),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    fn secret(&self, token_type: TokenType) -> &[u8] {
        match token_type {
            TokenType::Access => &self.access_secret,
            TokenType::Refresh => &self.refresh_secret,
        }
    }

    fn ttl(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        }
    }

    pub fn issue(&self, sub: i64, role: Role, token_type: TokenType) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub,
            role,
            token_type,
            iat: now,
            exp: now + self.ttl(token_type).as_secs() as i64,
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret(token_type)),
        )?)
    }

    /// Verify signature and expiry with the secret of `token_type`.
    pub fn verify(&self, token: &str, token_type: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(token_type)),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(err),
        })
    }
}

#[derive(Debug, Deserialize)]
struct UnverifiedPayload {
    #[serde(rename = "type")]
    token_type: Option<String>,
    exp: Option<i64>,
}

/// Fields read from a token payload without checking its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeekedToken {
    pub token_type: Option<String>,
    pub exp: Option<i64>,
}

/// Decode the payload segment of a JWT without verifying it. Returns `None`
/// when the token is not structurally a JWT.
pub fn peek(token: &str) -> Option<PeekedToken> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let payload: UnverifiedPayload = serde_json::from_slice(&bytes).ok()?;
    Some(PeekedToken {
        token_type: payload.token_type,
        exp: payload.exp,
    })
}
