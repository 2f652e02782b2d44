use anyhow::{anyhow, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub secret: String,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
    pub aud: String,
    pub iss: String,
    pub token_use: TokenUse,
}

impl TokenClaims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse::<i64>()
            .map_err(|_| anyhow!("token subject is not a user id"))
    }
}

pub fn issue_token(
    user_id: i64,
    token_use: TokenUse,
    config: &JwtConfig,
) -> Result<(String, TokenClaims)> {
    let ttl = match token_use {
        TokenUse::Access => config.access_ttl_seconds,
        TokenUse::Refresh => config.refresh_ttl_seconds,
    };
    let now = unix_seconds()?;
    let exp = now
        .checked_add(ttl)
        .ok_or_else(|| anyhow!("token expiry overflow"))?;

    let claims = TokenClaims {
        sub: user_id.to_string(),
        exp: exp as usize,
        iat: now as usize,
        jti: Uuid::new_v4().to_string(),
        aud: config.audience.clone(),
        iss: config.issuer.clone(),
        token_use,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok((token, claims))
}

/// Verifies signature, issuer, audience and expiry, then checks that the
/// token was minted for `expected` use.
pub fn verify_token(token: &str, expected: TokenUse, config: &JwtConfig) -> Result<TokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.audience.as_str()]);
    validation.set_issuer(&[config.issuer.as_str()]);

    let data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;
    if data.claims.token_use != expected {
        return Err(anyhow!("token use mismatch"));
    }
    Ok(data.claims)
}

pub fn unix_seconds() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .map_err(|_| anyhow!("invalid system clock"))
}
