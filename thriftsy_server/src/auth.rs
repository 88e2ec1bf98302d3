//! Access token handling.
//!
//! Buyers, sellers and administrators authenticate with an HS256-signed JWT in the `Authorization: Bearer` header.
//! The `sub` claim carries the marketplace user id and `roles` lists what the holder may do. Tokens are issued by the
//! marketplace's account service, which shares the secret in `TSY_JWT_SECRET`; [`TokenIssuer`] exists for tooling
//! and tests.
use std::{
    fmt::{Debug, Display},
    future::{ready, Ready},
};

use actix_web::{dev::Payload, http::header::HeaderMap, web, FromRequest, HttpMessage, HttpRequest};
use chrono::{DateTime, Utc};
use jwt_compact::{
    alg::{Hs256, Hs256Key},
    AlgorithmExt,
    Claims,
    Header,
    TimeOptions,
    UntrustedToken,
};
use log::*;
use serde::{Deserialize, Deserializer, Serialize};
use thriftsy_engine::db_types::UserId;

use crate::{config::AuthConfig, errors::AuthError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Any registered buyer or seller
    User,
    /// Marketplace staff. Can read every order and the payment ledger.
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

fn default_roles() -> Vec<Role> {
    vec![Role::User]
}

/// The account service writes user ids either as numbers or as numeric strings.
fn deserialize_user_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UserId, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }
    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(UserId(n)),
        RawId::Text(s) => s.parse::<UserId>().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    #[serde(alias = "userId", alias = "id", deserialize_with = "deserialize_user_id")]
    pub sub: UserId,
    #[serde(default = "default_roles")]
    pub roles: Vec<Role>,
}

impl JwtClaims {
    pub fn new(sub: UserId, roles: Vec<Role>) -> Self {
        Self { sub, roles }
    }

    pub fn user_id(&self) -> UserId {
        self.sub
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

//-------------------------------------------------  TokenValidator  ---------------------------------------------------
#[derive(Clone)]
pub struct TokenValidator {
    key: Hs256Key,
    time_options: TimeOptions,
}

impl Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenValidator(HS256)")
    }
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let key = Hs256Key::new(config.jwt_secret.reveal().as_bytes());
        Self { key, time_options: TimeOptions::default() }
    }

    /// Checks the signature and expiry of `token` and returns its claims. Tokens without an expiry are refused.
    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let untrusted = UntrustedToken::new(token).map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
        let token = Hs256
            .validator::<JwtClaims>(&self.key)
            .validate(&untrusted)
            .map_err(|e| AuthError::ValidationError(e.to_string()))?;
        token.claims().validate_expiration(&self.time_options).map_err(|e| AuthError::ValidationError(e.to_string()))?;
        let (_, claims) = token.into_parts();
        trace!("💻️ Access token validated for {}", claims.custom.sub);
        Ok(claims.custom)
    }
}

//-------------------------------------------------   TokenIssuer   ---------------------------------------------------
pub struct TokenIssuer {
    key: Hs256Key,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: Hs256Key::new(config.jwt_secret.reveal().as_bytes()) }
    }

    /// Issues an access token carrying `claims` that expires at `expiry`.
    pub fn issue_token(&self, claims: JwtClaims, expiry: DateTime<Utc>) -> Result<String, AuthError> {
        let header = Header::empty().with_token_type("JWT");
        let mut claims = Claims::new(claims);
        claims.expiration = Some(expiry);
        claims.issued_at = Some(Utc::now());
        Hs256.token(&header, &claims, &self.key).map_err(|e| AuthError::ValidationError(format!("{e:?}")))
    }
}

//-------------------------------------------------   Extractors   ----------------------------------------------------
/// Returns the bearer token, `None` if there is no `Authorization` header at all.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let value = match headers.get("Authorization") {
        Some(v) => v,
        None => return Ok(None),
    };
    let value = value.to_str().map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected a Bearer token".into()))?;
    Ok(Some(token))
}

/// Reads the claims placed on the request by the ACL middleware, or validates the bearer token directly.
pub fn claims_from_request(req: &HttpRequest) -> Result<Option<JwtClaims>, AuthError> {
    if let Some(claims) = req.extensions().get::<JwtClaims>() {
        return Ok(Some(claims.clone()));
    }
    let token = match bearer_token(req.headers())? {
        Some(t) => t,
        None => return Ok(None),
    };
    let validator = req.app_data::<web::Data<TokenValidator>>().ok_or(AuthError::ValidatorNotConfigured)?;
    let claims = validator.validate(token).map_err(|e| {
        debug!("💻️ Rejected access token. {e}");
        e
    })?;
    Ok(Some(claims))
}

impl FromRequest for JwtClaims {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(claims_from_request(req).and_then(|c| c.ok_or(AuthError::MissingToken)))
    }
}

/// The caller's claims if they sent a token. A token that is present but invalid is still an error.
#[derive(Debug, Clone)]
pub struct MaybeClaims(pub Option<JwtClaims>);

impl FromRequest for MaybeClaims {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(claims_from_request(req).map(MaybeClaims))
    }
}
