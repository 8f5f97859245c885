//! Signed access, refresh and password-reset tokens.
//!
//! Tokens are compact HS256 JWTs: `base64url(header).base64url(claims).base64url(mac)`.
//! Access and password-reset tokens are signed with the access secret. Refresh tokens use
//! the refresh secret when one is configured and fall back to the access secret otherwise.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use super::store::Role;

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 60 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

const ALGORITHM: &str = "HS256";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    PasswordReset,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::PasswordReset => "password_reset",
        }
    }
}

/// Who a token speaks for. Shared by every token minted for the same user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.sub,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
    #[error("unexpected token kind")]
    WrongKind,
    #[error("failed to encode token")]
    Encoding,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenConfig {
    access_secret: SecretString,
    refresh_secret: Option<SecretString>,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenConfig {
    #[must_use]
    pub fn new(access_secret: SecretString) -> Self {
        Self {
            access_secret,
            refresh_secret: None,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_refresh_secret(mut self, secret: Option<SecretString>) -> Self {
        self.refresh_secret = secret;
        self
    }

    /// Lifetimes below one second are raised to one so `exp` always follows `iat`.
    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds.max(1);
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &"***")
            .field(
                "refresh_secret",
                &self.refresh_secret.as_ref().map(|_| "***"),
            )
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .finish()
    }
}

/// Issues and verifies tokens for every [`TokenKind`].
#[derive(Clone, Debug)]
pub struct TokenService {
    config: TokenConfig,
}

impl TokenService {
    #[must_use]
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    fn secret_for(&self, kind: TokenKind) -> &[u8] {
        let secret = match kind {
            TokenKind::Refresh => self
                .config
                .refresh_secret
                .as_ref()
                .unwrap_or(&self.config.access_secret),
            TokenKind::Access | TokenKind::PasswordReset => &self.config.access_secret,
        };
        secret.expose_secret().as_bytes()
    }

    #[must_use]
    pub fn ttl_seconds(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Refresh => self.config.refresh_ttl_seconds,
            TokenKind::Access | TokenKind::PasswordReset => self.config.access_ttl_seconds,
        }
    }

    /// Issue a token of `kind` for `identity`, valid from now.
    ///
    /// # Errors
    /// Returns [`TokenError::Encoding`] if the token cannot be serialized or signed.
    pub fn issue(&self, identity: &Identity, kind: TokenKind) -> Result<String, TokenError> {
        self.issue_at(identity, kind, now_unix_seconds())
    }

    /// Issue a token as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    /// Returns [`TokenError::Encoding`] if the token cannot be serialized or signed.
    pub fn issue_at(
        &self,
        identity: &Identity,
        kind: TokenKind,
        now: i64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: identity.user_id,
            email: identity.email.clone(),
            role: identity.role,
            kind,
            iat: now,
            exp: now.saturating_add(self.ttl_seconds(kind)),
        };
        sign_hs256(self.secret_for(kind), &claims)
    }

    /// Issue an access and a refresh token sharing the same identity.
    ///
    /// # Errors
    /// Returns [`TokenError::Encoding`] if either token cannot be produced.
    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        let now = now_unix_seconds();
        Ok(TokenPair {
            access_token: self.issue_at(identity, TokenKind::Access, now)?,
            refresh_token: self.issue_at(identity, TokenKind::Refresh, now)?,
        })
    }

    /// Verify a token of the expected `kind` against that kind's secret.
    ///
    /// # Errors
    /// Returns the [`verify_hs256`] failure, or [`TokenError::WrongKind`] if the token is
    /// valid but tagged with a different kind.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        self.verify_at(token, kind, now_unix_seconds())
    }

    /// [`Self::verify`] with an explicit clock.
    ///
    /// # Errors
    /// See [`Self::verify`].
    pub fn verify_at(&self, token: &str, kind: TokenKind, now: i64) -> Result<Claims, TokenError> {
        let claims = verify_hs256(token, self.secret_for(kind), now)?;
        if claims.kind == kind {
            Ok(claims)
        } else {
            Err(TokenError::WrongKind)
        }
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|_| TokenError::Encoding)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(segment).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

fn mac_for(secret: &[u8], signing_input: &str) -> Result<HmacSha256, TokenError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::Encoding)?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

fn split_token(token: &str) -> Result<(&str, &str, &str), TokenError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(claims), Some(signature), None)
            if !header.is_empty() && !claims.is_empty() && !signature.is_empty() =>
        {
            Ok((header, claims, signature))
        }
        _ => Err(TokenError::Malformed),
    }
}

/// Create an HS256 signed token for `claims`.
///
/// # Errors
/// Returns [`TokenError::Encoding`] if the header or claims cannot be encoded.
pub fn sign_hs256(secret: &[u8], claims: &Claims) -> Result<String, TokenError> {
    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature = mac_for(secret, &signing_input)?.finalize().into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an HS256 token and return its claims.
///
/// Checks run in order: structure, signature, claims, expiry. A token is expired once
/// `now_unix_seconds >= exp`.
///
/// # Errors
/// - [`TokenError::Malformed`] if the token cannot be parsed or names another algorithm,
/// - [`TokenError::InvalidSignature`] if the MAC does not match (tampering, wrong secret),
/// - [`TokenError::Expired`] if the token is past its expiry.
pub fn verify_hs256(
    token: &str,
    secret: &[u8],
    now_unix_seconds: i64,
) -> Result<Claims, TokenError> {
    let (header_b64, claims_b64, signature_b64) = split_token(token)?;

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != ALGORITHM {
        return Err(TokenError::Malformed);
    }

    let signature =
        Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| TokenError::Malformed)?;
    let signing_input = format!("{header_b64}.{claims_b64}");
    mac_for(secret, &signing_input)?
        .verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let claims: Claims = b64d_json(claims_b64)?;
    if now_unix_seconds >= claims.exp {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

/// Read the claims of a token without checking its signature or expiry.
///
/// Only for introspection (for example reporting when a token expires). Never authorize a
/// request from these claims.
#[must_use]
pub fn decode_unverified(token: &str) -> Option<Claims> {
    let (_, claims_b64, _) = split_token(token).ok()?;
    b64d_json(claims_b64).ok()
}

fn now_unix_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}
