//! Signed, time-limited bearer tokens.
//!
//! Tokens are stateless: nothing is stored server side and there is no
//! revocation. The embedded role is a snapshot taken at issuance.
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rbac_common::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Settings;

/// Token payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject identity id
    pub sub: Uuid,
    /// Role at issuance time
    pub role: Role,
    /// Issued-at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
}

/// Which configured lifetime a token gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Login and registration
    Session,
    /// Re-issued after a password change
    Reissue,
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token is invalid or expired")]
    Invalid,

    #[error("token could not be signed: {0}")]
    Signing(String),
}

/// Issues and verifies HS256 tokens with a server-held secret
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    session_ttl: Duration,
    reissue_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, session_ttl: Duration, reissue_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            session_ttl,
            reissue_ttl,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.auth.jwt_secret,
            settings.session_ttl(),
            settings.reissue_ttl(),
        )
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Session => self.session_ttl,
            TokenKind::Reissue => self.reissue_ttl,
        }
    }

    /// Sign a token for `subject` valid for the lifetime of `kind`
    pub fn issue(&self, subject: Uuid, role: Role, kind: TokenKind) -> Result<String, TokenError> {
        self.issue_at(subject, role, Utc::now(), self.ttl(kind))
    }

    /// Sign a token with an explicit issuance time and lifetime
    pub fn issue_at(
        &self,
        subject: Uuid,
        role: Role,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| TokenError::Signing("ttl out of range".to_string()))?;
        let claims = Claims {
            sub: subject,
            role,
            iat: issued_at.timestamp(),
            exp: issued_at.timestamp().saturating_add(ttl_secs),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature and expiry and return the claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                TokenError::Invalid
            })
    }
}
