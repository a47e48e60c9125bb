//! Signed claims used across onboarding flows.
//!
//! Every token minted with the server secret carries a `purpose`
//! discriminant, decoded into [`SignedClaim`]. Callers match on the variant
//! they expect, so a decoder for one flow cannot accept a token minted for
//! another even though the signature checks out.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

pub mod issuer;
pub mod validator;

pub use issuer::{IssuedToken, TokenIssuer};
pub use validator::{TokenValidator, ValidatedToken};

pub const REGISTRATION_PURPOSE: &str = "client_registration";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "purpose", rename_all = "snake_case")]
pub enum SignedClaim {
    ClientRegistration(RegistrationClaim),
    PasswordReset(PasswordResetClaim),
    AdminSession(AdminSessionClaim),
    /// Any purpose this build does not know about.
    #[serde(other)]
    Unrecognized,
}

impl SignedClaim {
    pub fn purpose(&self) -> &'static str {
        match self {
            SignedClaim::ClientRegistration(_) => REGISTRATION_PURPOSE,
            SignedClaim::PasswordReset(_) => "password_reset",
            SignedClaim::AdminSession(_) => "admin_session",
            SignedClaim::Unrecognized => "unrecognized",
        }
    }
}

/// Decoded registration token: proves consultation `sub` was approved for `email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationClaim {
    pub sub: Uuid,
    pub email: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl RegistrationClaim {
    pub fn consultation_id(&self) -> Uuid {
        self.sub
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetClaim {
    pub sub: Uuid,
    pub email: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSessionClaim {
    pub sub: String,
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Reasons a registration token is refused.
///
/// The variants are kept apart for the audit log; callers outside the
/// service only ever see [`TokenError::PUBLIC_MESSAGE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token was minted for a different purpose")]
    WrongPurpose,
    #[error("token has expired")]
    Expired,
    #[error("token has already been used")]
    AlreadyUsed,
    #[error("token does not match the stored invitation")]
    Mismatch,
}

impl TokenError {
    pub const PUBLIC_MESSAGE: &'static str = "invalid or expired registration link";

    pub fn kind(self) -> &'static str {
        match self {
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::WrongPurpose => "wrong_purpose",
            TokenError::Expired => "expired",
            TokenError::AlreadyUsed => "already_used",
            TokenError::Mismatch => "mismatch",
        }
    }
}

/// Short, non-reversible identifier for a token, safe to write to logs.
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}
