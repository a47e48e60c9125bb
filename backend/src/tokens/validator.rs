use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::{fingerprint, RegistrationClaim, SignedClaim, TokenError};
use crate::auth::jwt::JwtService;
use crate::lifecycle::LifecycleError;
use crate::models::ConsultationRequest;
use crate::store::{ConsultationStore, StoreError};

/// A registration claim that passed every check, with the consultation it names.
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    pub claim: RegistrationClaim,
    pub consultation: ConsultationRequest,
}

/// Checks presented registration tokens. Never writes to the store.
///
/// Order of checks: signature, purpose, expiry, then the stored invitation
/// (unused, and byte-identical to the presented token).
#[derive(Clone)]
pub struct TokenValidator {
    jwt: JwtService,
    store: Arc<dyn ConsultationStore>,
}

impl TokenValidator {
    pub fn new(jwt: JwtService, store: Arc<dyn ConsultationStore>) -> Self {
        Self { jwt, store }
    }

    pub async fn validate(&self, token: &str) -> Result<ValidatedToken, LifecycleError> {
        self.validate_at(token, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidatedToken, LifecycleError> {
        let claim = self
            .verify_claim(token, now)
            .map_err(|err| rejected(token, None, err, "claim check failed"))?;
        let consultation_id = claim.consultation_id();

        let consultation = match self.store.get(consultation_id).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                return Err(rejected(
                    token,
                    Some(&claim),
                    TokenError::Mismatch,
                    "consultation does not exist",
                ))
            }
            Err(err) => return Err(LifecycleError::from_store(err, consultation_id)),
        };

        if consultation.token_used {
            return Err(rejected(
                token,
                Some(&claim),
                TokenError::AlreadyUsed,
                "invitation already consumed",
            ));
        }
        if consultation.registration_token.as_deref() != Some(token) {
            return Err(rejected(
                token,
                Some(&claim),
                TokenError::Mismatch,
                "token differs from stored invitation",
            ));
        }
        if consultation.email != claim.email {
            return Err(rejected(
                token,
                Some(&claim),
                TokenError::Mismatch,
                "bound email differs from consultation",
            ));
        }

        Ok(ValidatedToken {
            claim,
            consultation,
        })
    }

    /// Stateless part of validation: signature, purpose tag and expiry.
    pub fn verify_claim(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RegistrationClaim, TokenError> {
        let claim = self
            .jwt
            .decode_signed(token)
            .map_err(|_| TokenError::InvalidSignature)?;

        let SignedClaim::ClientRegistration(claim) = claim else {
            return Err(TokenError::WrongPurpose);
        };

        let expires_at =
            DateTime::from_timestamp(claim.exp, 0).ok_or(TokenError::InvalidSignature)?;
        if expires_at <= now {
            return Err(TokenError::Expired);
        }

        Ok(claim)
    }
}

fn rejected(
    token: &str,
    claim: Option<&RegistrationClaim>,
    error: TokenError,
    detail: &'static str,
) -> LifecycleError {
    warn!(
        kind = error.kind(),
        token = %fingerprint(token),
        consultation_id = claim.map(|c| c.sub.to_string()).unwrap_or_default(),
        detail,
        "registration token rejected"
    );
    LifecycleError::Token(error)
}
