use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::config::AppConfig;
use crate::tokens::{AdminSessionClaim, SignedClaim};

pub const ADMIN_ROLE: &str = "admin";

/// HS256 signing and verification for every token the service mints.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    admin_audience: String,
    admin_expiry: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.token_secret.as_bytes(),
            &config.token_issuer,
            &config.admin_token_audience,
            Duration::minutes(config.admin_token_expiry_minutes),
        )
    }

    pub fn new(
        secret: &[u8],
        issuer: &str,
        admin_audience: &str,
        admin_expiry: Duration,
    ) -> Result<Self> {
        if secret.is_empty() {
            return Err(anyhow!("token secret must not be empty"));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.to_owned(),
            admin_audience: admin_audience.to_owned(),
            admin_expiry,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn sign(&self, claim: &SignedClaim) -> jsonwebtoken::errors::Result<String> {
        encode(&Header::new(Algorithm::HS256), claim, &self.encoding)
    }

    /// Verifies signature and issuer only. Expiry is left to the caller so it
    /// can be reported after the purpose check.
    pub fn decode_signed(&self, token: &str) -> jsonwebtoken::errors::Result<SignedClaim> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<SignedClaim>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    pub fn generate_admin_token(&self, subject: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.admin_expiry;
        let claim = SignedClaim::AdminSession(AdminSessionClaim {
            sub: subject.to_owned(),
            role: ADMIN_ROLE.to_owned(),
            iss: self.issuer.clone(),
            aud: self.admin_audience.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        });

        Ok(self.sign(&claim)?)
    }

    pub fn verify_admin_token(&self, token: &str) -> Result<AdminSessionClaim> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.admin_audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<SignedClaim>(token, &self.decoding, &validation)?;
        match data.claims {
            SignedClaim::AdminSession(claim) if claim.role == ADMIN_ROLE => Ok(claim),
            other => Err(anyhow!("expected admin session token, got {}", other.purpose())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::RegistrationClaim;
    use uuid::Uuid;

    fn service() -> JwtService {
        JwtService::new(b"unit-secret", "onboarding", "onboarding-admin", Duration::minutes(5))
            .unwrap()
    }

    #[test]
    fn admin_token_roundtrip() {
        let jwt = service();
        let token = jwt.generate_admin_token("ops@example.com").unwrap();
        let claim = jwt.verify_admin_token(&token).unwrap();
        assert_eq!(claim.sub, "ops@example.com");
        assert_eq!(claim.role, ADMIN_ROLE);
    }

    #[test]
    fn registration_token_is_not_an_admin_session() {
        let jwt = service();
        let now = Utc::now();
        let token = jwt
            .sign(&SignedClaim::ClientRegistration(RegistrationClaim {
                sub: Uuid::new_v4(),
                email: "a@x.com".into(),
                iss: "onboarding".into(),
                iat: now.timestamp(),
                exp: (now + Duration::hours(1)).timestamp(),
                jti: Uuid::new_v4(),
            }))
            .unwrap();
        assert!(jwt.verify_admin_token(&token).is_err());
    }

    #[test]
    fn other_secret_fails_signature_check() {
        let jwt = service();
        let other = JwtService::new(b"other", "onboarding", "onboarding-admin", Duration::minutes(5))
            .unwrap();
        let token = other.generate_admin_token("ops").unwrap();
        assert!(jwt.decode_signed(&token).is_err());
    }

    #[test]
    fn rejects_empty_secret() {
        assert!(JwtService::new(b"", "i", "a", Duration::minutes(1)).is_err());
    }
}
