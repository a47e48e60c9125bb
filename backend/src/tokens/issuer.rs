use std::fmt;

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{PasswordResetClaim, RegistrationClaim, SignedClaim};
use crate::auth::jwt::JwtService;

/// A freshly minted token together with the instant it stops being valid.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &super::fingerprint(&self.token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    jwt: JwtService,
}

impl TokenIssuer {
    pub fn new(jwt: JwtService) -> Self {
        Self { jwt }
    }

    /// Mints a registration token binding `consultation_id` to `email`.
    pub fn issue(&self, consultation_id: Uuid, email: &str, ttl: Duration) -> Result<IssuedToken> {
        self.issue_at(consultation_id, email, ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        consultation_id: Uuid,
        email: &str,
        ttl: Duration,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken> {
        let expires_at = expiry(issued_at, ttl)?;
        let claim = SignedClaim::ClientRegistration(RegistrationClaim {
            sub: consultation_id,
            email: email.to_owned(),
            iss: self.jwt.issuer().to_owned(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        });
        let token = self
            .jwt
            .sign(&claim)
            .context("failed to sign registration token")?;
        Ok(IssuedToken {
            token,
            expires_at: truncate_to_seconds(expires_at),
        })
    }

    pub fn issue_password_reset(
        &self,
        account_id: Uuid,
        email: &str,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = expiry(now, ttl)?;
        let claim = SignedClaim::PasswordReset(PasswordResetClaim {
            sub: account_id,
            email: email.to_owned(),
            iss: self.jwt.issuer().to_owned(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        });
        let token = self
            .jwt
            .sign(&claim)
            .context("failed to sign password reset token")?;
        Ok(IssuedToken {
            token,
            expires_at: truncate_to_seconds(expires_at),
        })
    }
}

fn expiry(issued_at: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    ensure!(ttl > Duration::zero(), "token ttl must be positive, got {ttl}");
    issued_at
        .checked_add_signed(ttl)
        .with_context(|| format!("token ttl {ttl} overflows the expiry timestamp"))
}

/// Stored expiry matches the whole-second `exp` inside the token.
fn truncate_to_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(instant.timestamp(), 0).unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn issuer() -> TokenIssuer {
        let jwt = JwtService::new(
            b"issuer-secret",
            "onboarding",
            "onboarding-admin",
            Duration::minutes(5),
        )
        .unwrap();
        TokenIssuer::new(jwt)
    }

    #[test]
    fn embeds_consultation_email_and_expiry() {
        let issuer = issuer();
        let id = Uuid::new_v4();
        let issued_at = Utc::now();
        let issued = issuer
            .issue_at(id, "a@x.com", Duration::days(7), issued_at)
            .unwrap();

        let claim = issuer.jwt.decode_signed(&issued.token).unwrap();
        let SignedClaim::ClientRegistration(claim) = claim else {
            panic!("expected a registration claim");
        };
        assert_eq!(claim.sub, id);
        assert_eq!(claim.email, "a@x.com");
        assert_eq!(claim.exp, (issued_at + Duration::days(7)).timestamp());
        assert_eq!(issued.expires_at.timestamp(), claim.exp);
    }

    #[test]
    fn identical_inputs_in_the_same_second_still_differ() {
        let issuer = issuer();
        let id = Uuid::new_v4();
        let at = Utc::now();
        let tokens: HashSet<String> = (0..50)
            .map(|_| issuer.issue_at(id, "a@x.com", Duration::hours(1), at).unwrap().token)
            .collect();
        assert_eq!(tokens.len(), 50);
    }

    #[test]
    fn refuses_non_positive_and_overflowing_ttls() {
        let issuer = issuer();
        let id = Uuid::new_v4();
        assert!(issuer.issue(id, "a@x.com", Duration::zero()).is_err());
        assert!(issuer.issue(id, "a@x.com", Duration::hours(-1)).is_err());
        assert!(issuer.issue(id, "a@x.com", Duration::MAX).is_err());
        assert!(issuer
            .issue_password_reset(id, "a@x.com", Duration::seconds(-5))
            .is_err());
    }

    #[test]
    fn debug_output_hides_the_token() {
        let issued = issuer()
            .issue(Uuid::new_v4(), "a@x.com", Duration::hours(1))
            .unwrap();
        let rendered = format!("{issued:?}");
        assert!(!rendered.contains(&issued.token));
    }
}
