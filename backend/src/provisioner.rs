use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::lifecycle::LifecycleError;
use crate::models::{Account, ConsultationRequest, ROLE_CLIENT};
use crate::store::{Consumption, ConsultationStore, StoreError};
use crate::tokens::{TokenError, ValidatedToken};
use crate::validation::validate_credential;

/// Creates client accounts from validated registration tokens.
///
/// The raw credential is hashed with Argon2 on the blocking pool and then
/// dropped; it is never stored or logged.
#[derive(Clone)]
pub struct ClientProvisioner {
    store: Arc<dyn ConsultationStore>,
}

impl ClientProvisioner {
    pub fn new(store: Arc<dyn ConsultationStore>) -> Self {
        Self { store }
    }

    /// Hashes `credential`, then consumes the token and inserts the account
    /// in one store unit. Returns only once both are committed.
    pub async fn provision(
        &self,
        validated: &ValidatedToken,
        presented_token: &str,
        credential: &str,
    ) -> Result<(ConsultationRequest, Account), LifecycleError> {
        validate_credential(credential).map_err(LifecycleError::Validation)?;

        let claim = &validated.claim;
        let consultation_id = claim.consultation_id();

        if let Some(existing) = self
            .store
            .find_account_by_email(&claim.email)
            .await
            .map_err(|err| LifecycleError::from_store(err, consultation_id))?
        {
            return Err(if existing.source_consultation_id == Some(consultation_id) {
                LifecycleError::Token(TokenError::AlreadyUsed)
            } else {
                warn!(
                    %consultation_id,
                    account_id = %existing.id,
                    "account already exists for invited email"
                );
                LifecycleError::DuplicateAccount
            });
        }

        let raw = credential.to_owned();
        let credential_hash = tokio::task::spawn_blocking(move || hash_password(&raw))
            .await
            .map_err(|err| anyhow!("credential hashing task failed: {err}"))?
            .context("failed to hash credential")?;

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: claim.email.clone(),
            credential_hash,
            name: validated.consultation.name.clone(),
            role: ROLE_CLIENT.to_string(),
            is_active: true,
            created_at: now,
            source_consultation_id: Some(consultation_id),
        };

        let consumption = Consumption {
            consultation_id,
            presented_token: presented_token.to_owned(),
            account,
            now,
        };

        match self.store.consume_registration(consumption).await {
            Ok((record, account)) => {
                info!(%consultation_id, account_id = %account.id, "client account provisioned");
                Ok((record, account))
            }
            Err(StoreError::NotFound) => Err(LifecycleError::Token(TokenError::Mismatch)),
            Err(StoreError::StaleState { current }) => {
                warn!(
                    %consultation_id,
                    status = %current,
                    "consultation left approved before consumption"
                );
                Err(LifecycleError::Token(TokenError::Mismatch))
            }
            Err(err) => Err(LifecycleError::from_store(err, consultation_id)),
        }
    }
}
