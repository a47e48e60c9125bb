//! Consultation lifecycle: submission, admin decisions, invitation and
//! one-time registration.
//!
//! Each operation is a single conditional write against the store. The
//! coordinator keeps no state of its own between calls, so any number of
//! instances can serve requests against the same store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::jwt::JwtService;
use crate::events::{EventSink, LifecycleEvent};
use crate::models::{Account, ConsultationRequest, NewConsultation};
use crate::provisioner::ClientProvisioner;
use crate::status::ConsultationStatus;
use crate::store::{ConsultationStore, StoreError, Transition};
use crate::tokens::{TokenIssuer, TokenValidator, ValidatedToken};
use crate::validation::validate_submission;

mod error;

pub use error::{LifecycleError, LifecycleResult};

pub const DEFAULT_INVITATION_TTL_HOURS: i64 = 24 * 7;
pub const MAX_INVITATION_TTL_HOURS: i64 = 24 * 30;

pub struct LifecycleCoordinator {
    store: Arc<dyn ConsultationStore>,
    issuer: TokenIssuer,
    validator: TokenValidator,
    provisioner: ClientProvisioner,
    events: Arc<dyn EventSink>,
    invitation_ttl: Duration,
}

impl LifecycleCoordinator {
    pub fn new(
        store: Arc<dyn ConsultationStore>,
        jwt: JwtService,
        events: Arc<dyn EventSink>,
        invitation_ttl: Duration,
    ) -> Self {
        Self {
            issuer: TokenIssuer::new(jwt.clone()),
            validator: TokenValidator::new(jwt, store.clone()),
            provisioner: ClientProvisioner::new(store.clone()),
            store,
            events,
            invitation_ttl,
        }
    }

    pub async fn submit(
        &self,
        submission: NewConsultation,
    ) -> LifecycleResult<ConsultationRequest> {
        let submission = validate_submission(submission).map_err(LifecycleError::Validation)?;
        let record = ConsultationRequest::new(Uuid::new_v4(), submission, Utc::now());
        let id = record.id;
        let record = self
            .store
            .insert(record)
            .await
            .map_err(|err| LifecycleError::from_store(err, id))?;

        info!(consultation_id = %record.id, status = %record.status, "consultation submitted");
        self.publish(LifecycleEvent::ConsultationSubmitted {
            consultation_id: record.id,
            email: record.email.clone(),
            name: record.name.clone(),
        })
        .await;
        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> LifecycleResult<ConsultationRequest> {
        self.store
            .get(id)
            .await
            .map_err(|err| LifecycleError::from_store(err, id))
    }

    pub async fn list(
        &self,
        status: Option<ConsultationStatus>,
    ) -> LifecycleResult<Vec<ConsultationRequest>> {
        self.store
            .list(status)
            .await
            .map_err(|err| LifecycleError::from_store(err, Uuid::nil()))
    }

    /// `pending → under_review`. Repeating it on a record already under
    /// review returns the record unchanged.
    pub async fn begin_review(&self, id: Uuid) -> LifecycleResult<ConsultationRequest> {
        let current = self.get(id).await?;
        if current.status == ConsultationStatus::UnderReview {
            return Ok(current);
        }
        self.advance(
            id,
            "review",
            current.status,
            Transition::new(&[ConsultationStatus::Pending], ConsultationStatus::UnderReview),
        )
        .await
    }

    pub async fn approve(
        &self,
        id: Uuid,
        admin_notes: Option<String>,
    ) -> LifecycleResult<ConsultationRequest> {
        self.approve_with_ttl(id, admin_notes, self.invitation_ttl)
            .await
    }

    /// Approves a lead and mints its registration token.
    ///
    /// Approving an already approved record with no new notes is a no-op
    /// success, so a caller can retry after a lost response.
    pub async fn approve_with_ttl(
        &self,
        id: Uuid,
        admin_notes: Option<String>,
        ttl: Duration,
    ) -> LifecycleResult<ConsultationRequest> {
        check_invitation_ttl(ttl)?;
        let current = self.get(id).await?;
        if let Some(record) = repeat_approval(&current, &admin_notes) {
            return Ok(record);
        }
        if !current.status.can_transition_to(ConsultationStatus::Approved) {
            return Err(LifecycleError::invalid_state("approve", current.status));
        }

        let issued = self.issuer.issue(current.id, &current.email, ttl)?;
        let change = Transition::new(
            &[ConsultationStatus::Pending, ConsultationStatus::UnderReview],
            ConsultationStatus::Approved,
        )
        .with_notes(admin_notes.clone())
        .with_token(issued.clone());

        let record = match self.store.transition(id, change).await {
            Ok(record) => record,
            Err(StoreError::StaleState { current: status }) => {
                // Lost a race with another approval; accept it if it matches.
                let latest = self.get(id).await?;
                return repeat_approval(&latest, &admin_notes)
                    .ok_or_else(|| LifecycleError::invalid_state("approve", status));
            }
            Err(err) => return Err(LifecycleError::from_store(err, id)),
        };

        info!(
            consultation_id = %record.id,
            from = %current.status,
            to = %record.status,
            expires_at = %issued.expires_at,
            "consultation approved"
        );
        self.publish(LifecycleEvent::ConsultationApproved {
            consultation_id: record.id,
            email: record.email.clone(),
            name: record.name.clone(),
            registration_token: issued.token,
            expires_at: issued.expires_at,
        })
        .await;
        Ok(record)
    }

    /// Terminal rejection of a lead. Rejecting twice is an invalid state.
    pub async fn reject(
        &self,
        id: Uuid,
        admin_notes: Option<String>,
    ) -> LifecycleResult<ConsultationRequest> {
        let current = self.get(id).await?;
        let record = self
            .close(id, "reject", &current, ConsultationStatus::Rejected, admin_notes)
            .await?;
        self.publish(LifecycleEvent::ConsultationRejected {
            consultation_id: record.id,
            email: record.email.clone(),
            name: record.name.clone(),
        })
        .await;
        Ok(record)
    }

    /// The prospect withdrew before a decision was made.
    pub async fn cancel(
        &self,
        id: Uuid,
        admin_notes: Option<String>,
    ) -> LifecycleResult<ConsultationRequest> {
        let current = self.get(id).await?;
        self.close(id, "cancel", &current, ConsultationStatus::Cancelled, admin_notes)
            .await
    }

    /// Replaces the stored token of an approved, unconsumed invitation.
    /// The previous token stops validating immediately.
    pub async fn reissue_invitation(
        &self,
        id: Uuid,
        ttl: Option<Duration>,
    ) -> LifecycleResult<ConsultationRequest> {
        let ttl = ttl.unwrap_or(self.invitation_ttl);
        check_invitation_ttl(ttl)?;
        let current = self.get(id).await?;
        if current.status != ConsultationStatus::Approved || current.token_used {
            return Err(LifecycleError::invalid_state(
                "reissue the invitation of",
                current.status,
            ));
        }

        let issued = self.issuer.issue(current.id, &current.email, ttl)?;
        let change = Transition::new(&[ConsultationStatus::Approved], ConsultationStatus::Approved)
            .with_token(issued.clone())
            .requiring_unused_token();
        let record = match self.store.transition(id, change).await {
            Ok(record) => record,
            Err(StoreError::StaleState { current }) => {
                return Err(LifecycleError::invalid_state(
                    "reissue the invitation of",
                    current,
                ))
            }
            Err(err) => return Err(LifecycleError::from_store(err, id)),
        };

        info!(
            consultation_id = %record.id,
            expires_at = %issued.expires_at,
            "invitation reissued"
        );
        self.publish(LifecycleEvent::InvitationReissued {
            consultation_id: record.id,
            email: record.email.clone(),
            name: record.name.clone(),
            registration_token: issued.token,
            expires_at: issued.expires_at,
        })
        .await;
        Ok(record)
    }

    /// Runs every token check without consuming anything.
    pub async fn inspect_token(&self, token: &str) -> LifecycleResult<ValidatedToken> {
        self.validator.validate(token).await
    }

    /// Exchanges a registration token and a credential for a client account.
    ///
    /// At most one call per token succeeds. A consumed token keeps failing
    /// with `AlreadyUsed` and never creates a second account.
    pub async fn complete_registration(
        &self,
        token: &str,
        credential: &str,
    ) -> LifecycleResult<Account> {
        let validated = self.validator.validate(token).await?;
        let consultation_id = validated.claim.consultation_id();

        let (record, account) = self
            .provisioner
            .provision(&validated, token, credential)
            .await
            .inspect_err(|err| {
                if let LifecycleError::Token(kind) = err {
                    warn!(
                        %consultation_id,
                        kind = kind.kind(),
                        "registration token rejected at consumption"
                    );
                }
            })?;

        info!(
            consultation_id = %record.id,
            account_id = %account.id,
            status = %record.status,
            "registration completed"
        );
        self.publish(LifecycleEvent::ClientRegistered {
            consultation_id: record.id,
            account_id: account.id,
            email: account.email.clone(),
            name: account.name.clone(),
        })
        .await;
        Ok(account)
    }

    /// `registered → scheduled`.
    pub async fn schedule(&self, id: Uuid) -> LifecycleResult<ConsultationRequest> {
        let current = self.get(id).await?;
        self.advance(
            id,
            "schedule",
            current.status,
            Transition::new(&[ConsultationStatus::Registered], ConsultationStatus::Scheduled),
        )
        .await
    }

    /// `scheduled → completed`.
    pub async fn mark_completed(&self, id: Uuid) -> LifecycleResult<ConsultationRequest> {
        let current = self.get(id).await?;
        self.advance(
            id,
            "complete",
            current.status,
            Transition::new(&[ConsultationStatus::Scheduled], ConsultationStatus::Completed),
        )
        .await
    }

    /// Approved invitations that lapsed without being used.
    pub async fn expired_invitations(&self) -> LifecycleResult<Vec<ConsultationRequest>> {
        self.store
            .expired_invitations(Utc::now())
            .await
            .map_err(|err| LifecycleError::from_store(err, Uuid::nil()))
    }

    async fn close(
        &self,
        id: Uuid,
        action: &'static str,
        current: &ConsultationRequest,
        next: ConsultationStatus,
        admin_notes: Option<String>,
    ) -> LifecycleResult<ConsultationRequest> {
        self.advance(
            id,
            action,
            current.status,
            Transition::new(
                &[ConsultationStatus::Pending, ConsultationStatus::UnderReview],
                next,
            )
            .with_notes(admin_notes),
        )
        .await
    }

    async fn advance(
        &self,
        id: Uuid,
        action: &'static str,
        observed: ConsultationStatus,
        change: Transition,
    ) -> LifecycleResult<ConsultationRequest> {
        if !observed.can_transition_to(change.next) {
            return Err(LifecycleError::invalid_state(action, observed));
        }
        let next = change.next;
        match self.store.transition(id, change).await {
            Ok(record) => {
                info!(
                    consultation_id = %id,
                    from = %observed,
                    to = %next,
                    "consultation status changed"
                );
                Ok(record)
            }
            Err(StoreError::StaleState { current }) => {
                Err(LifecycleError::invalid_state(action, current))
            }
            Err(err) => Err(LifecycleError::from_store(err, id)),
        }
    }

    async fn publish(&self, event: LifecycleEvent) {
        if let Err(err) = self.events.publish(&event).await {
            warn!(
                event = event.name(),
                consultation_id = %event.consultation_id(),
                error = %err,
                "failed to publish lifecycle event"
            );
        }
    }
}

fn check_invitation_ttl(ttl: Duration) -> LifecycleResult<()> {
    if ttl <= Duration::zero() || ttl > Duration::hours(MAX_INVITATION_TTL_HOURS) {
        return Err(LifecycleError::Validation(format!(
            "invitation ttl must be between 1 second and {MAX_INVITATION_TTL_HOURS} hours"
        )));
    }
    Ok(())
}

/// An approve call that repeats one already applied.
fn repeat_approval(
    current: &ConsultationRequest,
    admin_notes: &Option<String>,
) -> Option<ConsultationRequest> {
    let same_notes = admin_notes.is_none() || *admin_notes == current.admin_notes;
    (current.status == ConsultationStatus::Approved && same_notes).then(|| current.clone())
}
