//! Durable storage for consultation requests and accounts.
//!
//! Every mutation is a single conditional write: the store applies it only
//! if the row is still in the state the caller observed, and reports what
//! it found otherwise. No caller holds locks across calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Account, ConsultationRequest};
use crate::status::ConsultationStatus;
use crate::tokens::IssuedToken;

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record is in status {current}")]
    StaleState { current: ConsultationStatus },
    #[error("registration token already consumed")]
    TokenConsumed,
    #[error("registration token does not match stored token")]
    TokenMismatch,
    #[error("registration token expired")]
    TokenExpired,
    #[error("an account with this email already exists")]
    DuplicateEmail,
    #[error("store unavailable: {0}")]
    Transient(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Conditional status change on one consultation.
#[derive(Debug, Clone)]
pub struct Transition {
    /// The write applies only while the row is in one of these statuses.
    pub expected: Vec<ConsultationStatus>,
    pub next: ConsultationStatus,
    /// Replaces `admin_notes` when set.
    pub admin_notes: Option<String>,
    /// Replaces the stored registration token and expiry when set.
    pub token: Option<IssuedToken>,
    /// Also requires `token_used = false`.
    pub require_unused_token: bool,
}

impl Transition {
    pub fn new(expected: &[ConsultationStatus], next: ConsultationStatus) -> Self {
        Self {
            expected: expected.to_vec(),
            next,
            admin_notes: None,
            token: None,
            require_unused_token: false,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.admin_notes = notes;
        self
    }

    pub fn with_token(mut self, token: IssuedToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn requiring_unused_token(mut self) -> Self {
        self.require_unused_token = true;
        self
    }
}

/// Token consumption and account creation, applied as one unit.
///
/// The consultation row is flipped to `registered` only while it is
/// `approved`, unused, unexpired at `now`, and still holds `presented_token`.
/// The account insert happens in the same unit; if either part fails
/// nothing is written.
#[derive(Debug, Clone)]
pub struct Consumption {
    pub consultation_id: Uuid,
    pub presented_token: String,
    pub account: Account,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait ConsultationStore: Send + Sync + 'static {
    async fn insert(&self, record: ConsultationRequest) -> StoreResult<ConsultationRequest>;

    async fn get(&self, id: Uuid) -> StoreResult<ConsultationRequest>;

    async fn list(
        &self,
        status: Option<ConsultationStatus>,
    ) -> StoreResult<Vec<ConsultationRequest>>;

    async fn transition(&self, id: Uuid, change: Transition) -> StoreResult<ConsultationRequest>;

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn consume_registration(
        &self,
        consumption: Consumption,
    ) -> StoreResult<(ConsultationRequest, Account)>;

    /// Approved consultations whose invitation expired before `now` unused.
    async fn expired_invitations(&self, now: DateTime<Utc>)
        -> StoreResult<Vec<ConsultationRequest>>;
}

/// Explains why a consumption did not apply, given the row as it is now.
pub(crate) fn consumption_failure(
    record: &ConsultationRequest,
    presented_token: &str,
    now: DateTime<Utc>,
) -> StoreError {
    if record.token_used {
        StoreError::TokenConsumed
    } else if record.registration_token.as_deref() != Some(presented_token) {
        StoreError::TokenMismatch
    } else if record.status != ConsultationStatus::Approved {
        StoreError::StaleState {
            current: record.status,
        }
    } else if record.token_expires_at.map_or(true, |exp| exp <= now) {
        StoreError::TokenExpired
    } else {
        StoreError::Backend(anyhow::anyhow!(
            "consumption of consultation {} did not apply",
            record.id
        ))
    }
}
