use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    consumption_failure, Consumption, ConsultationStore, StoreError, StoreResult, Transition,
};
use crate::models::{Account, ConsultationRequest};
use crate::status::ConsultationStatus;

#[derive(Default)]
struct Tables {
    consultations: HashMap<Uuid, ConsultationRequest>,
    accounts: HashMap<String, Account>,
}

/// In-process store with the same conditional-write semantics as [`super::PgStore`].
///
/// Each call holds the table lock for its whole duration, which plays the
/// role of the database transaction.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with [`StoreError::Transient`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn account_count(&self) -> usize {
        self.tables.lock().await.accounts.len()
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.tables.lock().await.accounts.values().cloned().collect()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Transient("memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ConsultationStore for MemoryStore {
    async fn insert(&self, record: ConsultationRequest) -> StoreResult<ConsultationRequest> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        if tables.consultations.contains_key(&record.id) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "duplicate consultation id {}",
                record.id
            )));
        }
        tables.consultations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> StoreResult<ConsultationRequest> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        tables
            .consultations
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(
        &self,
        status: Option<ConsultationStatus>,
    ) -> StoreResult<Vec<ConsultationRequest>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let mut records: Vec<ConsultationRequest> = tables
            .consultations
            .values()
            .filter(|record| status.map_or(true, |wanted| record.status == wanted))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn transition(&self, id: Uuid, change: Transition) -> StoreResult<ConsultationRequest> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let record = tables
            .consultations
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;

        if !change.expected.contains(&record.status)
            || (change.require_unused_token && record.token_used)
        {
            return Err(StoreError::StaleState {
                current: record.status,
            });
        }

        record.status = change.next;
        record.pipeline_status = change.next.pipeline();
        if let Some(notes) = change.admin_notes {
            record.admin_notes = Some(notes);
        }
        if let Some(issued) = change.token {
            record.registration_token = Some(issued.token);
            record.token_expires_at = Some(issued.expires_at);
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables.accounts.get(email).cloned())
    }

    async fn consume_registration(
        &self,
        consumption: Consumption,
    ) -> StoreResult<(ConsultationRequest, Account)> {
        self.check_available()?;
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;
        let Consumption {
            consultation_id,
            presented_token,
            account,
            now,
        } = consumption;

        let record = tables
            .consultations
            .get_mut(&consultation_id)
            .ok_or(StoreError::NotFound)?;

        let applies = record.status == ConsultationStatus::Approved
            && !record.token_used
            && record.registration_token.as_deref() == Some(presented_token.as_str())
            && record.token_expires_at.is_some_and(|exp| exp > now);
        if !applies {
            return Err(consumption_failure(record, &presented_token, now));
        }

        if tables.accounts.contains_key(&account.email) {
            return Err(StoreError::DuplicateEmail);
        }

        record.status = ConsultationStatus::Registered;
        record.pipeline_status = ConsultationStatus::Registered.pipeline();
        record.token_used = true;
        record.registered_user_id = Some(account.id);
        record.registered_at = Some(now);
        record.updated_at = now;
        let updated = record.clone();

        tables.accounts.insert(account.email.clone(), account.clone());
        Ok((updated, account))
    }

    async fn expired_invitations(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ConsultationRequest>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .consultations
            .values()
            .filter(|record| {
                record.status == ConsultationStatus::Approved
                    && !record.token_used
                    && record.token_expires_at.is_some_and(|exp| exp <= now)
            })
            .cloned()
            .collect())
    }
}
