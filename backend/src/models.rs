use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::*;
use crate::status::{ConsultationStatus, PipelineStatus, UnknownStatus};

pub const ROLE_CLIENT: &str = "client";

/// Prospect-supplied fields of a consultation request.
///
/// `intake` carries target roles, package tier, availability and notes. The
/// core never interprets it and stores it exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConsultation {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default = "empty_intake")]
    pub intake: serde_json::Value,
}

fn empty_intake() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsultationRequest {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub locale: Option<String>,
    pub intake: serde_json::Value,
    pub status: ConsultationStatus,
    pub pipeline_status: PipelineStatus,
    #[serde(skip_serializing)]
    pub registration_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub token_used: bool,
    pub registered_user_id: Option<Uuid>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub registered_at: Option<DateTime<Utc>>,
}

impl ConsultationRequest {
    pub fn new(id: Uuid, submission: NewConsultation, now: DateTime<Utc>) -> Self {
        let status = ConsultationStatus::Pending;
        Self {
            id,
            name: submission.name,
            email: submission.email,
            phone: submission.phone,
            locale: submission.locale,
            intake: submission.intake,
            status,
            pipeline_status: status.pipeline(),
            registration_token: None,
            token_expires_at: None,
            token_used: false,
            registered_user_id: None,
            admin_notes: None,
            created_at: now,
            updated_at: now,
            registered_at: None,
        }
    }

    /// True when every prospect-supplied field matches `submission`.
    pub fn intake_matches(&self, submission: &NewConsultation) -> bool {
        self.name == submission.name
            && self.email == submission.email
            && self.phone == submission.phone
            && self.locale == submission.locale
            && self.intake == submission.intake
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = consultation_requests)]
pub struct ConsultationRow {
    pub id: Uuid,
    pub status: String,
    pub pipeline_status: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub locale: Option<String>,
    pub intake_json: serde_json::Value,
    pub registration_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub token_used: bool,
    pub registered_user_id: Option<Uuid>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub registered_at: Option<DateTime<Utc>>,
}

impl TryFrom<ConsultationRow> for ConsultationRequest {
    type Error = UnknownStatus;

    fn try_from(row: ConsultationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            locale: row.locale,
            intake: row.intake_json,
            status: row.status.parse()?,
            pipeline_status: row.pipeline_status.parse()?,
            registration_token: row.registration_token,
            token_expires_at: row.token_expires_at,
            token_used: row.token_used,
            registered_user_id: row.registered_user_id,
            admin_notes: row.admin_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            registered_at: row.registered_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = consultation_requests)]
pub struct NewConsultationRow<'a> {
    pub id: Uuid,
    pub status: &'a str,
    pub pipeline_status: &'a str,
    pub email: &'a str,
    pub name: &'a str,
    pub phone: Option<&'a str>,
    pub locale: Option<&'a str>,
    pub intake_json: &'a serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a ConsultationRequest> for NewConsultationRow<'a> {
    fn from(record: &'a ConsultationRequest) -> Self {
        Self {
            id: record.id,
            status: record.status.as_str(),
            pipeline_status: record.pipeline_status.as_str(),
            email: &record.email,
            name: &record.name,
            phone: record.phone.as_deref(),
            locale: record.locale.as_deref(),
            intake_json: &record.intake,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Identifiable, Insertable)]
#[diesel(table_name = accounts)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub source_consultation_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = notification_outbox)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notification_outbox)]
pub struct NewOutboxEntry {
    pub id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: String,
}
