//! Lifecycle events handed to the notification dispatcher.
//!
//! Events are published only after the store has committed the change they
//! describe. Publishing is best effort: a sink failure is logged and never
//! undoes the committed transition.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::db::PgPool;
use crate::outbox;

#[derive(Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum LifecycleEvent {
    #[serde(rename = "consultation.submitted")]
    ConsultationSubmitted {
        consultation_id: Uuid,
        email: String,
        name: String,
    },
    #[serde(rename = "consultation.approved")]
    ConsultationApproved {
        consultation_id: Uuid,
        email: String,
        name: String,
        registration_token: String,
        expires_at: DateTime<Utc>,
    },
    #[serde(rename = "consultation.rejected")]
    ConsultationRejected {
        consultation_id: Uuid,
        email: String,
        name: String,
    },
    #[serde(rename = "consultation.invitation_reissued")]
    InvitationReissued {
        consultation_id: Uuid,
        email: String,
        name: String,
        registration_token: String,
        expires_at: DateTime<Utc>,
    },
    #[serde(rename = "client.registered")]
    ClientRegistered {
        consultation_id: Uuid,
        account_id: Uuid,
        email: String,
        name: String,
    },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::ConsultationSubmitted { .. } => "consultation.submitted",
            LifecycleEvent::ConsultationApproved { .. } => "consultation.approved",
            LifecycleEvent::ConsultationRejected { .. } => "consultation.rejected",
            LifecycleEvent::InvitationReissued { .. } => "consultation.invitation_reissued",
            LifecycleEvent::ClientRegistered { .. } => "client.registered",
        }
    }

    pub fn consultation_id(&self) -> Uuid {
        match self {
            LifecycleEvent::ConsultationSubmitted { consultation_id, .. }
            | LifecycleEvent::ConsultationApproved { consultation_id, .. }
            | LifecycleEvent::ConsultationRejected { consultation_id, .. }
            | LifecycleEvent::InvitationReissued { consultation_id, .. }
            | LifecycleEvent::ClientRegistered { consultation_id, .. } => *consultation_id,
        }
    }

    /// The registration token carried by invitation events.
    pub fn registration_token(&self) -> Option<&str> {
        match self {
            LifecycleEvent::ConsultationApproved {
                registration_token, ..
            }
            | LifecycleEvent::InvitationReissued {
                registration_token, ..
            } => Some(registration_token),
            _ => None,
        }
    }
}

// Hand-written so tokens never reach log output through `{:?}`.
impl std::fmt::Debug for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEvent")
            .field("name", &self.name())
            .field("consultation_id", &self.consultation_id())
            .finish()
    }
}

#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn publish(&self, event: &LifecycleEvent) -> Result<()>;
}

/// Writes events to the log only.
#[derive(Debug, Default, Clone)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: &LifecycleEvent) -> Result<()> {
        info!(
            event = event.name(),
            consultation_id = %event.consultation_id(),
            "lifecycle event"
        );
        Ok(())
    }
}

/// Persists events to `notification_outbox` for the dispatcher to pick up.
#[derive(Clone)]
pub struct OutboxEventSink {
    pool: PgPool,
}

impl OutboxEventSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventSink for OutboxEventSink {
    async fn publish(&self, event: &LifecycleEvent) -> Result<()> {
        let payload = serde_json::to_value(event).context("failed to encode event")?;
        let event_type = event.name();
        let pool = self.pool.clone();
        let entry = tokio::task::spawn_blocking(move || -> Result<_> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("database pool error: {err}"))?;
            Ok(outbox::enqueue_event(&mut conn, event_type, payload)?)
        })
        .await
        .context("outbox task panicked")??;

        info!(
            event = event_type,
            consultation_id = %event.consultation_id(),
            outbox_id = %entry.id,
            "lifecycle event queued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_with_dotted_event_name() {
        let event = LifecycleEvent::ClientRegistered {
            consultation_id: Uuid::nil(),
            account_id: Uuid::nil(),
            email: "a@x.com".into(),
            name: "Ada".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "client.registered");
        assert_eq!(value["email"], "a@x.com");
        assert_eq!(event.name(), "client.registered");
    }

    #[test]
    fn debug_output_omits_registration_token() {
        let event = LifecycleEvent::ConsultationApproved {
            consultation_id: Uuid::nil(),
            email: "a@x.com".into(),
            name: "Ada".into(),
            registration_token: "secret-token-value".into(),
            expires_at: Utc::now(),
        };
        assert!(!format!("{event:?}").contains("secret-token-value"));
        assert_eq!(event.registration_token(), Some("secret-token-value"));
    }
}
