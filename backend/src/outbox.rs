use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewOutboxEntry, OutboxEntry};
use crate::schema::notification_outbox;

pub const STATUS_QUEUED: &str = "queued";

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type OutboxResult<T> = Result<T, OutboxError>;

pub fn enqueue_event(
    conn: &mut PgConnection,
    event_type: &str,
    payload: Value,
) -> OutboxResult<OutboxEntry> {
    let entry = NewOutboxEntry {
        id: Uuid::new_v4(),
        event_type: event_type.to_string(),
        payload,
        status: STATUS_QUEUED.to_string(),
    };

    diesel::insert_into(notification_outbox::table)
        .values(&entry)
        .execute(conn)?;

    let stored = notification_outbox::table.find(entry.id).first(conn)?;
    Ok(stored)
}

/// Oldest queued entries first.
pub fn queued_events(conn: &mut PgConnection, limit: i64) -> OutboxResult<Vec<OutboxEntry>> {
    let rows = notification_outbox::table
        .filter(notification_outbox::status.eq(STATUS_QUEUED))
        .order(notification_outbox::created_at.asc())
        .limit(limit)
        .load(conn)?;
    Ok(rows)
}
