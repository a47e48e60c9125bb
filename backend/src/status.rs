use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a consultation request.
///
/// Legal moves are listed in [`ConsultationStatus::allowed_next`]; every
/// mutation in the lifecycle coordinator is checked against that table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Pending,
    UnderReview,
    Approved,
    Registered,
    Scheduled,
    Completed,
    Rejected,
    Cancelled,
}

impl ConsultationStatus {
    pub const ALL: [ConsultationStatus; 8] = [
        ConsultationStatus::Pending,
        ConsultationStatus::UnderReview,
        ConsultationStatus::Approved,
        ConsultationStatus::Registered,
        ConsultationStatus::Scheduled,
        ConsultationStatus::Completed,
        ConsultationStatus::Rejected,
        ConsultationStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConsultationStatus::Pending => "pending",
            ConsultationStatus::UnderReview => "under_review",
            ConsultationStatus::Approved => "approved",
            ConsultationStatus::Registered => "registered",
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Rejected => "rejected",
            ConsultationStatus::Cancelled => "cancelled",
        }
    }

    pub fn allowed_next(self) -> &'static [ConsultationStatus] {
        use ConsultationStatus::*;
        match self {
            Pending => &[UnderReview, Approved, Rejected, Cancelled],
            UnderReview => &[Approved, Rejected, Cancelled],
            Approved => &[Registered],
            Registered => &[Scheduled],
            Scheduled => &[Completed],
            Completed | Rejected | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: ConsultationStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Statuses from which an admin decision (approve, reject, cancel) may be taken.
    pub fn is_awaiting_decision(self) -> bool {
        matches!(
            self,
            ConsultationStatus::Pending | ConsultationStatus::UnderReview
        )
    }

    pub fn pipeline(self) -> PipelineStatus {
        match self {
            ConsultationStatus::Pending | ConsultationStatus::UnderReview => PipelineStatus::Lead,
            ConsultationStatus::Approved => PipelineStatus::Invited,
            ConsultationStatus::Registered
            | ConsultationStatus::Scheduled
            | ConsultationStatus::Completed => PipelineStatus::Client,
            ConsultationStatus::Rejected | ConsultationStatus::Cancelled => PipelineStatus::Closed,
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status value `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for ConsultationStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ConsultationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

/// Coarse pipeline phase, always derived from [`ConsultationStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Lead,
    Invited,
    Client,
    Closed,
}

impl PipelineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Lead => "lead",
            PipelineStatus::Invited => "invited",
            PipelineStatus::Client => "client",
            PipelineStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "lead" => Ok(PipelineStatus::Lead),
            "invited" => Ok(PipelineStatus::Invited),
            "client" => Ok(PipelineStatus::Client),
            "closed" => Ok(PipelineStatus::Closed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
