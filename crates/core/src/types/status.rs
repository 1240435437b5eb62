//! Status enums for submissions, their review and task assignments.

use serde::{Deserialize, Serialize};

/// Review state of a proof-of-work submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(
        type_name = "portal.submission_status",
        rename_all = "SCREAMING_SNAKE_CASE"
    )
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    /// Wire and database spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a task pushed to an ambassador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(
        type_name = "portal.assignment_status",
        rename_all = "SCREAMING_SNAKE_CASE"
    )
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    /// A submission for the task was approved.
    Completed,
}

impl AssignmentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision taken by a reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    /// Status a pending submission moves to.
    #[must_use]
    pub const fn resulting_status(self) -> SubmissionStatus {
        match self {
            Self::Approve => SubmissionStatus::Approved,
            Self::Reject => SubmissionStatus::Rejected,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_review_action_from_wire() {
        let action: ReviewAction = serde_json::from_str("\"APPROVE\"").unwrap();
        assert_eq!(action.resulting_status(), SubmissionStatus::Approved);
        let action: ReviewAction = serde_json::from_str("\"REJECT\"").unwrap();
        assert_eq!(action.resulting_status(), SubmissionStatus::Rejected);
    }

    #[test]
    fn test_default_is_pending() {
        assert_eq!(SubmissionStatus::default(), SubmissionStatus::Pending);
        assert_eq!(SubmissionStatus::Pending.to_string(), "PENDING");
        assert_eq!(AssignmentStatus::default(), AssignmentStatus::Pending);
        assert_eq!(
            serde_json::to_string(&AssignmentStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
    }
}
