//! Tasks, proof-of-work submissions and task assignments.

use chrono::{DateTime, Utc};
use serde::Serialize;

use ca_portal_core::{
    AssignmentId, AssignmentStatus, SubmissionId, SubmissionStatus, TaskId, UserId, ZoneName,
};

/// A task ambassadors can complete for points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    /// Restricts the task to one zone; `None` means everyone.
    pub zone: Option<ZoneName>,
    pub points: i32,
    pub active: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub zone: Option<ZoneName>,
    pub points: i32,
    pub active: bool,
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub zone: Option<Option<ZoneName>>,
    pub points: Option<i32>,
    pub active: Option<bool>,
}

impl TaskPatch {
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(zone) = &self.zone {
            task.zone.clone_from(zone);
        }
        if let Some(points) = self.points {
            task.points = points;
        }
        if let Some(active) = self.active {
            task.active = active;
        }
    }
}

/// Proof that an ambassador completed a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    pub user_id: UserId,
    pub task_id: TaskId,
    pub media_url: String,
    pub note: Option<String>,
    pub status: SubmissionStatus,
    /// Submitter's zone when the proof was filed.
    pub zone: Option<String>,
    /// Task points when the proof was filed.
    pub points: i32,
    pub awarded_points: Option<i32>,
    pub reviewer_id: Option<UserId>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: UserId,
    pub task_id: TaskId,
    pub media_url: String,
    pub note: Option<String>,
    pub zone: Option<String>,
    pub points: i32,
}

/// Outcome written by a reviewer.
#[derive(Debug, Clone)]
pub struct Review {
    pub status: SubmissionStatus,
    pub reviewer_id: UserId,
    pub awarded_points: Option<i32>,
    pub note: Option<String>,
}

/// Which submissions to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionScope {
    All,
    Zone(String),
    User(UserId),
}

impl SubmissionScope {
    #[must_use]
    pub fn matches(&self, submission: &Submission) -> bool {
        match self {
            Self::All => true,
            Self::Zone(zone) => submission.zone.as_deref() == Some(zone.as_str()),
            Self::User(user) => submission.user_id == *user,
        }
    }
}

/// A task pushed to one ambassador by an admin or zone head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    pub id: AssignmentId,
    pub task_id: TaskId,
    pub assignee_id: UserId,
    pub assigned_by: UserId,
    /// Zone the assignee's submissions are filed under.
    pub zone: Option<String>,
    pub status: AssignmentStatus,
    /// Task points when the assignment was made.
    pub points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTaskAssignment {
    pub task_id: TaskId,
    pub assignee_id: UserId,
    pub assigned_by: UserId,
    pub zone: Option<String>,
    pub points: i32,
}

/// Which assignments to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentScope {
    All,
    Zone(String),
    Assignee(UserId),
}

impl AssignmentScope {
    #[must_use]
    pub fn matches(&self, assignment: &TaskAssignment) -> bool {
        match self {
            Self::All => true,
            Self::Zone(zone) => assignment.zone.as_deref() == Some(zone.as_str()),
            Self::Assignee(user) => assignment.assignee_id == *user,
        }
    }
}
