//! Tasks and proof-of-work submissions.

use thiserror::Error;
use tracing::{info, instrument, warn};

use ca_portal_core::{ReviewAction, Role, SubmissionId, SubmissionStatus, TaskId, normalize_zone};

use crate::db::{ProgramStore, RepositoryError};
use crate::models::{
    Ambassador, NewSubmission, NewTask, Review, Submission, SubmissionScope, Task, TaskPatch,
};

/// Errors from the task and submission services.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("task not found")]
    TaskNotFound,

    #[error("task is not active")]
    TaskInactive,

    #[error("submission not found")]
    SubmissionNotFound,

    /// The caller may not see or review this.
    #[error("forbidden")]
    Forbidden,

    #[error("submission already reviewed")]
    AlreadyReviewed,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Fields for a new task.
#[derive(Debug, Clone, Default)]
pub struct TaskInput {
    pub title: String,
    pub description: Option<String>,
    pub zone: Option<String>,
    pub points: i32,
    pub active: Option<bool>,
}

/// Task edit. `None` leaves a field alone; an empty zone clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub zone: Option<String>,
    pub points: Option<i32>,
    pub active: Option<bool>,
}

/// Zone a user's submissions are filed under: the zone a head leads, or the
/// canonical zone of anyone else.
#[must_use]
pub fn submission_zone(user: &Ambassador) -> Option<String> {
    match user.role {
        Role::ZoneHead => user.headed_zone().map(|z| z.to_string()),
        _ => Some(user.canonical_zone().to_string()),
    }
}

pub struct TaskService<'a> {
    program: &'a dyn ProgramStore,
}

impl<'a> TaskService<'a> {
    #[must_use]
    pub const fn new(program: &'a dyn ProgramStore) -> Self {
        Self { program }
    }

    /// Tasks visible to `viewer`.
    ///
    /// Admins see everything. Everyone else sees active tasks that are either
    /// open to all zones or scoped to their own.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::Repository` if the query fails.
    pub async fn list_for(&self, viewer: &Ambassador) -> Result<Vec<Task>, ProgramError> {
        if viewer.role == Role::Admin {
            return Ok(self.program.list_tasks(false).await?);
        }

        let zone = submission_zone(viewer);
        let tasks = self.program.list_tasks(true).await?;
        Ok(tasks
            .into_iter()
            .filter(|t| {
                t.zone
                    .as_ref()
                    .is_none_or(|z| zone.as_deref() == Some(z.as_str()))
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns `ProgramError::InvalidInput` for an empty title, negative
    /// points or a zone that normalizes to nothing.
    #[instrument(skip(self, input, creator), fields(user_id = %creator.id))]
    pub async fn create(&self, input: TaskInput, creator: &Ambassador) -> Result<Task, ProgramError> {
        let title = required_text(&input.title, "title")?;
        let points = non_negative(input.points, "points")?;
        let zone = optional_zone(input.zone.as_deref())?;

        let task = self
            .program
            .create_task(&NewTask {
                title,
                description: input.description.filter(|d| !d.trim().is_empty()),
                zone,
                points,
                active: input.active.unwrap_or(true),
                created_by: Some(creator.id),
            })
            .await?;

        info!(task_id = %task.id, "task created");
        Ok(task)
    }

    /// # Errors
    ///
    /// Returns `ProgramError::TaskNotFound` for an unknown task, plus the
    /// validation errors of [`Self::create`].
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: TaskId, input: TaskUpdate) -> Result<Task, ProgramError> {
        let patch = TaskPatch {
            title: input
                .title
                .as_deref()
                .map(|t| required_text(t, "title"))
                .transpose()?,
            description: input
                .description
                .map(|d| Some(d.trim().to_owned()).filter(|d| !d.is_empty())),
            zone: input
                .zone
                .as_deref()
                .map(|z| optional_zone(Some(z)))
                .transpose()?,
            points: input.points.map(|p| non_negative(p, "points")).transpose()?,
            active: input.active,
        };

        self.program.update_task(id, &patch).await.map_err(not_found_as(ProgramError::TaskNotFound))
    }

    /// # Errors
    ///
    /// Returns `ProgramError::TaskNotFound` for an unknown task.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: TaskId) -> Result<(), ProgramError> {
        self.program
            .delete_task(id)
            .await
            .map_err(not_found_as(ProgramError::TaskNotFound))?;
        info!("task deleted");
        Ok(())
    }
}

pub struct SubmissionService<'a> {
    program: &'a dyn ProgramStore,
}

impl<'a> SubmissionService<'a> {
    #[must_use]
    pub const fn new(program: &'a dyn ProgramStore) -> Self {
        Self { program }
    }

    /// File proof for an active task.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::TaskNotFound`, `ProgramError::TaskInactive`, or
    /// `ProgramError::InvalidInput` for a missing media URL.
    #[instrument(skip(self, user, media_url, note), fields(user_id = %user.id))]
    pub async fn submit(
        &self,
        user: &Ambassador,
        task_id: TaskId,
        media_url: &str,
        note: Option<String>,
    ) -> Result<Submission, ProgramError> {
        let media_url = required_text(media_url, "mediaUrl")?;
        let task = self
            .program
            .find_task(task_id)
            .await?
            .ok_or(ProgramError::TaskNotFound)?;
        if !task.active {
            return Err(ProgramError::TaskInactive);
        }

        let submission = self
            .program
            .create_submission(&NewSubmission {
                user_id: user.id,
                task_id,
                media_url,
                note: note.filter(|n| !n.trim().is_empty()),
                zone: submission_zone(user),
                points: task.points,
            })
            .await?;

        info!(submission_id = %submission.id, "submission filed");
        Ok(submission)
    }

    /// Submissions `viewer` may review: all for admins, their zone for heads.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::Forbidden` for anyone else.
    pub async fn list_for_reviewer(
        &self,
        viewer: &Ambassador,
    ) -> Result<Vec<Submission>, ProgramError> {
        let scope = match viewer.role {
            Role::Admin => SubmissionScope::All,
            Role::ZoneHead => match viewer.headed_zone() {
                Some(zone) => SubmissionScope::Zone(zone.to_string()),
                None => return Ok(Vec::new()),
            },
            Role::Ca => return Err(ProgramError::Forbidden),
        };
        Ok(self.program.list_submissions(&scope).await?)
    }

    /// # Errors
    ///
    /// Returns `ProgramError::Repository` if the query fails.
    pub async fn list_mine(&self, user: &Ambassador) -> Result<Vec<Submission>, ProgramError> {
        Ok(self
            .program
            .list_submissions(&SubmissionScope::User(user.id))
            .await?)
    }

    /// Approve or reject a pending submission.
    ///
    /// Approval awards `points` when given, otherwise the points recorded on
    /// the submission, counts one more completed task for the submitter and
    /// completes their assignment for the task, if they had one.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::Forbidden` when a zone head reviews outside
    /// their zone, `ProgramError::AlreadyReviewed` when the submission is no
    /// longer pending, and `ProgramError::InvalidInput` for negative points.
    #[instrument(skip(self, reviewer, note), fields(reviewer_id = %reviewer.id))]
    pub async fn review(
        &self,
        reviewer: &Ambassador,
        id: SubmissionId,
        action: ReviewAction,
        points: Option<i32>,
        note: Option<String>,
    ) -> Result<Submission, ProgramError> {
        let points = points.map(|p| non_negative(p, "points")).transpose()?;
        let submission = self
            .program
            .find_submission(id)
            .await?
            .ok_or(ProgramError::SubmissionNotFound)?;

        let allowed = match reviewer.role {
            Role::Admin => true,
            Role::ZoneHead => {
                reviewer.headed_zone().map(|z| z.to_string()) == submission.zone
                    && submission.zone.is_some()
            }
            Role::Ca => false,
        };
        if !allowed {
            warn!(submission_id = %id, "review outside reviewer's scope");
            return Err(ProgramError::Forbidden);
        }

        let status = action.resulting_status();
        let awarded = (status == SubmissionStatus::Approved)
            .then(|| points.unwrap_or(submission.points));
        let review = Review {
            status,
            reviewer_id: reviewer.id,
            awarded_points: awarded,
            note: note.filter(|n| !n.trim().is_empty()),
        };

        let reviewed = self
            .program
            .review_submission(id, &review)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ProgramError::AlreadyReviewed,
                RepositoryError::NotFound => ProgramError::SubmissionNotFound,
                other => ProgramError::Repository(other),
            })?;

        if let Some(points) = awarded {
            self.program.award_points(reviewed.user_id, points).await?;
            self.program
                .complete_assignment(reviewed.task_id, reviewed.user_id)
                .await?;
        }

        info!(submission_id = %id, status = %reviewed.status, awarded, "submission reviewed");
        Ok(reviewed)
    }
}

fn not_found_as(err: ProgramError) -> impl FnOnce(RepositoryError) -> ProgramError {
    move |e| match e {
        RepositoryError::NotFound => err,
        other => ProgramError::Repository(other),
    }
}

fn required_text(value: &str, field: &str) -> Result<String, ProgramError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ProgramError::InvalidInput(format!("{field} is required")));
    }
    Ok(value.to_owned())
}

fn non_negative(value: i32, field: &str) -> Result<i32, ProgramError> {
    if value < 0 {
        return Err(ProgramError::InvalidInput(format!("{field} must not be negative")));
    }
    Ok(value)
}

/// Blank means "no zone"; anything else must normalize.
fn optional_zone(zone: Option<&str>) -> Result<Option<ca_portal_core::ZoneName>, ProgramError> {
    match zone.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => normalize_zone(raw)
            .map(Some)
            .ok_or_else(|| ProgramError::InvalidInput(format!("invalid zone: {raw:?}"))),
    }
}
