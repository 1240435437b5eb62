//! Persistence for the portal.
//!
//! # Stores
//!
//! Services never talk to a database directly. They go through two
//! object-safe traits:
//!
//! - [`DirectoryStore`] - users (all roles), zones and the bootstrap flag
//! - [`ProgramStore`] - tasks, submissions, task assignments and points
//!
//! Two backends implement both:
//!
//! - [`PgStore`] - `PostgreSQL` (schema `portal`), used in production
//! - [`MemoryStore`] - `tokio::sync::RwLock` maps, used by tests and demos
//!
//! # Migrations
//!
//! Migrations are stored in `crates/portal/migrations/` and run via:
//! ```bash
//! cargo run -p ca-cli -- migrate
//! ```

pub mod memory;
pub mod pg;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use ca_portal_core::{Email, Role, SubmissionId, TaskId, UserId, ZoneName};

use crate::models::{
    Ambassador, AmbassadorFilter, AmbassadorLookup, AmbassadorPatch, AssignmentScope,
    NewAmbassador, NewSubmission, NewTask, NewTaskAssignment, NewZone, Review, Submission,
    SubmissionScope, Task, TaskAssignment, TaskPatch, Zone, ZoneFilter, ZonePatch,
};

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Users, zones and the bootstrap flag.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Cheap round trip used by the readiness check.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// All users with `role`, oldest first.
    async fn find_ambassadors_by_role(&self, role: Role)
    -> Result<Vec<Ambassador>, RepositoryError>;

    async fn find_ambassador(
        &self,
        lookup: AmbassadorLookup<'_>,
    ) -> Result<Option<Ambassador>, RepositoryError>;

    /// Every user, newest first.
    async fn list_ambassadors(&self) -> Result<Vec<Ambassador>, RepositoryError>;

    /// Insert a user. `Conflict` when the email is taken.
    async fn create_ambassador(&self, new: &NewAmbassador) -> Result<Ambassador, RepositoryError>;

    /// The user and their password hash, for login.
    async fn password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Ambassador, String)>, RepositoryError>;

    /// Apply `patch` to one user. `NotFound` when the id is unknown.
    async fn update_ambassador(
        &self,
        id: UserId,
        patch: &AmbassadorPatch,
    ) -> Result<Ambassador, RepositoryError>;

    /// Apply `patch` to every user in `filter`; returns the number touched.
    async fn update_many_ambassadors(
        &self,
        filter: &AmbassadorFilter,
        patch: &AmbassadorPatch,
    ) -> Result<u64, RepositoryError>;

    /// Every zone, by name.
    async fn list_zones(&self) -> Result<Vec<Zone>, RepositoryError>;

    async fn find_zone_by_name(&self, name: &ZoneName) -> Result<Option<Zone>, RepositoryError>;

    /// Insert a zone. `Conflict` when the name is taken.
    async fn create_zone(&self, new: &NewZone) -> Result<Zone, RepositoryError>;

    /// Update the zone called `name`, creating it first if it does not exist.
    async fn upsert_zone(&self, name: &ZoneName, patch: &ZonePatch) -> Result<Zone, RepositoryError>;

    async fn update_many_zones(
        &self,
        filter: &ZoneFilter,
        patch: &ZonePatch,
    ) -> Result<u64, RepositoryError>;

    /// Claim the one-time bootstrap flag. Returns `true` for exactly one
    /// caller over the lifetime of the store.
    async fn claim_bootstrap(&self) -> Result<bool, RepositoryError>;
}

/// Tasks, submissions, task assignments and points.
#[async_trait]
pub trait ProgramStore: Send + Sync {
    /// Tasks, newest first. `active_only` hides deactivated ones.
    async fn list_tasks(&self, active_only: bool) -> Result<Vec<Task>, RepositoryError>;

    async fn find_task(&self, id: TaskId) -> Result<Option<Task>, RepositoryError>;

    async fn create_task(&self, new: &NewTask) -> Result<Task, RepositoryError>;

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, RepositoryError>;

    /// Deletes the task's submissions and assignments with it. `NotFound`
    /// when the id is unknown.
    async fn delete_task(&self, id: TaskId) -> Result<(), RepositoryError>;

    async fn create_submission(&self, new: &NewSubmission)
    -> Result<Submission, RepositoryError>;

    async fn find_submission(
        &self,
        id: SubmissionId,
    ) -> Result<Option<Submission>, RepositoryError>;

    /// Submissions in `scope`, newest first.
    async fn list_submissions(
        &self,
        scope: &SubmissionScope,
    ) -> Result<Vec<Submission>, RepositoryError>;

    /// Record a review. Only `PENDING` submissions can be reviewed; any other
    /// status yields `Conflict` and leaves the row untouched.
    async fn review_submission(
        &self,
        id: SubmissionId,
        review: &Review,
    ) -> Result<Submission, RepositoryError>;

    /// Add `points` to the user and count one more completed task.
    async fn award_points(&self, user: UserId, points: i32) -> Result<(), RepositoryError>;

    /// Insert assignments, skipping any task and assignee pair that already
    /// has one. Returns the number of rows written.
    async fn create_assignments(
        &self,
        rows: &[NewTaskAssignment],
    ) -> Result<u64, RepositoryError>;

    /// Assignments in `scope`, newest first.
    async fn list_assignments(
        &self,
        scope: &AssignmentScope,
    ) -> Result<Vec<TaskAssignment>, RepositoryError>;

    /// Mark `assignee`'s pending assignment for `task` completed.
    async fn complete_assignment(
        &self,
        task: TaskId,
        assignee: UserId,
    ) -> Result<u64, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
