//! Business logic services for the portal.
//!
//! # Services
//!
//! - `assignment` - Zone assignment engine and batch backfill
//! - `roles` - Promotion, zone change and demotion of zone heads
//! - `zones` - Zone directory (create, edit, list with live counts)
//! - `auth` - Password registration and login, first-user bootstrap
//! - `program` - Tasks and submission review
//! - `task_assignments` - Pushing tasks to chosen users or a whole zone
//! - `reports` - Leaderboard, profile, zone head and admin dashboards
//! - `users` - Admin edits of user records
//!
//! Services borrow a store trait object and are cheap to build per request.

pub mod assignment;
pub mod auth;
mod error;
pub mod program;
pub mod reports;
pub mod roles;
pub mod task_assignments;
pub mod users;
pub mod zones;

pub use assignment::{AssignmentEngine, AssignmentOutcome, BackfillOutcome};
pub use auth::{AuthError, AuthService, Registration};
pub use error::ZoneError;
pub use program::{ProgramError, SubmissionService, TaskInput, TaskService, TaskUpdate};
pub use roles::RoleService;
pub use task_assignments::{
    AssignRequest, AssignResult, AssignTargets, TaskAssignmentService, TaskChoice,
};
pub use users::{UserUpdate, UserUpdateError, update_user};
pub use zones::{CreateZone, UpdateZone, ZoneDirectory, ZoneSummary};
