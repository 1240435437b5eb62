//! In-memory store.
//!
//! Backs the integration tests and local demos. Semantics follow [`super::PgStore`]:
//! the same unique constraints, the same orderings, the same status guard
//! on reviews. Every call takes the lock once, so each operation is atomic
//! but nothing spans calls.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use ca_portal_core::{
    AssignmentId, AssignmentStatus, Email, Role, SubmissionId, SubmissionStatus, TaskId, UserId,
    ZoneId, ZoneName,
};

use super::{DirectoryStore, ProgramStore, RepositoryError};
use crate::models::{
    Ambassador, AmbassadorFilter, AmbassadorLookup, AmbassadorPatch, AssignmentScope,
    NewAmbassador, NewSubmission, NewTask, NewTaskAssignment, NewZone, Review, Submission,
    SubmissionScope, Task, TaskAssignment, TaskPatch, Zone, ZoneFilter, ZonePatch,
};

#[derive(Debug, Clone)]
struct StoredUser {
    ambassador: Ambassador,
    password_hash: String,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, StoredUser>,
    zones: BTreeMap<ZoneId, Zone>,
    tasks: BTreeMap<TaskId, Task>,
    submissions: BTreeMap<SubmissionId, Submission>,
    assignments: BTreeMap<AssignmentId, TaskAssignment>,
    bootstrapped: bool,
    last_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn email_taken(&self, email: &Email) -> bool {
        self.users.values().any(|u| u.ambassador.email == *email)
    }

    fn check_unique_user(
        &self,
        id: Option<UserId>,
        uid: Option<&str>,
        referral_code: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let others = self
            .users
            .values()
            .map(|u| &u.ambassador)
            .filter(|a| Some(a.id) != id);

        for other in others {
            if uid.is_some() && other.uid.as_deref() == uid {
                return Err(RepositoryError::Conflict("uid already in use".to_owned()));
            }
            if referral_code.is_some() && other.referral_code.as_deref() == referral_code {
                return Err(RepositoryError::Conflict(
                    "referral code already in use".to_owned(),
                ));
            }
        }
        Ok(())
    }

    fn zone_by_name_mut(&mut self, name: &ZoneName) -> Option<&mut Zone> {
        self.zones.values_mut().find(|z| z.name == *name)
    }
}

/// Store backed by maps behind a `tokio` `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn find_ambassadors_by_role(
        &self,
        role: Role,
    ) -> Result<Vec<Ambassador>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| u.ambassador.role == role)
            .map(|u| u.ambassador.clone())
            .collect())
    }

    async fn find_ambassador(
        &self,
        lookup: AmbassadorLookup<'_>,
    ) -> Result<Option<Ambassador>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| lookup.matches(&u.ambassador))
            .map(|u| u.ambassador.clone()))
    }

    async fn list_ambassadors(&self) -> Result<Vec<Ambassador>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .rev()
            .map(|u| u.ambassador.clone())
            .collect())
    }

    async fn create_ambassador(&self, new: &NewAmbassador) -> Result<Ambassador, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&new.email) {
            return Err(RepositoryError::Conflict("email already registered".to_owned()));
        }
        tables.check_unique_user(None, new.uid.as_deref(), None)?;

        let now = Utc::now();
        let id = UserId::new(tables.next_id());
        let ambassador = Ambassador {
            id,
            email: new.email.clone(),
            uid: new.uid.clone(),
            full_name: new.full_name.clone(),
            phone: new.phone.clone(),
            college: new.college.clone(),
            pin_code: new.pin_code.clone(),
            city: new.city.clone(),
            state: new.state.clone(),
            role: new.role,
            zone: new.zone.as_ref().map(ToString::to_string),
            zone_head_id: None,
            zone_head_name: None,
            referral_code: None,
            points: 0,
            tasks_done: 0,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(
            id,
            StoredUser {
                ambassador: ambassador.clone(),
                password_hash: new.password_hash.clone(),
            },
        );
        Ok(ambassador)
    }

    async fn password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Ambassador, String)>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.ambassador.email == *email)
            .map(|u| (u.ambassador.clone(), u.password_hash.clone())))
    }

    async fn update_ambassador(
        &self,
        id: UserId,
        patch: &AmbassadorPatch,
    ) -> Result<Ambassador, RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.check_unique_user(Some(id), None, patch.referral_code.as_deref())?;

        let stored = tables.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        patch.apply(&mut stored.ambassador);
        stored.ambassador.updated_at = Utc::now();
        Ok(stored.ambassador.clone())
    }

    async fn update_many_ambassadors(
        &self,
        filter: &AmbassadorFilter,
        patch: &AmbassadorPatch,
    ) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut touched = 0;
        for stored in tables.users.values_mut() {
            if filter.matches(&stored.ambassador) {
                patch.apply(&mut stored.ambassador);
                stored.ambassador.updated_at = now;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn list_zones(&self) -> Result<Vec<Zone>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut zones: Vec<Zone> = tables.zones.values().cloned().collect();
        zones.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(zones)
    }

    async fn find_zone_by_name(&self, name: &ZoneName) -> Result<Option<Zone>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.zones.values().find(|z| z.name == *name).cloned())
    }

    async fn create_zone(&self, new: &NewZone) -> Result<Zone, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.zones.values().any(|z| z.name == new.name) {
            return Err(RepositoryError::Conflict(format!(
                "zone already exists: {}",
                new.name
            )));
        }

        let now = Utc::now();
        let zone = Zone {
            id: ZoneId::new(tables.next_id()),
            name: new.name.clone(),
            display_name: new.display_name.clone(),
            pin_prefixes: new.pin_prefixes.clone(),
            head_user_id: None,
            head_name: None,
            created_at: now,
            updated_at: now,
        };
        tables.zones.insert(zone.id, zone.clone());
        Ok(zone)
    }

    async fn upsert_zone(&self, name: &ZoneName, patch: &ZonePatch) -> Result<Zone, RepositoryError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        if let Some(zone) = tables.zone_by_name_mut(name) {
            patch.apply(zone);
            zone.updated_at = now;
            return Ok(zone.clone());
        }

        let mut zone = Zone {
            id: ZoneId::new(tables.next_id()),
            name: name.clone(),
            display_name: None,
            pin_prefixes: Vec::new(),
            head_user_id: None,
            head_name: None,
            created_at: now,
            updated_at: now,
        };
        patch.apply(&mut zone);
        tables.zones.insert(zone.id, zone.clone());
        Ok(zone)
    }

    async fn update_many_zones(
        &self,
        filter: &ZoneFilter,
        patch: &ZonePatch,
    ) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut touched = 0;
        for zone in tables.zones.values_mut().filter(|z| filter.matches(z)) {
            patch.apply(zone);
            zone.updated_at = now;
            touched += 1;
        }
        Ok(touched)
    }

    async fn claim_bootstrap(&self) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.bootstrapped {
            return Ok(false);
        }
        tables.bootstrapped = true;
        Ok(true)
    }
}

#[async_trait]
impl ProgramStore for MemoryStore {
    async fn list_tasks(&self, active_only: bool) -> Result<Vec<Task>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .values()
            .rev()
            .filter(|t| !active_only || t.active)
            .cloned()
            .collect())
    }

    async fn find_task(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn create_task(&self, new: &NewTask) -> Result<Task, RepositoryError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let task = Task {
            id: TaskId::new(tables.next_id()),
            title: new.title.clone(),
            description: new.description.clone(),
            zone: new.zone.clone(),
            points: new.points,
            active: new.active,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, RepositoryError> {
        let mut tables = self.tables.write().await;
        let task = tables.tasks.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        patch.apply(task);
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.tasks.remove(&id).ok_or(RepositoryError::NotFound)?;
        tables.submissions.retain(|_, s| s.task_id != id);
        tables.assignments.retain(|_, a| a.task_id != id);
        Ok(())
    }

    async fn create_submission(
        &self,
        new: &NewSubmission,
    ) -> Result<Submission, RepositoryError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let submission = Submission {
            id: SubmissionId::new(tables.next_id()),
            user_id: new.user_id,
            task_id: new.task_id,
            media_url: new.media_url.clone(),
            note: new.note.clone(),
            status: SubmissionStatus::Pending,
            zone: new.zone.clone(),
            points: new.points,
            awarded_points: None,
            reviewer_id: None,
            review_note: None,
            created_at: now,
            updated_at: now,
        };
        tables.submissions.insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn find_submission(
        &self,
        id: SubmissionId,
    ) -> Result<Option<Submission>, RepositoryError> {
        Ok(self.tables.read().await.submissions.get(&id).cloned())
    }

    async fn list_submissions(
        &self,
        scope: &SubmissionScope,
    ) -> Result<Vec<Submission>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .submissions
            .values()
            .rev()
            .filter(|s| scope.matches(s))
            .cloned()
            .collect())
    }

    async fn review_submission(
        &self,
        id: SubmissionId,
        review: &Review,
    ) -> Result<Submission, RepositoryError> {
        let mut tables = self.tables.write().await;
        let submission = tables
            .submissions
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;

        if submission.status != SubmissionStatus::Pending {
            return Err(RepositoryError::Conflict(format!(
                "submission already {}",
                submission.status
            )));
        }

        submission.status = review.status;
        submission.reviewer_id = Some(review.reviewer_id);
        submission.awarded_points = review.awarded_points;
        submission.review_note.clone_from(&review.note);
        submission.updated_at = Utc::now();
        Ok(submission.clone())
    }

    async fn award_points(&self, user: UserId, points: i32) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let stored = tables.users.get_mut(&user).ok_or(RepositoryError::NotFound)?;
        stored.ambassador.points = stored.ambassador.points.saturating_add(points);
        stored.ambassador.tasks_done = stored.ambassador.tasks_done.saturating_add(1);
        stored.ambassador.updated_at = Utc::now();
        Ok(())
    }

    async fn create_assignments(
        &self,
        rows: &[NewTaskAssignment],
    ) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut inserted = 0;
        for row in rows {
            let exists = tables
                .assignments
                .values()
                .any(|a| a.task_id == row.task_id && a.assignee_id == row.assignee_id);
            if exists {
                continue;
            }
            let assignment = TaskAssignment {
                id: AssignmentId::new(tables.next_id()),
                task_id: row.task_id,
                assignee_id: row.assignee_id,
                assigned_by: row.assigned_by,
                zone: row.zone.clone(),
                status: AssignmentStatus::Pending,
                points: row.points,
                created_at: now,
                updated_at: now,
            };
            tables.assignments.insert(assignment.id, assignment);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn list_assignments(
        &self,
        scope: &AssignmentScope,
    ) -> Result<Vec<TaskAssignment>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .assignments
            .values()
            .rev()
            .filter(|a| scope.matches(a))
            .cloned()
            .collect())
    }

    async fn complete_assignment(
        &self,
        task: TaskId,
        assignee: UserId,
    ) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut updated = 0;
        for assignment in tables.assignments.values_mut().filter(|a| {
            a.task_id == task && a.assignee_id == assignee && a.status == AssignmentStatus::Pending
        }) {
            assignment.status = AssignmentStatus::Completed;
            assignment.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }
}
