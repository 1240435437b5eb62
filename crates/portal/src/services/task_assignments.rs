//! Task assignments.
//!
//! Admins and zone heads push a task to chosen users or to every CA of a
//! zone. A zone head is confined to the zone they lead, both for the targets
//! and for any task they create on the spot. Targets are resolved before
//! anything is written, so a rejected request leaves no task behind.

use tracing::{info, instrument, warn};

use ca_portal_core::{Role, TaskId, UserId, ZoneName, normalize_zone};

use super::program::{ProgramError, TaskInput, TaskService, submission_zone};
use crate::db::{DirectoryStore, ProgramStore};
use crate::models::{
    Ambassador, AmbassadorLookup, AssignmentScope, NewTaskAssignment, Task, TaskAssignment,
};

/// Which task to assign.
#[derive(Debug, Clone)]
pub enum TaskChoice {
    Existing(TaskId),
    /// Created for this assignment.
    Inline(TaskInput),
}

/// Who receives the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTargets {
    /// Every CA of a zone. A zone head may leave the zone out.
    Zone(Option<String>),
    /// Chosen users. Unknown ids are skipped.
    Users(Vec<UserId>),
}

#[derive(Debug, Clone)]
pub struct AssignRequest {
    pub task: TaskChoice,
    pub targets: AssignTargets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignResult {
    pub task_id: TaskId,
    /// Rows written; users who already held the task are not counted.
    pub assigned: u64,
}

enum ResolvedTask {
    Found(Task),
    Create(TaskInput),
}

pub struct TaskAssignmentService<'a> {
    directory: &'a dyn DirectoryStore,
    program: &'a dyn ProgramStore,
}

impl<'a> TaskAssignmentService<'a> {
    #[must_use]
    pub const fn new(directory: &'a dyn DirectoryStore, program: &'a dyn ProgramStore) -> Self {
        Self { directory, program }
    }

    /// Assign a task on behalf of `requester`.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::Forbidden` for a CA, for a zone head without a
    /// zone, or for a zone head reaching outside their zone.
    /// `ProgramError::TaskNotFound` for an unknown task id, and
    /// `ProgramError::InvalidInput` for a missing or invalid zone or an
    /// invalid inline task.
    #[instrument(skip(self, requester, request), fields(user_id = %requester.id))]
    pub async fn assign(
        &self,
        requester: &Ambassador,
        request: AssignRequest,
    ) -> Result<AssignResult, ProgramError> {
        let own_zone = match requester.role {
            Role::Admin => None,
            Role::ZoneHead => Some(requester.headed_zone().ok_or(ProgramError::Forbidden)?),
            Role::Ca => return Err(ProgramError::Forbidden),
        };

        let task = match request.task {
            TaskChoice::Existing(id) => ResolvedTask::Found(
                self.program
                    .find_task(id)
                    .await?
                    .ok_or(ProgramError::TaskNotFound)?,
            ),
            TaskChoice::Inline(input) => {
                ResolvedTask::Create(scope_inline_task(input, own_zone.as_ref())?)
            }
        };

        let targets = match request.targets {
            AssignTargets::Zone(zone) => {
                let zone = target_zone(zone.as_deref(), own_zone.as_ref())?;
                self.zone_members(&zone).await?
            }
            AssignTargets::Users(ids) => {
                self.chosen_users(requester, own_zone.as_ref(), &ids).await?
            }
        };

        let task = match task {
            ResolvedTask::Found(task) => task,
            ResolvedTask::Create(input) => {
                TaskService::new(self.program).create(input, requester).await?
            }
        };

        let rows: Vec<NewTaskAssignment> = targets
            .iter()
            .map(|target| NewTaskAssignment {
                task_id: task.id,
                assignee_id: target.id,
                assigned_by: requester.id,
                zone: submission_zone(target),
                points: task.points,
            })
            .collect();
        let assigned = self.program.create_assignments(&rows).await?;

        info!(task_id = %task.id, targets = rows.len(), assigned, "task assigned");
        Ok(AssignResult {
            task_id: task.id,
            assigned,
        })
    }

    /// Assignments `viewer` may see: all for admins, their zone for heads,
    /// their own for everyone else.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::Repository` if the query fails.
    pub async fn list_for(&self, viewer: &Ambassador) -> Result<Vec<TaskAssignment>, ProgramError> {
        let scope = match viewer.role {
            Role::Admin => AssignmentScope::All,
            Role::ZoneHead => match viewer.headed_zone() {
                Some(zone) => AssignmentScope::Zone(zone.to_string()),
                None => return Ok(Vec::new()),
            },
            Role::Ca => AssignmentScope::Assignee(viewer.id),
        };
        Ok(self.program.list_assignments(&scope).await?)
    }

    /// CAs resolving to `zone`, or whose pin code is `zone` itself.
    async fn zone_members(&self, zone: &ZoneName) -> Result<Vec<Ambassador>, ProgramError> {
        let cas = self.directory.find_ambassadors_by_role(Role::Ca).await?;
        Ok(cas
            .into_iter()
            .filter(|a| {
                a.canonical_zone() == *zone
                    || a.pin_code.as_deref().map(str::trim) == Some(zone.as_str())
            })
            .collect())
    }

    async fn chosen_users(
        &self,
        requester: &Ambassador,
        own_zone: Option<&ZoneName>,
        ids: &[UserId],
    ) -> Result<Vec<Ambassador>, ProgramError> {
        let mut users = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.directory.find_ambassador(AmbassadorLookup::Id(id)).await? {
                Some(user) => users.push(user),
                None => warn!(user_id = %id, "skipping unknown assignee"),
            }
        }

        if let Some(zone) = own_zone {
            let outside = users.iter().find(|u| {
                u.role == Role::Ca
                    && u.zone_head_id != Some(requester.id)
                    && u.canonical_zone() != *zone
            });
            if let Some(user) = outside {
                warn!(assignee_id = %user.id, "assignee outside the head's zone");
                return Err(ProgramError::Forbidden);
            }
        }
        Ok(users)
    }
}

/// A zone head's inline task defaults to their zone and may not name another.
fn scope_inline_task(
    mut input: TaskInput,
    own_zone: Option<&ZoneName>,
) -> Result<TaskInput, ProgramError> {
    let Some(own) = own_zone else {
        return Ok(input);
    };
    match input.zone.as_deref().map(str::trim) {
        None | Some("") => input.zone = Some(own.to_string()),
        Some(raw) => {
            if normalize_zone(raw).is_some_and(|zone| zone != *own) {
                return Err(ProgramError::Forbidden);
            }
        }
    }
    Ok(input)
}

fn target_zone(raw: Option<&str>, own_zone: Option<&ZoneName>) -> Result<ZoneName, ProgramError> {
    let requested = match raw.map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            normalize_zone(raw)
                .ok_or_else(|| ProgramError::InvalidInput(format!("invalid zone: {raw:?}")))?,
        ),
    };

    match (own_zone, requested) {
        (Some(own), Some(requested)) if requested != *own => Err(ProgramError::Forbidden),
        (Some(own), _) => Ok(own.clone()),
        (None, Some(requested)) => Ok(requested),
        (None, None) => Err(ProgramError::InvalidInput("zone required".to_owned())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{AmbassadorPatch, NewAmbassador};
    use ca_portal_core::{AssignmentStatus, Email};

    async fn user(
        store: &MemoryStore,
        email: &str,
        role: Role,
        state: Option<&str>,
        zone: Option<&str>,
    ) -> Ambassador {
        let mut new = NewAmbassador::new(Email::parse(email).unwrap(), "x".to_owned(), role);
        new.state = state.map(str::to_owned);
        new.zone = zone.and_then(normalize_zone);
        store.create_ambassador(&new).await.unwrap()
    }

    fn inline(title: &str, zone: Option<&str>) -> TaskChoice {
        TaskChoice::Inline(TaskInput {
            title: title.to_owned(),
            zone: zone.map(str::to_owned),
            points: 15,
            ..TaskInput::default()
        })
    }

    #[tokio::test]
    async fn test_admin_assigns_zone_by_state_and_pin() {
        let store = MemoryStore::new();
        let admin = user(&store, "admin@x.io", Role::Admin, None, None).await;
        let kerala = user(&store, "k@x.io", Role::Ca, Some("Kerala"), None).await;
        let mut by_pin = NewAmbassador::new(Email::parse("p@x.io").unwrap(), "x".to_owned(), Role::Ca);
        by_pin.pin_code = Some("560001".to_owned());
        store.create_ambassador(&by_pin).await.unwrap();
        user(&store, "n@x.io", Role::Ca, Some("Punjab"), None).await;
        let service = TaskAssignmentService::new(&store, &store);

        let result = service
            .assign(
                &admin,
                AssignRequest {
                    task: inline("Campus talk", None),
                    targets: AssignTargets::Zone(Some("south zone".to_owned())),
                },
            )
            .await
            .unwrap();
        assert_eq!(result.assigned, 1);

        let rows = service.list_for(&admin).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].assignee_id, kerala.id);
        assert_eq!(rows[0].zone.as_deref(), Some("SOUTH"));
        assert_eq!(rows[0].points, 15);
        assert_eq!(rows[0].status, AssignmentStatus::Pending);

        // A pin code given as the zone reaches that CA.
        let by_pin = service
            .assign(
                &admin,
                AssignRequest {
                    task: TaskChoice::Existing(result.task_id),
                    targets: AssignTargets::Zone(Some("560001".to_owned())),
                },
            )
            .await
            .unwrap();
        assert_eq!(by_pin.assigned, 1);

        // Re-assigning is a no-op.
        let again = service
            .assign(
                &admin,
                AssignRequest {
                    task: TaskChoice::Existing(result.task_id),
                    targets: AssignTargets::Zone(Some("SOUTH".to_owned())),
                },
            )
            .await
            .unwrap();
        assert_eq!(again.assigned, 0);
    }

    #[tokio::test]
    async fn test_admin_needs_a_zone() {
        let store = MemoryStore::new();
        let admin = user(&store, "admin@x.io", Role::Admin, None, None).await;
        let err = TaskAssignmentService::new(&store, &store)
            .assign(
                &admin,
                AssignRequest {
                    task: inline("Campus talk", None),
                    targets: AssignTargets::Zone(None),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(&err, ProgramError::InvalidInput(msg) if msg == "zone required"));
        assert!(store.list_tasks(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zone_head_stays_in_zone() {
        let store = MemoryStore::new();
        let head = user(&store, "h@x.io", Role::ZoneHead, Some("Punjab"), Some("NORTH")).await;
        let member = user(&store, "m@x.io", Role::Ca, Some("Haryana"), None).await;
        let outsider = user(&store, "o@x.io", Role::Ca, Some("Kerala"), None).await;
        let service = TaskAssignmentService::new(&store, &store);

        let forbidden = [
            AssignRequest {
                task: inline("Poster", Some("SOUTH")),
                targets: AssignTargets::Zone(None),
            },
            AssignRequest {
                task: inline("Poster", None),
                targets: AssignTargets::Zone(Some("SOUTH".to_owned())),
            },
            AssignRequest {
                task: inline("Poster", None),
                targets: AssignTargets::Users(vec![member.id, outsider.id]),
            },
        ];
        for request in forbidden {
            let err = service.assign(&head, request).await.unwrap_err();
            assert!(matches!(err, ProgramError::Forbidden));
        }
        assert!(store.list_tasks(false).await.unwrap().is_empty());

        let result = service
            .assign(
                &head,
                AssignRequest {
                    task: inline("Poster", None),
                    targets: AssignTargets::Zone(None),
                },
            )
            .await
            .unwrap();
        assert_eq!(result.assigned, 1);
        let task = store.find_task(result.task_id).await.unwrap().unwrap();
        assert_eq!(task.zone.unwrap(), "NORTH");

        let seen = service.list_for(&head).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].assignee_id, member.id);
        assert!(service.list_for(&outsider).await.unwrap().is_empty());
        assert_eq!(service.list_for(&member).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_linked_ca_counts_as_in_zone() {
        let store = MemoryStore::new();
        let head = user(&store, "h@x.io", Role::ZoneHead, None, Some("CENTRAL")).await;
        let linked = user(&store, "l@x.io", Role::Ca, Some("Kerala"), None).await;
        store
            .update_ambassador(linked.id, &AmbassadorPatch::link(head.as_head_link()))
            .await
            .unwrap();

        let result = TaskAssignmentService::new(&store, &store)
            .assign(
                &head,
                AssignRequest {
                    task: inline("Poster", None),
                    targets: AssignTargets::Users(vec![linked.id, UserId::new(999)]),
                },
            )
            .await
            .unwrap();
        assert_eq!(result.assigned, 1);
    }

    #[tokio::test]
    async fn test_ca_cannot_assign() {
        let store = MemoryStore::new();
        let ca = user(&store, "c@x.io", Role::Ca, None, None).await;
        let err = TaskAssignmentService::new(&store, &store)
            .assign(
                &ca,
                AssignRequest {
                    task: TaskChoice::Existing(TaskId::new(1)),
                    targets: AssignTargets::Users(vec![ca.id]),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProgramError::Forbidden));
    }
}
