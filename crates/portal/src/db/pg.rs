//! `PostgreSQL` store.
//!
//! All tables live in the `portal` schema. Queries are built at runtime
//! (`query_as` / `QueryBuilder`) so the crate builds without a live
//! database; rows are mapped through internal `FromRow` types and
//! converted into domain types with `TryFrom`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

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

const USER_COLUMNS: &str = "id, email, uid, full_name, phone, college, pin_code, city, state, \
     role, zone, zone_head_id, zone_head_name, referral_code, points, tasks_done, \
     created_at, updated_at";

const ZONE_COLUMNS: &str =
    "id, name, display_name, pin_prefixes, head_user_id, head_name, created_at, updated_at";

const TASK_COLUMNS: &str =
    "id, title, description, zone, points, active, created_by, created_at, updated_at";

const SUBMISSION_COLUMNS: &str = "id, user_id, task_id, media_url, note, status, zone, points, \
     awarded_points, reviewer_id, review_note, created_at, updated_at";

const ASSIGNMENT_COLUMNS: &str =
    "id, task_id, assignee_id, assigned_by, zone, status, points, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    uid: Option<String>,
    full_name: Option<String>,
    phone: Option<String>,
    college: Option<String>,
    pin_code: Option<String>,
    city: Option<String>,
    state: Option<String>,
    role: Role,
    zone: Option<String>,
    zone_head_id: Option<i32>,
    zone_head_name: Option<String>,
    referral_code: Option<String>,
    points: i32,
    tasks_done: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for Ambassador {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            uid: row.uid,
            full_name: row.full_name,
            phone: row.phone,
            college: row.college,
            pin_code: row.pin_code,
            city: row.city,
            state: row.state,
            role: row.role,
            zone: row.zone,
            zone_head_id: row.zone_head_id.map(UserId::new),
            zone_head_name: row.zone_head_name,
            referral_code: row.referral_code,
            points: row.points,
            tasks_done: row.tasks_done,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ZoneRow {
    id: i32,
    name: String,
    display_name: Option<String>,
    pin_prefixes: Vec<String>,
    head_user_id: Option<i32>,
    head_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ZoneRow> for Zone {
    type Error = RepositoryError;

    fn try_from(row: ZoneRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ZoneId::new(row.id),
            name: zone_name(&row.name)?,
            display_name: row.display_name,
            pin_prefixes: row.pin_prefixes,
            head_user_id: row.head_user_id.map(UserId::new),
            head_name: row.head_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: i32,
    title: String,
    description: Option<String>,
    zone: Option<String>,
    points: i32,
    active: bool,
    created_by: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = RepositoryError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TaskId::new(row.id),
            title: row.title,
            description: row.description,
            zone: row.zone.as_deref().map(zone_name).transpose()?,
            points: row.points,
            active: row.active,
            created_by: row.created_by.map(UserId::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubmissionRow {
    id: i32,
    user_id: i32,
    task_id: i32,
    media_url: String,
    note: Option<String>,
    status: SubmissionStatus,
    zone: Option<String>,
    points: i32,
    awarded_points: Option<i32>,
    reviewer_id: Option<i32>,
    review_note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Self {
            id: SubmissionId::new(row.id),
            user_id: UserId::new(row.user_id),
            task_id: TaskId::new(row.task_id),
            media_url: row.media_url,
            note: row.note,
            status: row.status,
            zone: row.zone,
            points: row.points,
            awarded_points: row.awarded_points,
            reviewer_id: row.reviewer_id.map(UserId::new),
            review_note: row.review_note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AssignmentRow {
    id: i32,
    task_id: i32,
    assignee_id: i32,
    assigned_by: i32,
    zone: Option<String>,
    status: AssignmentStatus,
    points: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AssignmentRow> for TaskAssignment {
    fn from(row: AssignmentRow) -> Self {
        Self {
            id: AssignmentId::new(row.id),
            task_id: TaskId::new(row.task_id),
            assignee_id: UserId::new(row.assignee_id),
            assigned_by: UserId::new(row.assigned_by),
            zone: row.zone,
            status: row.status,
            points: row.points,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn zone_name(raw: &str) -> Result<ZoneName, RepositoryError> {
    ZoneName::parse(raw)
        .ok_or_else(|| RepositoryError::DataCorruption(format!("invalid zone name: {raw:?}")))
}

/// Map a unique violation to `Conflict`, everything else to `Database`.
fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

// =============================================================================
// Query fragments
// =============================================================================

fn push_ambassador_patch(qb: &mut QueryBuilder<'_, Postgres>, patch: &AmbassadorPatch) {
    let mut set = qb.separated(", ");
    set.push("updated_at = NOW()");
    if let Some(role) = patch.role {
        set.push("role = ").push_bind_unseparated(role);
    }
    if let Some(zone) = &patch.zone {
        set.push("zone = ").push_bind_unseparated(zone.clone());
    }
    if let Some(head) = &patch.zone_head {
        set.push("zone_head_id = ")
            .push_bind_unseparated(head.as_ref().map(|h| h.id.as_i32()));
        set.push("zone_head_name = ")
            .push_bind_unseparated(head.as_ref().and_then(|h| h.name.clone()));
    }
    if let Some(code) = &patch.referral_code {
        set.push("referral_code = ").push_bind_unseparated(code.clone());
    }
    if let Some(points) = patch.points {
        set.push("points = ").push_bind_unseparated(points);
    }
    if let Some(tasks_done) = patch.tasks_done {
        set.push("tasks_done = ").push_bind_unseparated(tasks_done);
    }
}

fn push_matching_zone(qb: &mut QueryBuilder<'_, Postgres>, zone: &str, pin_prefix: &str) {
    qb.push("(zone = ")
        .push_bind(zone.to_owned())
        .push(" OR pin_code = ")
        .push_bind(zone.to_owned())
        .push(" OR (")
        .push_bind(pin_prefix.to_owned())
        .push(" <> '' AND starts_with(pin_code, ")
        .push_bind(pin_prefix.to_owned())
        .push(")))");
}

fn push_ambassador_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &AmbassadorFilter) {
    qb.push(" WHERE role = 'CA' AND ");
    match filter {
        AmbassadorFilter::LinkedTo(head) => {
            qb.push("zone_head_id = ").push_bind(head.as_i32());
        }
        AmbassadorFilter::MatchingZone { zone, pin_prefix } => {
            push_matching_zone(qb, zone, pin_prefix);
        }
        AmbassadorFilter::InZoneOrPinPrefixes { zone, prefixes } => {
            qb.push("(zone = ")
                .push_bind(zone.clone())
                .push(" OR EXISTS (SELECT 1 FROM unnest(")
                .push_bind(prefixes.clone())
                .push("::text[]) AS p(prefix) WHERE btrim(p.prefix) <> '' AND starts_with(btrim(pin_code), btrim(p.prefix))))");
        }
        AmbassadorFilter::LinkedOutside {
            head,
            zone,
            pin_prefix,
        } => {
            qb.push("zone_head_id = ")
                .push_bind(head.as_i32())
                .push(" AND NOT COALESCE(");
            push_matching_zone(qb, zone, pin_prefix);
            qb.push(", FALSE)");
        }
    }
}

fn push_zone_patch(qb: &mut QueryBuilder<'_, Postgres>, patch: &ZonePatch) {
    let mut set = qb.separated(", ");
    set.push("updated_at = NOW()");
    if let Some(display_name) = &patch.display_name {
        set.push("display_name = ")
            .push_bind_unseparated(display_name.clone());
    }
    if let Some(prefixes) = &patch.pin_prefixes {
        set.push("pin_prefixes = ")
            .push_bind_unseparated(prefixes.clone());
    }
    if let Some(head) = &patch.head {
        set.push("head_user_id = ")
            .push_bind_unseparated(head.as_ref().map(|h| h.id.as_i32()));
        set.push("head_name = ")
            .push_bind_unseparated(head.as_ref().and_then(|h| h.name.clone()));
    }
}

fn push_zone_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ZoneFilter) {
    match filter {
        ZoneFilter::HeadedBy(head) => {
            qb.push(" WHERE head_user_id = ").push_bind(head.as_i32());
        }
        ZoneFilter::HeadedByExcept { head, keep } => {
            qb.push(" WHERE head_user_id = ")
                .push_bind(head.as_i32())
                .push(" AND name <> ")
                .push_bind(keep.as_str().to_owned());
        }
    }
}

fn push_task_patch(qb: &mut QueryBuilder<'_, Postgres>, patch: &TaskPatch) {
    let mut set = qb.separated(", ");
    set.push("updated_at = NOW()");
    if let Some(title) = &patch.title {
        set.push("title = ").push_bind_unseparated(title.clone());
    }
    if let Some(description) = &patch.description {
        set.push("description = ")
            .push_bind_unseparated(description.clone());
    }
    if let Some(zone) = &patch.zone {
        set.push("zone = ")
            .push_bind_unseparated(zone.as_ref().map(ToString::to_string));
    }
    if let Some(points) = patch.points {
        set.push("points = ").push_bind_unseparated(points);
    }
    if let Some(active) = patch.active {
        set.push("active = ").push_bind_unseparated(active);
    }
}

// =============================================================================
// Store
// =============================================================================

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DirectoryStore for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_ambassadors_by_role(
        &self,
        role: Role,
    ) -> Result<Vec<Ambassador>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM portal.users WHERE role = $1 ORDER BY id ASC"
        ))
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_ambassador(
        &self,
        lookup: AmbassadorLookup<'_>,
    ) -> Result<Option<Ambassador>, RepositoryError> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM portal.users WHERE "));
        match lookup {
            AmbassadorLookup::Id(id) => {
                qb.push("id = ").push_bind(id.as_i32());
            }
            AmbassadorLookup::Email(email) => {
                qb.push("email = ").push_bind(email.as_str().to_owned());
            }
            AmbassadorLookup::Uid(uid) => {
                qb.push("uid = ").push_bind(uid.to_owned());
            }
            AmbassadorLookup::Phone(phone) => {
                qb.push("phone = ").push_bind(phone.to_owned());
            }
            AmbassadorLookup::ReferralCode(code) => {
                qb.push("referral_code = ").push_bind(code.to_owned());
            }
        }
        qb.push(" LIMIT 1");

        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_ambassadors(&self) -> Result<Vec<Ambassador>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM portal.users ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_ambassador(&self, new: &NewAmbassador) -> Result<Ambassador, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO portal.users
                (email, password_hash, uid, full_name, phone, college, pin_code, city, state, role, zone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(new.email.as_str())
        .bind(&new.password_hash)
        .bind(new.uid.as_deref())
        .bind(new.full_name.as_deref())
        .bind(new.phone.as_deref())
        .bind(new.college.as_deref())
        .bind(new.pin_code.as_deref())
        .bind(new.city.as_deref())
        .bind(new.state.as_deref())
        .bind(new.role)
        .bind(new.zone.as_ref().map(ZoneName::as_str))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "user"))?;

        row.try_into()
    }

    async fn password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Ambassador, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM portal.users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Ok((row.user.try_into()?, row.password_hash)))
            .transpose()
    }

    async fn update_ambassador(
        &self,
        id: UserId,
        patch: &AmbassadorPatch,
    ) -> Result<Ambassador, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE portal.users SET ");
        push_ambassador_patch(&mut qb, patch);
        qb.push(" WHERE id = ").push_bind(id.as_i32());
        qb.push(format!(" RETURNING {USER_COLUMNS}"));

        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "referral code"))?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn update_many_ambassadors(
        &self,
        filter: &AmbassadorFilter,
        patch: &AmbassadorPatch,
    ) -> Result<u64, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE portal.users SET ");
        push_ambassador_patch(&mut qb, patch);
        push_ambassador_filter(&mut qb, filter);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn list_zones(&self) -> Result<Vec<Zone>, RepositoryError> {
        let rows = sqlx::query_as::<_, ZoneRow>(&format!(
            "SELECT {ZONE_COLUMNS} FROM portal.zones ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_zone_by_name(&self, name: &ZoneName) -> Result<Option<Zone>, RepositoryError> {
        let row = sqlx::query_as::<_, ZoneRow>(&format!(
            "SELECT {ZONE_COLUMNS} FROM portal.zones WHERE name = $1"
        ))
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create_zone(&self, new: &NewZone) -> Result<Zone, RepositoryError> {
        let row = sqlx::query_as::<_, ZoneRow>(&format!(
            r"
            INSERT INTO portal.zones (name, display_name, pin_prefixes)
            VALUES ($1, $2, $3)
            RETURNING {ZONE_COLUMNS}
            "
        ))
        .bind(new.name.as_str())
        .bind(new.display_name.as_deref())
        .bind(&new.pin_prefixes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "zone"))?;

        row.try_into()
    }

    async fn upsert_zone(&self, name: &ZoneName, patch: &ZonePatch) -> Result<Zone, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO portal.zones (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name.as_str())
            .execute(&mut *tx)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE portal.zones SET ");
        push_zone_patch(&mut qb, patch);
        qb.push(" WHERE name = ").push_bind(name.as_str().to_owned());
        qb.push(format!(" RETURNING {ZONE_COLUMNS}"));

        let row = qb.build_query_as::<ZoneRow>().fetch_one(&mut *tx).await?;
        tx.commit().await?;

        row.try_into()
    }

    async fn update_many_zones(
        &self,
        filter: &ZoneFilter,
        patch: &ZonePatch,
    ) -> Result<u64, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE portal.zones SET ");
        push_zone_patch(&mut qb, patch);
        push_zone_filter(&mut qb, filter);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn claim_bootstrap(&self) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO portal.settings (key, value) VALUES ('bootstrapped', 'true') \
             ON CONFLICT (key) DO NOTHING",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl ProgramStore for PgStore {
    async fn list_tasks(&self, active_only: bool) -> Result<Vec<Task>, RepositoryError> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM portal.tasks \
             WHERE active OR NOT $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_task(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM portal.tasks WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create_task(&self, new: &NewTask) -> Result<Task, RepositoryError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r"
            INSERT INTO portal.tasks (title, description, zone, points, active, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TASK_COLUMNS}
            "
        ))
        .bind(&new.title)
        .bind(new.description.as_deref())
        .bind(new.zone.as_ref().map(ZoneName::as_str))
        .bind(new.points)
        .bind(new.active)
        .bind(new.created_by.map(|id| id.as_i32()))
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE portal.tasks SET ");
        push_task_patch(&mut qb, patch);
        qb.push(" WHERE id = ").push_bind(id.as_i32());
        qb.push(format!(" RETURNING {TASK_COLUMNS}"));

        let row = qb
            .build_query_as::<TaskRow>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM portal.tasks WHERE id = $1")
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn create_submission(
        &self,
        new: &NewSubmission,
    ) -> Result<Submission, RepositoryError> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            r"
            INSERT INTO portal.submissions (user_id, task_id, media_url, note, zone, points)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SUBMISSION_COLUMNS}
            "
        ))
        .bind(new.user_id.as_i32())
        .bind(new.task_id.as_i32())
        .bind(&new.media_url)
        .bind(new.note.as_deref())
        .bind(new.zone.as_deref())
        .bind(new.points)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_submission(
        &self,
        id: SubmissionId,
    ) -> Result<Option<Submission>, RepositoryError> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM portal.submissions WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_submissions(
        &self,
        scope: &SubmissionScope,
    ) -> Result<Vec<Submission>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SUBMISSION_COLUMNS} FROM portal.submissions"
        ));
        match scope {
            SubmissionScope::All => {}
            SubmissionScope::Zone(zone) => {
                qb.push(" WHERE zone = ").push_bind(zone.clone());
            }
            SubmissionScope::User(user) => {
                qb.push(" WHERE user_id = ").push_bind(user.as_i32());
            }
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows = qb
            .build_query_as::<SubmissionRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn review_submission(
        &self,
        id: SubmissionId,
        review: &Review,
    ) -> Result<Submission, RepositoryError> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            r"
            UPDATE portal.submissions
            SET status = $2, reviewer_id = $3, awarded_points = $4, review_note = $5,
                updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {SUBMISSION_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(review.status)
        .bind(review.reviewer_id.as_i32())
        .bind(review.awarded_points)
        .bind(review.note.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(row.into());
        }

        match self.find_submission(id).await? {
            Some(existing) => Err(RepositoryError::Conflict(format!(
                "submission already {}",
                existing.status
            ))),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn award_points(&self, user: UserId, points: i32) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE portal.users \
             SET points = points + $2, tasks_done = tasks_done + 1, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(user.as_i32())
        .bind(points)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn create_assignments(
        &self,
        rows: &[NewTaskAssignment],
    ) -> Result<u64, RepositoryError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO portal.task_assignments (task_id, assignee_id, assigned_by, zone, points) ",
        );
        qb.push_values(rows, |mut values, row| {
            values
                .push_bind(row.task_id.as_i32())
                .push_bind(row.assignee_id.as_i32())
                .push_bind(row.assigned_by.as_i32())
                .push_bind(row.zone.clone())
                .push_bind(row.points);
        });
        qb.push(" ON CONFLICT (task_id, assignee_id) DO NOTHING");

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn list_assignments(
        &self,
        scope: &AssignmentScope,
    ) -> Result<Vec<TaskAssignment>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM portal.task_assignments"
        ));
        match scope {
            AssignmentScope::All => {}
            AssignmentScope::Zone(zone) => {
                qb.push(" WHERE zone = ").push_bind(zone.clone());
            }
            AssignmentScope::Assignee(user) => {
                qb.push(" WHERE assignee_id = ").push_bind(user.as_i32());
            }
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows = qb
            .build_query_as::<AssignmentRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn complete_assignment(
        &self,
        task: TaskId,
        assignee: UserId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE portal.task_assignments \
             SET status = 'COMPLETED', updated_at = NOW() \
             WHERE task_id = $1 AND assignee_id = $2 AND status = 'PENDING'",
        )
        .bind(task.as_i32())
        .bind(assignee.as_i32())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
