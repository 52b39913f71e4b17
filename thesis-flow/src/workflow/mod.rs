//! Workflow engine
//!
//! [`WorkflowEngine`] owns the database pool, the blob store and the
//! notifier. Every mutating operation runs as one unit of work: a database
//! transaction plus the blobs written for it. Either both persist or
//! neither does, and queued notifications go out only after commit.

pub mod aggregation;
pub mod notify;
pub mod state_machine;
pub mod templates;

mod assignment;
mod committee;
mod hardbound;
mod queries;
mod review;
mod route_slip;
mod submission;

pub use assignment::{AdviserExclusivity, AdviserLink};
pub use committee::{CommitteeDecision, CommitteeProposal, ScheduleProposal};
pub use queries::{ConceptRanking, SubmissionDetail, SubmissionProgress};
pub use review::{ReviewInput, ReviewOutcome};
pub use route_slip::{RouteSlipDecision, RouteSlipForm};

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::sync::Arc;
use thesis_common::config::WorkflowSettings;
use thesis_common::EventBus;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::actor::Actor;
use crate::blob::BlobStore;
use crate::db;
use crate::error::{Result, WorkflowError};
use crate::models::{NewUser, Submission, UserRecord};
use crate::roles::Role;
use crate::scope::ScopePolicy;
use aggregation::{review_aggregate, ReviewerState};
use notify::{Notifier, Outbox};

/// One transaction plus the blobs written on its behalf
pub(crate) struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    blobs: Arc<dyn BlobStore>,
    written: Vec<String>,
    pub outbox: Outbox,
}

impl UnitOfWork {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// Connection and outbox borrowed together
    pub fn split(&mut self) -> (&mut SqliteConnection, &mut Outbox) {
        (&mut *self.tx, &mut self.outbox)
    }

    /// Store a blob that is deleted again if the unit of work aborts
    pub async fn put_blob(&mut self, key: String, bytes: &[u8]) -> Result<String> {
        self.blobs.put(&key, bytes).await?;
        self.written.push(key.clone());
        Ok(key)
    }

    async fn discard_blobs(blobs: &dyn BlobStore, written: &[String]) {
        for key in written {
            if let Err(e) = blobs.delete(key).await {
                warn!("Failed to remove orphaned blob {}: {}", key, e);
            }
        }
    }

    async fn commit(self) -> Result<Outbox> {
        let UnitOfWork {
            tx,
            blobs,
            written,
            outbox,
        } = self;

        if let Err(e) = tx.commit().await {
            Self::discard_blobs(blobs.as_ref(), &written).await;
            return Err(WorkflowError::StorageFailure(format!("commit failed: {}", e)));
        }
        Ok(outbox)
    }

    async fn rollback(self) {
        let UnitOfWork {
            tx, blobs, written, ..
        } = self;

        if let Err(e) = tx.rollback().await {
            warn!("Rollback failed: {}", e);
        }
        Self::discard_blobs(blobs.as_ref(), &written).await;
    }
}

pub struct WorkflowEngine {
    db: SqlitePool,
    blobs: Arc<dyn BlobStore>,
    notifier: Notifier,
    settings: WorkflowSettings,
    policy: ScopePolicy,
}

impl WorkflowEngine {
    pub fn new(
        db: SqlitePool,
        blobs: Arc<dyn BlobStore>,
        events: Arc<EventBus>,
        settings: WorkflowSettings,
    ) -> Self {
        let policy = ScopePolicy::from_open_flag(settings.open_scope_when_unset);
        if policy == ScopePolicy::Open {
            warn!("Administrators without a program, department or college will see every record");
        }
        Self {
            notifier: Notifier::new(db.clone(), events, policy),
            db,
            blobs,
            settings,
            policy,
        }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn scope_policy(&self) -> ScopePolicy {
        self.policy
    }

    pub(crate) async fn begin(&self) -> Result<UnitOfWork> {
        let tx = self.db.begin().await?;
        Ok(UnitOfWork {
            tx,
            blobs: Arc::clone(&self.blobs),
            written: Vec::new(),
            outbox: Outbox::new(),
        })
    }

    /// Commit or roll back depending on `result`, then dispatch notifications
    pub(crate) async fn finish<T>(&self, uow: UnitOfWork, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                let outbox = uow.commit().await?;
                self.notifier.dispatch(outbox).await;
                Ok(value)
            }
            Err(e) => {
                debug!("Operation aborted: {}", e);
                uow.rollback().await;
                Err(e)
            }
        }
    }

    /// Load the acting user with roles and affiliation
    pub async fn load_actor(&self, user_id: Uuid) -> Result<Actor> {
        let mut conn = self.db.acquire().await?;
        let user = db::users::get_user(&mut conn, user_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("user {}", user_id)))?;

        Ok(Actor {
            id: user.id,
            display_name: user.display_name(),
            roles: user.roles,
            affiliation: user.affiliation,
        })
    }

    /// Create a user with an initial role set
    pub async fn register_user(&self, user: NewUser) -> Result<UserRecord> {
        if user.firstname.trim().is_empty() || user.lastname.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "first and last name are required".to_string(),
            ));
        }

        let mut uow = self.begin().await?;
        let result = async {
            let id = db::users::insert_user(uow.conn(), &user).await?;
            require_user(uow.conn(), id).await
        }
        .await;
        self.finish(uow, result).await
    }

    /// Grant a role outside a workflow transition
    ///
    /// Returns true when the user did not already hold the role.
    pub async fn grant_role(&self, user_id: Uuid, role: Role) -> Result<bool> {
        let mut uow = self.begin().await?;
        let result = async {
            require_user(uow.conn(), user_id).await?;
            db::users::grant_role(uow.conn(), user_id, role).await
        }
        .await;
        self.finish(uow, result).await
    }
}

pub(crate) async fn require_user(conn: &mut SqliteConnection, id: Uuid) -> Result<UserRecord> {
    db::users::get_user(conn, id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("user {}", id)))
}

pub(crate) async fn require_submission(conn: &mut SqliteConnection, id: Uuid) -> Result<Submission> {
    db::submissions::get_submission(conn, id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("submission {}", id)))
}

/// Reviewer positions on the current version of a submission
pub(crate) async fn reviewer_states(
    conn: &mut SqliteConnection,
    submission: &Submission,
) -> Result<Vec<ReviewerState>> {
    let assignments = db::assignments::list_for_submission(&mut *conn, submission.id).await?;
    let reviews = db::reviews::list_for_submission(&mut *conn, submission.id).await?;

    Ok(assignments
        .iter()
        .map(|a| {
            let review = reviews
                .iter()
                .find(|r| r.assignment_id == a.id && r.submission_version == submission.version);
            ReviewerState {
                role: a.role,
                assignment_status: a.status,
                verdict: review.map(|r| r.verdict),
                signature: review.and_then(|r| r.signature_path.clone()),
            }
        })
        .collect())
}

/// Recompute the cached status from reviews and store it if it changed
///
/// Returns the submission as stored afterwards.
pub(crate) async fn refresh_status(
    conn: &mut SqliteConnection,
    outbox: &mut Outbox,
    submission: &Submission,
) -> Result<Submission> {
    let states = reviewer_states(&mut *conn, submission).await?;
    let derived = review_aggregate(submission.kind, &states);

    if derived != submission.status {
        state_machine::transition(&mut *conn, outbox, submission, derived).await?;
    }

    require_submission(conn, submission.id).await
}
