//! Adviser links and reviewer assignments

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use sqlx::SqliteConnection;

use super::{require_submission, require_user, state_machine, UnitOfWork, WorkflowEngine};
use crate::actor::Actor;
use crate::db;
use crate::error::{is_unique_violation, Result, WorkflowError};
use crate::models::{
    AssignmentStatus, ReviewerAssignment, SubmissionKind, SubmissionStatus, UserRecord,
};
use crate::pagination::{calculate_pagination, Page};
use crate::roles::Role;
use crate::scope::scope_predicate;

/// What to do when the student already has an adviser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdviserExclusivity {
    /// Fail with `AlreadyAssigned`
    #[default]
    Required,
    /// Point the link at the new adviser
    Replace,
}

/// Result of linking a student to an adviser
#[derive(Debug, Clone, Serialize)]
pub struct AdviserLink {
    pub student_id: Uuid,
    pub adviser_id: Uuid,
    pub previous_adviser_id: Option<Uuid>,
    /// The adviser role was newly granted by this assignment
    pub role_granted: bool,
}

fn require_student(user: &UserRecord) -> Result<()> {
    if user.roles.contains(Role::Student) {
        Ok(())
    } else {
        Err(WorkflowError::Validation(format!(
            "user {} is not a student",
            user.id
        )))
    }
}

fn require_faculty(user: &UserRecord) -> Result<()> {
    if user.roles.is_faculty_eligible() {
        Ok(())
    } else {
        Err(WorkflowError::IneligibleMember(format!(
            "user {} holds no faculty or adviser role",
            user.id
        )))
    }
}

/// Bring a submission's reviewer assignments in line with its committee
///
/// Missing assignments are added; assignments for people no longer on the
/// committee are removed unless they already carry a review. Returns
/// (added, removed).
pub(crate) async fn sync_reviewer_assignments(
    conn: &mut SqliteConnection,
    submission_id: Uuid,
    members: &[(Uuid, Role)],
    assigned_by: Uuid,
) -> Result<(usize, u64)> {
    let mut added = 0;
    for &(user_id, role) in members {
        if db::assignments::ensure_assignment(&mut *conn, submission_id, user_id, role, assigned_by)
            .await?
        {
            added += 1;
        }
    }
    let removed = db::assignments::prune_unreviewed(&mut *conn, submission_id, members).await?;
    if added > 0 || removed > 0 {
        info!(
            "Reviewer assignments for {} synced: {} added, {} removed",
            submission_id, added, removed
        );
    }
    Ok((added, removed))
}

impl WorkflowEngine {
    /// Link a student to an adviser on behalf of a program chairperson
    pub async fn assign_adviser(
        &self,
        actor: &Actor,
        student_id: Uuid,
        adviser_id: Uuid,
        exclusivity: AdviserExclusivity,
    ) -> Result<AdviserLink> {
        actor.require(Role::ProgramChairperson)?;
        if student_id == adviser_id {
            return Err(WorkflowError::Validation(
                "a student cannot advise themselves".to_string(),
            ));
        }

        let mut uow = self.begin().await?;
        let result = self
            .link_adviser(&mut uow, actor, student_id, adviser_id, exclusivity, true)
            .await;
        self.finish(uow, result).await
    }

    /// A student picks their own adviser
    pub async fn self_assign_adviser(&self, actor: &Actor, adviser_id: Uuid) -> Result<AdviserLink> {
        actor.require(Role::Student)?;
        if actor.id == adviser_id {
            return Err(WorkflowError::Validation(
                "a student cannot advise themselves".to_string(),
            ));
        }

        let mut uow = self.begin().await?;
        let result = self
            .link_adviser(
                &mut uow,
                actor,
                actor.id,
                adviser_id,
                AdviserExclusivity::Required,
                false,
            )
            .await;
        self.finish(uow, result).await
    }

    async fn link_adviser(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        student_id: Uuid,
        adviser_id: Uuid,
        exclusivity: AdviserExclusivity,
        scoped: bool,
    ) -> Result<AdviserLink> {
        let student = require_user(uow.conn(), student_id).await?;
        require_student(&student)?;
        let adviser = require_user(uow.conn(), adviser_id).await?;
        require_faculty(&adviser)?;

        if scoped {
            actor.require_scope(&student.affiliation, self.policy, "student")?;
            actor.require_scope(&adviser.affiliation, self.policy, "adviser")?;
        }

        let previous = db::advisers::get_adviser_id(uow.conn(), student_id).await?;
        match (previous, exclusivity) {
            (Some(current), AdviserExclusivity::Required) => {
                return Err(WorkflowError::AlreadyAssigned(format!(
                    "student {} already advised by {}",
                    student_id, current
                )));
            }
            (Some(current), AdviserExclusivity::Replace) => {
                if current == adviser_id {
                    return Err(WorkflowError::AlreadyAssigned(format!(
                        "student {} already advised by {}",
                        student_id, current
                    )));
                }
                let rows =
                    db::advisers::replace_link(uow.conn(), student_id, current, adviser_id, actor.id)
                        .await?;
                if rows == 0 {
                    return Err(WorkflowError::StateChanged(format!(
                        "adviser link for {} changed",
                        student_id
                    )));
                }
            }
            (None, _) => {
                if let Err(e) =
                    db::advisers::insert_link(uow.conn(), student_id, adviser_id, actor.id).await
                {
                    return Err(if is_unique_violation(&e) {
                        WorkflowError::AlreadyAssigned(format!(
                            "student {} was assigned concurrently",
                            student_id
                        ))
                    } else {
                        e.into()
                    });
                }
            }
        }

        let role_granted = db::users::grant_role(uow.conn(), adviser_id, Role::Adviser).await?;
        info!(
            "Adviser {} assigned to student {} by {}",
            adviser_id, student_id, actor.id
        );

        uow.outbox.notify_user(
            student_id,
            "Adviser assigned",
            format!("{} is now your thesis adviser.", adviser.display_name()),
            Some("/advisers".to_string()),
        );
        uow.outbox.notify_user(
            adviser_id,
            "New advisee",
            format!("You have been assigned as adviser of {}.", student.display_name()),
            Some("/advisees".to_string()),
        );
        if let Some(old) = previous {
            uow.outbox.notify_user(
                old,
                "Advisee reassigned",
                format!("{} has been assigned to another adviser.", student.display_name()),
                None,
            );
        }

        Ok(AdviserLink {
            student_id,
            adviser_id,
            previous_adviser_id: previous,
            role_granted,
        })
    }

    /// Clear a student's adviser link
    ///
    /// A student outside the chairperson's scope is reported as not found.
    pub async fn unassign_adviser(&self, actor: &Actor, student_id: Uuid) -> Result<Uuid> {
        actor.require(Role::ProgramChairperson)?;

        let mut uow = self.begin().await?;
        let result = async {
            let not_found =
                || WorkflowError::NotFound(format!("no adviser link for student {} in scope", student_id));

            let student = db::users::get_user(uow.conn(), student_id)
                .await?
                .ok_or_else(not_found)?;
            if actor
                .require_scope(&student.affiliation, self.policy, "student")
                .is_err()
            {
                return Err(not_found());
            }
            let adviser_id = db::advisers::get_adviser_id(uow.conn(), student_id)
                .await?
                .ok_or_else(not_found)?;

            if db::advisers::delete_link(uow.conn(), student_id).await? == 0 {
                return Err(WorkflowError::StateChanged(format!(
                    "adviser link for {} removed concurrently",
                    student_id
                )));
            }
            info!("Adviser {} unassigned from student {}", adviser_id, student_id);

            uow.outbox.notify_user(
                student_id,
                "Adviser removed",
                "Your adviser assignment has been cleared.",
                None,
            );
            uow.outbox.notify_user(
                adviser_id,
                "Advisee removed",
                format!("{} is no longer your advisee.", student.display_name()),
                None,
            );
            Ok(adviser_id)
        }
        .await;
        self.finish(uow, result).await
    }

    /// Students in scope with no adviser, ordered by last then first name
    pub async fn list_unassigned_students(
        &self,
        actor: &Actor,
        requested_page: i64,
    ) -> Result<Page<UserRecord>> {
        actor.require_any(&[Role::ProgramChairperson, Role::Dean])?;

        let predicate = scope_predicate(&actor.scope(), self.policy, "u");
        let mut conn = self.db.acquire().await?;
        let total = db::users::count_unassigned_students(&mut conn, &predicate).await?;
        let pagination =
            calculate_pagination(total, requested_page, self.settings.unassigned_page_size);
        let items = db::users::list_unassigned_students(
            &mut conn,
            &predicate,
            pagination.page_size,
            pagination.offset,
        )
        .await?;

        Ok(Page {
            items,
            total,
            pagination,
        })
    }

    /// Assign a reviewer to a concept paper or manuscript
    pub async fn assign_reviewer(
        &self,
        actor: &Actor,
        submission_id: Uuid,
        reviewer_id: Uuid,
        role: Role,
        due_at: Option<DateTime<Utc>>,
        instructions: Option<String>,
    ) -> Result<ReviewerAssignment> {
        actor.require(Role::ProgramChairperson)?;
        if !matches!(role, Role::Adviser | Role::Panel | Role::CommitteeChairperson) {
            return Err(WorkflowError::Validation(format!(
                "'{}' is not a reviewer role",
                role
            )));
        }

        let mut uow = self.begin().await?;
        let result = async {
            let submission = require_submission(uow.conn(), submission_id).await?;
            if !matches!(
                submission.kind,
                SubmissionKind::ConceptPaper | SubmissionKind::OutlineDefenseManuscript
            ) {
                return Err(WorkflowError::Validation(format!(
                    "reviewers for a {} come from its committee",
                    submission.kind.label()
                )));
            }
            if !state_machine::is_review_open(submission.kind, submission.status) {
                return Err(WorkflowError::StateChanged(format!(
                    "submission {} is {} and no longer open for review",
                    submission.id, submission.status
                )));
            }

            let student = require_user(uow.conn(), submission.student_id).await?;
            actor.require_scope(&student.affiliation, self.policy, "student")?;

            if reviewer_id == submission.student_id {
                return Err(WorkflowError::Validation(
                    "a student cannot review their own submission".to_string(),
                ));
            }
            let reviewer = require_user(uow.conn(), reviewer_id).await?;
            require_faculty(&reviewer)?;

            let now = Utc::now();
            let assignment = ReviewerAssignment {
                id: Uuid::new_v4(),
                submission_id,
                reviewer_id,
                role,
                status: AssignmentStatus::Pending,
                due_at,
                instructions: instructions
                    .map(|i| i.trim().to_string())
                    .filter(|i| !i.is_empty()),
                decline_reason: None,
                assigned_by: Some(actor.id),
                assigned_at: now,
                updated_at: now,
            };
            if let Err(e) = db::assignments::insert_assignment(uow.conn(), &assignment).await {
                return Err(if is_unique_violation(&e) {
                    WorkflowError::AlreadyAssigned(format!(
                        "{} already assigned to {} as {}",
                        reviewer_id, submission_id, role
                    ))
                } else {
                    e.into()
                });
            }

            if submission.status == SubmissionStatus::Submitted {
                let (conn, outbox) = uow.split();
                state_machine::transition(conn, outbox, &submission, SubmissionStatus::UnderReview)
                    .await?;
            }

            uow.outbox.notify_user(
                reviewer_id,
                "Review assignment",
                format!(
                    "You have been asked to review the {} \"{}\" by {}.",
                    submission.kind.label(),
                    submission.title,
                    student.display_name()
                ),
                Some(format!("/submissions/{}", submission_id)),
            );
            Ok(assignment)
        }
        .await;
        self.finish(uow, result).await
    }
}
