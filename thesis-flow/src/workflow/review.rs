//! Recording reviews and route slip signatures

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::aggregation::route_slip_fully_signed;
use super::{refresh_status, require_submission, reviewer_states, state_machine, UnitOfWork, WorkflowEngine};
use crate::actor::Actor;
use crate::blob::FileUpload;
use crate::db;
use crate::error::{Result, WorkflowError};
use crate::models::{AssignmentStatus, Review, ReviewerAssignment, SubmissionKind, SubmissionStatus, Verdict};
use crate::roles::Role;
use thesis_common::WorkflowEvent;

/// A reviewer's decision on one assignment
#[derive(Debug, Clone, Default)]
pub struct ReviewInput {
    pub verdict: String,
    pub comments: Option<String>,
    /// Concept papers only: adviser's preference, 1 is best
    pub rank_order: Option<i64>,
    pub score: Option<f64>,
    /// Route slips only: the member's signature image
    pub signature: Option<FileUpload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub review: Review,
    pub submission_status: SubmissionStatus,
    /// Route slips only: every committee signature is now present
    pub fully_signed: Option<bool>,
}

impl WorkflowEngine {
    /// Load the assignment and confirm it belongs to the actor
    async fn own_assignment(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        assignment_id: Uuid,
    ) -> Result<ReviewerAssignment> {
        let assignment = db::assignments::get_assignment(uow.conn(), assignment_id).await?;
        match assignment {
            Some(a) if a.reviewer_id == actor.id => Ok(a),
            _ => Err(WorkflowError::NotAssigned(format!(
                "user {} has no assignment {}",
                actor.id, assignment_id
            ))),
        }
    }

    /// Record or replace the actor's review for an assignment
    ///
    /// Recomputes the submission's derived status. On route slips the adviser
    /// is notified when the last committee signature arrives.
    pub async fn record_review(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        input: ReviewInput,
    ) -> Result<ReviewOutcome> {
        if input.verdict.trim().is_empty() {
            return Err(WorkflowError::Validation("verdict is required".to_string()));
        }
        if let Some(score) = input.score {
            if !(0.0..=100.0).contains(&score) {
                return Err(WorkflowError::Validation(format!(
                    "score {} must be between 0 and 100",
                    score
                )));
            }
        }
        let signature_name = input
            .signature
            .as_ref()
            .map(|s| s.validated_name())
            .transpose()?;

        let mut uow = self.begin().await?;
        let result = async {
            let assignment = self.own_assignment(&mut uow, actor, assignment_id).await?;
            if assignment.status == AssignmentStatus::Declined {
                return Err(WorkflowError::NotAssigned(format!(
                    "assignment {} was declined",
                    assignment_id
                )));
            }

            let submission = require_submission(uow.conn(), assignment.submission_id).await?;
            if !state_machine::is_review_open(submission.kind, submission.status) {
                return Err(WorkflowError::AlreadyDecided(format!(
                    "submission {} is {}",
                    submission.id, submission.status
                )));
            }

            let verdict = Verdict::parse_for(&input.verdict, submission.kind)?;

            if input.rank_order.is_some() {
                if submission.kind != SubmissionKind::ConceptPaper || assignment.role != Role::Adviser {
                    return Err(WorkflowError::Validation(
                        "only advisers rank concept papers".to_string(),
                    ));
                }
            }
            if let Some(rank) = input.rank_order {
                let max = self.settings.max_rank_order;
                if rank < 1 || rank > max {
                    return Err(WorkflowError::Validation(format!(
                        "rank {} must be between 1 and {}",
                        rank, max
                    )));
                }
            }

            let existing = db::reviews::get_for_assignment(uow.conn(), assignment_id).await?;
            let was_signed = if submission.kind == SubmissionKind::RouteSlip {
                let slip = db::route_slips::get_by_submission(uow.conn(), submission.id)
                    .await?
                    .ok_or_else(|| {
                        WorkflowError::NotFound(format!("route slip for submission {}", submission.id))
                    })?;
                if slip.adviser_signature_path.is_some() {
                    return Err(WorkflowError::AlreadyDecided(format!(
                        "route slip {} already carries the adviser's signature",
                        slip.id
                    )));
                }
                let states = reviewer_states(uow.conn(), &submission).await?;
                Some((slip, route_slip_fully_signed(&states)))
            } else {
                None
            };

            let signature_path = match (&input.signature, &signature_name) {
                (Some(upload), Some(name)) => {
                    let key = format!(
                        "signatures/{}/{}/v{}/{}",
                        submission.id, assignment.id, submission.version, name
                    );
                    Some(uow.put_blob(key, &upload.bytes).await?)
                }
                _ => existing
                    .as_ref()
                    .filter(|r| r.submission_version == submission.version)
                    .and_then(|r| r.signature_path.clone()),
            };
            if submission.kind == SubmissionKind::RouteSlip && signature_path.is_none() {
                return Err(WorkflowError::Validation(
                    "route slip decisions must be signed".to_string(),
                ));
            }

            let now = Utc::now();
            let review = Review {
                id: existing.as_ref().map(|r| r.id).unwrap_or_else(Uuid::new_v4),
                assignment_id,
                submission_id: submission.id,
                reviewer_id: actor.id,
                submission_version: submission.version,
                verdict,
                rank_order: input.rank_order,
                score: input.score,
                comments: input
                    .comments
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string),
                signature_path,
                created_at: existing.as_ref().map(|r| r.created_at).unwrap_or(now),
                updated_at: now,
            };
            db::reviews::upsert_review(uow.conn(), &review).await?;

            if assignment.status != AssignmentStatus::Completed {
                let rows = db::assignments::update_status(
                    uow.conn(),
                    assignment_id,
                    assignment.status,
                    AssignmentStatus::Completed,
                    None,
                )
                .await?;
                if rows == 0 {
                    return Err(WorkflowError::StateChanged(format!(
                        "assignment {} changed concurrently",
                        assignment_id
                    )));
                }
            }
            info!(
                "Review {} recorded on {} {} by {}: {}",
                review.id, submission.kind, submission.id, actor.id, verdict
            );

            let (conn, outbox) = uow.split();
            let updated = refresh_status(conn, outbox, &submission).await?;

            let fully_signed = match was_signed {
                Some((slip, before)) => {
                    let states = reviewer_states(uow.conn(), &updated).await?;
                    let now_signed = route_slip_fully_signed(&states);
                    if now_signed && !before {
                        info!("Route slip {} fully signed", slip.id);
                        uow.outbox.notify_user(
                            slip.adviser_id,
                            "Route slip ready for your signature",
                            "All committee members have signed the route slip.",
                            Some(format!("/route-slips/{}", slip.id)),
                        );
                        uow.outbox.event(WorkflowEvent::RouteSlipFullySigned {
                            route_slip_id: slip.id,
                            adviser_id: slip.adviser_id,
                            timestamp: now,
                        });
                    }
                    Some(now_signed)
                }
                None => None,
            };

            if updated.status != submission.status {
                uow.outbox.notify_user(
                    updated.student_id,
                    "Review update",
                    format!(
                        "Your {} \"{}\" is now {}.",
                        updated.kind.label(),
                        updated.title,
                        updated.status.as_str().replace('_', " ")
                    ),
                    Some(format!("/submissions/{}", updated.id)),
                );
            }

            Ok(ReviewOutcome {
                review,
                submission_status: updated.status,
                fully_signed,
            })
        }
        .await;
        self.finish(uow, result).await
    }

    /// Reviewer opens an assignment
    pub async fn start_review(&self, actor: &Actor, assignment_id: Uuid) -> Result<ReviewerAssignment> {
        let mut uow = self.begin().await?;
        let result = async {
            let assignment = self.own_assignment(&mut uow, actor, assignment_id).await?;
            if assignment.status == AssignmentStatus::Pending {
                let rows = db::assignments::update_status(
                    uow.conn(),
                    assignment_id,
                    AssignmentStatus::Pending,
                    AssignmentStatus::InProgress,
                    None,
                )
                .await?;
                if rows == 0 {
                    return Err(WorkflowError::StateChanged(format!(
                        "assignment {} changed concurrently",
                        assignment_id
                    )));
                }
            }
            db::assignments::get_assignment(uow.conn(), assignment_id)
                .await?
                .ok_or_else(|| WorkflowError::NotFound(format!("assignment {}", assignment_id)))
        }
        .await;
        self.finish(uow, result).await
    }

    /// Reviewer declines an assignment with a reason
    ///
    /// The declined reviewer no longer counts toward the aggregate.
    pub async fn record_decline_feedback(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        reason: &str,
    ) -> Result<ReviewerAssignment> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::Validation(
                "a reason is required to decline".to_string(),
            ));
        }

        let mut uow = self.begin().await?;
        let result = async {
            let assignment = self.own_assignment(&mut uow, actor, assignment_id).await?;
            match assignment.status {
                AssignmentStatus::Declined => {
                    return Err(WorkflowError::AlreadyDecided(format!(
                        "assignment {} already declined",
                        assignment_id
                    )))
                }
                AssignmentStatus::Completed => {
                    return Err(WorkflowError::AlreadyDecided(format!(
                        "assignment {} already has a review",
                        assignment_id
                    )))
                }
                _ => {}
            }

            let rows = db::assignments::update_status(
                uow.conn(),
                assignment_id,
                assignment.status,
                AssignmentStatus::Declined,
                Some(reason),
            )
            .await?;
            if rows == 0 {
                return Err(WorkflowError::StateChanged(format!(
                    "assignment {} changed concurrently",
                    assignment_id
                )));
            }

            let submission = require_submission(uow.conn(), assignment.submission_id).await?;
            if state_machine::is_review_open(submission.kind, submission.status) {
                let (conn, outbox) = uow.split();
                refresh_status(conn, outbox, &submission).await?;
            }

            if let Some(by) = assignment.assigned_by {
                uow.outbox.notify_user(
                    by,
                    "Review declined",
                    format!("{} declined to review \"{}\": {}", actor.display_name, submission.title, reason),
                    Some(format!("/submissions/{}", submission.id)),
                );
            }
            db::assignments::get_assignment(uow.conn(), assignment_id)
                .await?
                .ok_or_else(|| WorkflowError::NotFound(format!("assignment {}", assignment_id)))
        }
        .await;
        self.finish(uow, result).await
    }

    /// Withdraw the actor's signature from a route slip
    ///
    /// Only possible until the adviser signs.
    pub async fn clear_signature(&self, actor: &Actor, assignment_id: Uuid) -> Result<ReviewOutcome> {
        let mut uow = self.begin().await?;
        let result = async {
            let assignment = self.own_assignment(&mut uow, actor, assignment_id).await?;
            let submission = require_submission(uow.conn(), assignment.submission_id).await?;
            if submission.kind != SubmissionKind::RouteSlip {
                return Err(WorkflowError::Validation(
                    "only route slip signatures can be cleared".to_string(),
                ));
            }
            let slip = db::route_slips::get_by_submission(uow.conn(), submission.id)
                .await?
                .ok_or_else(|| WorkflowError::NotFound(format!("route slip for {}", submission.id)))?;
            if slip.adviser_signature_path.is_some() || !state_machine::is_review_open(submission.kind, submission.status) {
                return Err(WorkflowError::AlreadyDecided(format!(
                    "route slip {} is already finalized",
                    slip.id
                )));
            }

            if db::reviews::clear_signature(uow.conn(), assignment_id).await? == 0 {
                return Err(WorkflowError::NotFound(format!(
                    "no signature on assignment {}",
                    assignment_id
                )));
            }
            db::assignments::update_status(
                uow.conn(),
                assignment_id,
                AssignmentStatus::Completed,
                AssignmentStatus::InProgress,
                None,
            )
            .await?;

            let (conn, outbox) = uow.split();
            let updated = refresh_status(conn, outbox, &submission).await?;
            let review = db::reviews::get_for_assignment(uow.conn(), assignment_id)
                .await?
                .ok_or_else(|| WorkflowError::NotFound(format!("review for {}", assignment_id)))?;
            info!("Signature cleared on route slip {} by {}", slip.id, actor.id);

            Ok(ReviewOutcome {
                review,
                submission_status: updated.status,
                fully_signed: Some(false),
            })
        }
        .await;
        self.finish(uow, result).await
    }
}
