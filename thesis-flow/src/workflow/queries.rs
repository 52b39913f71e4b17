//! Role-scoped reads: submission listings with progress, concept paper
//! rankings, assignments and notifications

use serde::Serialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::aggregation::{review_aggregate, winning_review, RankedReview};
use super::{require_submission, require_user, reviewer_states, WorkflowEngine};
use crate::actor::Actor;
use crate::db;
use crate::db::submissions::{SubmissionFilter, Visibility};
use crate::error::{Result, WorkflowError};
use crate::models::{
    AssignmentStatus, Notification, Review, ReviewerAssignment, RouteSlip, Submission,
    SubmissionKind, SubmissionStatus, SubmissionVersion,
};
use crate::roles::Role;
use crate::scope::{scope_predicate, within_scope};

/// A submission with its review progress
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionProgress {
    #[serde(flatten)]
    pub submission: Submission,
    pub student_name: String,
    pub reviews_completed: usize,
    pub reviews_total: usize,
    /// Route slips only
    pub signatures_completed: Option<usize>,
    /// Concept papers only: best adviser rank on the current version
    pub top_rank: Option<i64>,
    /// Status recomputed from the reviews; equals `submission.status` while
    /// review is open
    pub derived_status: SubmissionStatus,
}

/// Everything shown on a submission page
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDetail {
    pub submission: Submission,
    pub assignments: Vec<ReviewerAssignment>,
    /// Reviews on the current version
    pub reviews: Vec<Review>,
    pub history: Vec<SubmissionVersion>,
    pub route_slip: Option<RouteSlip>,
}

/// Winning adviser rank for one concept paper
#[derive(Debug, Clone, Serialize)]
pub struct ConceptRanking {
    pub submission_id: Uuid,
    pub title: String,
    pub status: SubmissionStatus,
    pub winning_rank: Option<i64>,
    pub winning_review_id: Option<Uuid>,
    pub ranked_by: Option<Uuid>,
    /// This paper holds the best rank among the student's papers
    pub top_pick: bool,
}

fn ranked_reviews(
    assignments: &[ReviewerAssignment],
    reviews: &[Review],
    version: i64,
) -> Vec<RankedReview> {
    reviews
        .iter()
        .filter(|r| r.submission_version == version)
        .filter(|r| {
            assignments
                .iter()
                .any(|a| a.id == r.assignment_id && a.role == Role::Adviser)
        })
        .map(|r| RankedReview {
            review_id: r.id,
            reviewer_id: r.reviewer_id,
            rank_order: r.rank_order,
            updated_at: r.updated_at,
        })
        .collect()
}

impl WorkflowEngine {
    /// Fail unless the actor may see the submission
    ///
    /// Visible to its student, the student's adviser, any assigned reviewer
    /// and program chairpersons or deans whose scope covers the student.
    pub(crate) async fn require_visible(
        &self,
        conn: &mut SqliteConnection,
        actor: &Actor,
        submission: &Submission,
    ) -> Result<()> {
        if submission.student_id == actor.id {
            return Ok(());
        }

        if actor.roles.contains_any(&[Role::ProgramChairperson, Role::Dean]) {
            let student = require_user(&mut *conn, submission.student_id).await?;
            if within_scope(&actor.scope(), &student.affiliation, self.policy) {
                return Ok(());
            }
        }

        if db::advisers::get_adviser_id(&mut *conn, submission.student_id).await? == Some(actor.id) {
            return Ok(());
        }

        let assigned = db::assignments::list_for_submission(&mut *conn, submission.id)
            .await?
            .iter()
            .any(|a| a.reviewer_id == actor.id);
        if assigned {
            return Ok(());
        }

        Err(WorkflowError::OutOfScope(format!(
            "submission {} is not visible to user {}",
            submission.id, actor.id
        )))
    }

    /// Submissions the actor may see, with derived progress
    pub async fn fetch_submissions_for_actor(
        &self,
        actor: &Actor,
        filter: SubmissionFilter,
    ) -> Result<Vec<SubmissionProgress>> {
        let mut conn = self.db.acquire().await?;

        let mut student_ids = db::advisers::advisee_ids(&mut conn, actor.id).await?;
        if actor.has(Role::Student) {
            student_ids.push(actor.id);
        }
        let visibility = if actor.roles.contains_any(&[Role::ProgramChairperson, Role::Dean]) {
            Visibility::Scoped {
                predicate: scope_predicate(&actor.scope(), self.policy, "u"),
                student_ids,
                reviewer_id: actor.id,
            }
        } else {
            Visibility::Personal {
                student_ids,
                reviewer_id: actor.id,
            }
        };

        let submissions = db::submissions::list_submissions(&mut conn, &visibility, &filter).await?;
        let mut listing = Vec::with_capacity(submissions.len());
        for submission in submissions {
            listing.push(self.progress(&mut conn, submission).await?);
        }
        Ok(listing)
    }

    async fn progress(
        &self,
        conn: &mut SqliteConnection,
        submission: Submission,
    ) -> Result<SubmissionProgress> {
        let student = require_user(&mut *conn, submission.student_id).await?;
        let states = reviewer_states(&mut *conn, &submission).await?;
        let active: Vec<_> = states
            .iter()
            .filter(|s| s.assignment_status != AssignmentStatus::Declined)
            .collect();

        let signatures_completed = (submission.kind == SubmissionKind::RouteSlip).then(|| {
            active
                .iter()
                .filter(|s| s.signature.as_deref().map(|p| !p.trim().is_empty()).unwrap_or(false))
                .count()
        });

        let top_rank = if submission.kind == SubmissionKind::ConceptPaper {
            let assignments = db::assignments::list_for_submission(&mut *conn, submission.id).await?;
            let reviews = db::reviews::list_for_submission(&mut *conn, submission.id).await?;
            let ranked = ranked_reviews(&assignments, &reviews, submission.version);
            winning_review(&ranked).and_then(|r| r.rank_order)
        } else {
            None
        };

        let derived_status = if super::state_machine::is_review_open(submission.kind, submission.status)
            && submission.status != SubmissionStatus::Submitted
        {
            review_aggregate(submission.kind, &states)
        } else {
            submission.status
        };

        Ok(SubmissionProgress {
            student_name: student.display_name(),
            reviews_completed: active.iter().filter(|s| s.verdict.is_some()).count(),
            reviews_total: active.len(),
            signatures_completed,
            top_rank,
            derived_status,
            submission,
        })
    }

    /// One submission with assignments, current reviews and history
    pub async fn submission_detail(&self, actor: &Actor, submission_id: Uuid) -> Result<SubmissionDetail> {
        let mut conn = self.db.acquire().await?;
        let submission = require_submission(&mut conn, submission_id).await?;
        self.require_visible(&mut conn, actor, &submission).await?;

        let assignments = db::assignments::list_for_submission(&mut conn, submission_id).await?;
        let reviews = db::reviews::list_for_submission(&mut conn, submission_id)
            .await?
            .into_iter()
            .filter(|r| r.submission_version == submission.version)
            .collect();
        let history = db::submissions::list_versions(&mut conn, submission_id).await?;
        let route_slip = match submission.kind {
            SubmissionKind::RouteSlip => {
                db::route_slips::get_by_submission(&mut conn, submission_id).await?
            }
            SubmissionKind::OutlineDefenseManuscript => {
                db::route_slips::latest_for_manuscript(&mut conn, submission_id).await?
            }
            _ => None,
        };

        Ok(SubmissionDetail {
            submission,
            assignments,
            reviews,
            history,
            route_slip,
        })
    }

    /// Winning adviser rank for each of a student's concept papers
    ///
    /// The paper with the lowest winning rank is the top pick; equal ranks
    /// go to the most recently updated review.
    pub async fn concept_paper_rankings(
        &self,
        actor: &Actor,
        student_id: Uuid,
    ) -> Result<Vec<ConceptRanking>> {
        let mut conn = self.db.acquire().await?;
        let student = require_user(&mut conn, student_id).await?;

        let is_admin = actor.roles.contains_any(&[Role::ProgramChairperson, Role::Dean])
            && within_scope(&actor.scope(), &student.affiliation, self.policy);
        let is_adviser =
            db::advisers::get_adviser_id(&mut conn, student_id).await? == Some(actor.id);
        if actor.id != student_id && !is_admin && !is_adviser {
            return Err(WorkflowError::OutOfScope(format!(
                "rankings of student {} are not visible to user {}",
                student_id, actor.id
            )));
        }

        let filter = SubmissionFilter {
            kind: Some(SubmissionKind::ConceptPaper),
            status: None,
            student_id: Some(student_id),
        };
        let visibility = Visibility::Personal {
            student_ids: vec![student_id],
            reviewer_id: student_id,
        };
        let papers = db::submissions::list_submissions(&mut conn, &visibility, &filter).await?;

        let mut winners: Vec<(ConceptRanking, Option<RankedReview>)> = Vec::with_capacity(papers.len());
        for paper in papers {
            let assignments = db::assignments::list_for_submission(&mut conn, paper.id).await?;
            let reviews = db::reviews::list_for_submission(&mut conn, paper.id).await?;
            let ranked = ranked_reviews(&assignments, &reviews, paper.version);
            let winner = winning_review(&ranked).cloned();
            winners.push((
                ConceptRanking {
                    submission_id: paper.id,
                    title: paper.title,
                    status: paper.status,
                    winning_rank: winner.as_ref().and_then(|w| w.rank_order),
                    winning_review_id: winner.as_ref().map(|w| w.review_id),
                    ranked_by: winner.as_ref().map(|w| w.reviewer_id),
                    top_pick: false,
                },
                winner,
            ));
        }

        let overall: Vec<RankedReview> = winners.iter().filter_map(|(_, w)| w.clone()).collect();
        let top = winning_review(&overall).map(|w| w.review_id);
        Ok(winners
            .into_iter()
            .map(|(mut ranking, _)| {
                ranking.top_pick = top.is_some() && ranking.winning_review_id == top;
                ranking
            })
            .collect())
    }

    /// Assignments addressed to the actor, soonest due first
    pub async fn list_my_assignments(&self, actor: &Actor) -> Result<Vec<ReviewerAssignment>> {
        let mut conn = self.db.acquire().await?;
        db::assignments::list_for_reviewer(&mut conn, actor.id).await
    }

    pub async fn list_notifications(&self, actor: &Actor, unread_only: bool) -> Result<Vec<Notification>> {
        let mut conn = self.db.acquire().await?;
        db::notifications::list_for_user(&mut conn, actor.id, unread_only).await
    }

    pub async fn mark_notification_read(&self, actor: &Actor, notification_id: Uuid) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        if db::notifications::mark_read(&mut conn, actor.id, notification_id).await? == 0 {
            return Err(WorkflowError::NotFound(format!(
                "notification {}",
                notification_id
            )));
        }
        Ok(())
    }
}
