//! Submission lifecycle
//!
//! The transition table per submission kind, and the guarded write that
//! moves a submission between states. Derived review states may move
//! freely among themselves because the stored status is recomputed from
//! reviews; every other edge is listed explicitly.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;

use crate::db;
use crate::error::{Result, WorkflowError};
use crate::models::{Submission, SubmissionKind, SubmissionStatus};
use crate::workflow::notify::Outbox;
use thesis_common::WorkflowEvent;

use SubmissionStatus::*;

/// Statuses review aggregation may produce for a kind
pub fn derived_states(kind: SubmissionKind) -> &'static [SubmissionStatus] {
    match kind {
        SubmissionKind::ConceptPaper => &[UnderReview, NeedsRevision, Approved, Rejected],
        SubmissionKind::OutlineDefenseManuscript => &[UnderReview, NeedsRevision, Passed, Rejected],
        SubmissionKind::Hardbound => &[UnderReview, NeedsRevision, Passed],
        SubmissionKind::RouteSlip => &[UnderReview, Passed],
    }
}

/// Reviewers may record or change reviews in these statuses
pub fn is_review_open(kind: SubmissionKind, status: SubmissionStatus) -> bool {
    status == Submitted || derived_states(kind).contains(&status)
}

/// Student may upload a new version from these statuses
pub fn is_resubmittable(kind: SubmissionKind, status: SubmissionStatus) -> bool {
    kind != SubmissionKind::RouteSlip && matches!(status, NeedsRevision | Rejected)
}

/// Whether `from → to` is a legal edge for `kind`
pub fn can_transition(kind: SubmissionKind, from: SubmissionStatus, to: SubmissionStatus) -> bool {
    if from == to {
        return false;
    }

    let derived = derived_states(kind);
    if is_review_open(kind, from) && derived.contains(&to) {
        return true;
    }

    if to == Submitted {
        return is_resubmittable(kind, from);
    }

    match kind {
        SubmissionKind::OutlineDefenseManuscript => {
            // Overall route slip decision. A resubmitted manuscript, or one
            // the committee request never named, still sits in Submitted.
            matches!(
                (from, to),
                (Submitted | UnderReview | Passed | NeedsRevision, Approved)
                    | (Passed | Approved, NeedsRevision)
                    | (Passed | Approved, Rejected)
            )
        }
        SubmissionKind::Hardbound => matches!((from, to), (Passed, Verified) | (Passed, Rejected)),
        SubmissionKind::RouteSlip => matches!((from, to), (Passed, Verified)),
        SubmissionKind::ConceptPaper => false,
    }
}

/// Move a submission to `to`, guarded on the status that was read
///
/// Queues a `SubmissionStatusChanged` event on the outbox. Fails with
/// `StateChanged` when the edge is illegal or another writer moved the row.
pub async fn transition(
    conn: &mut SqliteConnection,
    outbox: &mut Outbox,
    submission: &Submission,
    to: SubmissionStatus,
) -> Result<()> {
    let from = submission.status;
    if !can_transition(submission.kind, from, to) {
        return Err(WorkflowError::StateChanged(format!(
            "{} {} cannot move from {} to {}",
            submission.kind, submission.id, from, to
        )));
    }

    let rows = db::submissions::update_status(&mut *conn, submission.id, from, to).await?;
    if rows == 0 {
        return Err(WorkflowError::StateChanged(format!(
            "{} {} is no longer {}",
            submission.kind, submission.id, from
        )));
    }

    info!(
        "Submission {} ({}) {} -> {}",
        submission.id, submission.kind, from, to
    );
    outbox.event(WorkflowEvent::SubmissionStatusChanged {
        submission_id: submission.id,
        kind: submission.kind.as_str().to_string(),
        old_status: from.as_str().to_string(),
        new_status: to.as_str().to_string(),
        timestamp: Utc::now(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardbound_verification_only_from_passed() {
        let k = SubmissionKind::Hardbound;
        assert!(can_transition(k, Passed, Verified));
        assert!(can_transition(k, Passed, Rejected));
        for from in [Submitted, UnderReview, NeedsRevision, Approved, Rejected] {
            assert!(!can_transition(k, from, Verified), "{} -> verified", from);
        }
    }

    #[test]
    fn test_resubmission_edges() {
        let k = SubmissionKind::ConceptPaper;
        assert!(can_transition(k, NeedsRevision, Submitted));
        assert!(can_transition(k, Rejected, Submitted));
        assert!(!can_transition(k, UnderReview, Submitted));
        assert!(!can_transition(k, Approved, Submitted));
        assert!(!can_transition(SubmissionKind::RouteSlip, UnderReview, Submitted));
    }

    #[test]
    fn test_review_recomputation_edges() {
        let k = SubmissionKind::Hardbound;
        assert!(can_transition(k, Submitted, UnderReview));
        assert!(can_transition(k, NeedsRevision, Passed));
        assert!(can_transition(k, Passed, NeedsRevision));
        assert!(!can_transition(k, Verified, NeedsRevision));
    }

    #[test]
    fn test_manuscript_route_slip_outcomes() {
        let k = SubmissionKind::OutlineDefenseManuscript;
        assert!(can_transition(k, UnderReview, Approved));
        assert!(can_transition(k, Passed, Approved));
        assert!(can_transition(k, Submitted, Approved));
        assert!(can_transition(k, NeedsRevision, Approved));
        assert!(can_transition(k, Approved, NeedsRevision));
        assert!(!can_transition(k, Rejected, Approved));
        assert!(!can_transition(k, Approved, Verified));
    }

    #[test]
    fn test_route_slip_verification() {
        let k = SubmissionKind::RouteSlip;
        assert!(can_transition(k, Passed, Verified));
        assert!(!can_transition(k, UnderReview, Verified));
    }

    #[test]
    fn test_review_open_states() {
        assert!(is_review_open(SubmissionKind::ConceptPaper, Submitted));
        assert!(is_review_open(SubmissionKind::Hardbound, NeedsRevision));
        assert!(!is_review_open(SubmissionKind::Hardbound, Verified));
        assert!(!is_review_open(SubmissionKind::OutlineDefenseManuscript, Approved));
    }
}
