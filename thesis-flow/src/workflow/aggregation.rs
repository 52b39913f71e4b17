//! Review aggregation
//!
//! Pure functions deriving a submission's status from its reviewer
//! records. The stored status is only a cache of these results and is
//! recomputed whenever a review or signature changes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{AssignmentStatus, SubmissionKind, SubmissionStatus, Verdict};
use crate::roles::Role;

/// One reviewer's position on the current version of a submission
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewerState {
    pub role: Role,
    pub assignment_status: AssignmentStatus,
    pub verdict: Option<Verdict>,
    pub signature: Option<String>,
}

impl ReviewerState {
    fn is_active(&self) -> bool {
        self.assignment_status != AssignmentStatus::Declined
    }

    fn is_signed(&self) -> bool {
        self.signature
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Adviser ranking attached to a concept paper review
#[derive(Debug, Clone, PartialEq)]
pub struct RankedReview {
    pub review_id: Uuid,
    pub reviewer_id: Uuid,
    pub rank_order: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

/// Best-ranked review: lowest `rank_order`, ties broken by most recent update
///
/// Reviews without a rank never win.
pub fn winning_review(reviews: &[RankedReview]) -> Option<&RankedReview> {
    reviews
        .iter()
        .filter(|r| r.rank_order.is_some())
        .min_by(|a, b| {
            a.rank_order
                .cmp(&b.rank_order)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        })
}

/// Every chairperson and panel signature is present
///
/// A route slip needs at least one chairperson and two panel members, and
/// each of them must carry a non-empty signature. Other roles are ignored.
pub fn route_slip_fully_signed(signoffs: &[ReviewerState]) -> bool {
    let committee: Vec<&ReviewerState> = signoffs
        .iter()
        .filter(|s| s.is_active())
        .filter(|s| matches!(s.role, Role::CommitteeChairperson | Role::Panel))
        .collect();

    let chairs = committee
        .iter()
        .filter(|s| s.role == Role::CommitteeChairperson)
        .count();
    let panels = committee.iter().filter(|s| s.role == Role::Panel).count();

    chairs >= 1 && panels >= 2 && committee.iter().all(|s| s.is_signed())
}

/// Outcome of a hardbound committee review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitteeOutcome {
    Passed,
    NeedsRevision,
    Pending,
}

/// Hardbound committee result
///
/// Passed only when every active reviewer has a passing verdict; any
/// revision request wins regardless of the order reviews arrived in.
pub fn committee_aggregate(states: &[ReviewerState]) -> CommitteeOutcome {
    let active: Vec<&ReviewerState> = states.iter().filter(|s| s.is_active()).collect();

    if active
        .iter()
        .any(|s| s.verdict.map(|v| v.is_revision()).unwrap_or(false))
    {
        return CommitteeOutcome::NeedsRevision;
    }

    if !active.is_empty()
        && active
            .iter()
            .all(|s| s.verdict.map(|v| v.is_favorable()).unwrap_or(false))
    {
        return CommitteeOutcome::Passed;
    }

    CommitteeOutcome::Pending
}

/// Derived status of a submission from its reviewer records
pub fn review_aggregate(kind: SubmissionKind, states: &[ReviewerState]) -> SubmissionStatus {
    match kind {
        SubmissionKind::Hardbound => match committee_aggregate(states) {
            CommitteeOutcome::Passed => SubmissionStatus::Passed,
            CommitteeOutcome::NeedsRevision => SubmissionStatus::NeedsRevision,
            CommitteeOutcome::Pending => SubmissionStatus::UnderReview,
        },
        SubmissionKind::RouteSlip => {
            if route_slip_fully_signed(states) {
                SubmissionStatus::Passed
            } else {
                SubmissionStatus::UnderReview
            }
        }
        SubmissionKind::ConceptPaper | SubmissionKind::OutlineDefenseManuscript => {
            let active: Vec<&ReviewerState> = states.iter().filter(|s| s.is_active()).collect();

            if active
                .iter()
                .any(|s| s.verdict.map(|v| v.is_revision()).unwrap_or(false))
            {
                return SubmissionStatus::NeedsRevision;
            }

            let all_in = !active.is_empty() && active.iter().all(|s| s.verdict.is_some());
            if !all_in {
                return SubmissionStatus::UnderReview;
            }

            if active.iter().any(|s| s.verdict == Some(Verdict::Rejected)) {
                SubmissionStatus::Rejected
            } else if kind == SubmissionKind::ConceptPaper {
                SubmissionStatus::Approved
            } else {
                SubmissionStatus::Passed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn state(role: Role, verdict: Option<Verdict>, signature: Option<&str>) -> ReviewerState {
        ReviewerState {
            role,
            assignment_status: if verdict.is_some() {
                AssignmentStatus::Completed
            } else {
                AssignmentStatus::Pending
            },
            verdict,
            signature: signature.map(str::to_string),
        }
    }

    fn ranked(rank: Option<i64>, minute: u32) -> RankedReview {
        RankedReview {
            review_id: Uuid::new_v4(),
            reviewer_id: Uuid::new_v4(),
            rank_order: rank,
            updated_at: Utc.with_ymd_and_hms(2025, 1, 1, 10, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_winning_review_lowest_rank() {
        let reviews = vec![ranked(Some(2), 0), ranked(Some(1), 0), ranked(Some(3), 0)];
        assert_eq!(winning_review(&reviews).unwrap().rank_order, Some(1));
    }

    #[test]
    fn test_winning_review_tie_prefers_latest_update() {
        let older = ranked(Some(1), 5);
        let newer = ranked(Some(1), 30);
        let reviews = vec![older.clone(), newer.clone()];
        assert_eq!(winning_review(&reviews).unwrap().review_id, newer.review_id);
        let reviews = vec![newer.clone(), older];
        assert_eq!(winning_review(&reviews).unwrap().review_id, newer.review_id);
    }

    #[test]
    fn test_winning_review_ignores_unranked() {
        assert!(winning_review(&[ranked(None, 0)]).is_none());
        assert!(winning_review(&[]).is_none());
    }

    #[test]
    fn test_route_slip_needs_every_signature() {
        let signed = vec![
            state(Role::CommitteeChairperson, Some(Verdict::Approved), Some("sig/c.png")),
            state(Role::Panel, Some(Verdict::Approved), Some("sig/p1.png")),
            state(Role::Panel, Some(Verdict::MinorRevision), Some("sig/p2.png")),
        ];
        assert!(route_slip_fully_signed(&signed));

        let mut one_missing = signed.clone();
        one_missing[2].signature = None;
        assert!(!route_slip_fully_signed(&one_missing));

        let mut blank = signed.clone();
        blank[0].signature = Some("  ".to_string());
        assert!(!route_slip_fully_signed(&blank));
    }

    #[test]
    fn test_route_slip_requires_full_committee() {
        let short = vec![
            state(Role::CommitteeChairperson, Some(Verdict::Approved), Some("c")),
            state(Role::Panel, Some(Verdict::Approved), Some("p")),
        ];
        assert!(!route_slip_fully_signed(&short));
        assert!(!route_slip_fully_signed(&[]));
    }

    #[test]
    fn test_committee_aggregate_any_revision_wins() {
        let orders = [
            [Some(Verdict::Passed), Some(Verdict::Passed), Some(Verdict::NeedsRevision)],
            [Some(Verdict::NeedsRevision), Some(Verdict::Passed), Some(Verdict::Passed)],
            [Some(Verdict::Passed), Some(Verdict::NeedsRevision), Some(Verdict::Passed)],
        ];
        for verdicts in orders {
            let states: Vec<_> = verdicts.iter().map(|v| state(Role::Panel, *v, None)).collect();
            assert_eq!(committee_aggregate(&states), CommitteeOutcome::NeedsRevision);
        }
    }

    #[test]
    fn test_committee_aggregate_passed_and_pending() {
        let all_passed = vec![
            state(Role::Panel, Some(Verdict::Passed), None),
            state(Role::Panel, Some(Verdict::Approved), None),
            state(Role::CommitteeChairperson, Some(Verdict::Passed), None),
        ];
        assert_eq!(committee_aggregate(&all_passed), CommitteeOutcome::Passed);

        let mut waiting = all_passed.clone();
        waiting[1] = state(Role::Panel, None, None);
        assert_eq!(committee_aggregate(&waiting), CommitteeOutcome::Pending);
        assert_eq!(committee_aggregate(&[]), CommitteeOutcome::Pending);
    }

    #[test]
    fn test_declined_reviewers_are_excluded() {
        let mut declined = state(Role::Panel, None, None);
        declined.assignment_status = AssignmentStatus::Declined;
        let states = vec![
            state(Role::Adviser, Some(Verdict::Approved), None),
            declined,
        ];
        assert_eq!(
            review_aggregate(SubmissionKind::ConceptPaper, &states),
            SubmissionStatus::Approved
        );
    }

    #[test]
    fn test_review_aggregate_concept_paper() {
        let pending = vec![
            state(Role::Adviser, Some(Verdict::Approved), None),
            state(Role::Adviser, None, None),
        ];
        assert_eq!(
            review_aggregate(SubmissionKind::ConceptPaper, &pending),
            SubmissionStatus::UnderReview
        );

        let rejected = vec![
            state(Role::Adviser, Some(Verdict::Approved), None),
            state(Role::Adviser, Some(Verdict::Rejected), None),
        ];
        assert_eq!(
            review_aggregate(SubmissionKind::ConceptPaper, &rejected),
            SubmissionStatus::Rejected
        );

        let revise = vec![
            state(Role::Adviser, Some(Verdict::NeedsRevision), None),
            state(Role::Adviser, None, None),
        ];
        assert_eq!(
            review_aggregate(SubmissionKind::ConceptPaper, &revise),
            SubmissionStatus::NeedsRevision
        );
    }

    #[test]
    fn test_review_aggregate_manuscript_passes() {
        let states = vec![
            state(Role::Adviser, Some(Verdict::Approved), None),
            state(Role::Panel, Some(Verdict::Approved), None),
        ];
        assert_eq!(
            review_aggregate(SubmissionKind::OutlineDefenseManuscript, &states),
            SubmissionStatus::Passed
        );
    }
}
