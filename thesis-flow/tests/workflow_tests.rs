//! Integration tests for adviser assignment, scope, submissions, reviews
//! and notifications

mod helpers;

use helpers::*;
use std::time::Duration;
use thesis_common::config::WorkflowSettings;
use thesis_common::WorkflowEvent;
use thesis_flow::db::submissions::SubmissionFilter;
use thesis_flow::error::WorkflowError;
use thesis_flow::models::{AssignmentStatus, NewUser, SubmissionKind, SubmissionStatus};
use thesis_flow::roles::Role;
use thesis_flow::workflow::{AdviserExclusivity, ReviewInput};
use uuid::Uuid;

fn verdict(v: &str) -> ReviewInput {
    ReviewInput {
        verdict: v.to_string(),
        ..Default::default()
    }
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_email_is_registered_once() {
    let h = Harness::new().await;
    let registration = || NewUser {
        firstname: "Sofia".to_string(),
        lastname: "Ramos".to_string(),
        email: Some("sofia@example.edu".to_string()),
        program: Some(PROGRAM.to_string()),
        department: None,
        college: None,
        roles: vec![Role::Student],
    };

    h.engine.register_user(registration()).await.unwrap();
    let err = h.engine.register_user(registration()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_granting_a_role_twice_is_a_no_op() {
    let h = Harness::new().await;
    let faculty = h.user("Alma Lim", &[Role::Faculty]).await;

    assert!(h.engine.grant_role(faculty.id, Role::Adviser).await.unwrap());
    assert!(!h.engine.grant_role(faculty.id, Role::Adviser).await.unwrap());

    let reloaded = h.reload(&faculty).await;
    assert!(reloaded.has(Role::Adviser));
    assert!(reloaded.has(Role::Faculty));

    let memberships: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE user_id = ? AND role = 'adviser'")
            .bind(faculty.id.to_string())
            .fetch_one(h.engine.db())
            .await
            .unwrap();
    assert_eq!(memberships, 1);

    let err = h.engine.grant_role(Uuid::new_v4(), Role::Adviser).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

// =============================================================================
// Adviser assignment
// =============================================================================

#[tokio::test]
async fn test_student_has_at_most_one_adviser() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let first = h.user("Alma Lim", &[Role::Faculty]).await;
    let second = h.user("Ben Ong", &[Role::Faculty]).await;

    let link = h
        .engine
        .assign_adviser(&admins.program_chair, student.id, first.id, AdviserExclusivity::Required)
        .await
        .unwrap();
    assert!(link.role_granted);
    assert_eq!(link.previous_adviser_id, None);
    assert!(h.reload(&first).await.has(Role::Adviser));

    let err = h
        .engine
        .assign_adviser(&admins.program_chair, student.id, second.id, AdviserExclusivity::Required)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadyAssigned(_)));

    let err = h.engine.self_assign_adviser(&student, second.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadyAssigned(_)));

    let link = h
        .engine
        .assign_adviser(&admins.program_chair, student.id, second.id, AdviserExclusivity::Replace)
        .await
        .unwrap();
    assert_eq!(link.previous_adviser_id, Some(first.id));
    assert_eq!(link.adviser_id, second.id);
}

#[tokio::test]
async fn test_adviser_must_be_faculty() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let classmate = h.user("Leo Reyes", &[Role::Student]).await;

    let err = h
        .engine
        .assign_adviser(&admins.program_chair, student.id, classmate.id, AdviserExclusivity::Required)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::IneligibleMember(_)));

    let err = h
        .engine
        .assign_adviser(&admins.program_chair, student.id, student.id, AdviserExclusivity::Required)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[tokio::test]
async fn test_only_program_chair_assigns_advisers() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let adviser = h.user("Alma Lim", &[Role::Faculty]).await;

    let err = h
        .engine
        .assign_adviser(&admins.dean, student.id, adviser.id, AdviserExclusivity::Required)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::MissingCapability(_)));
}

#[tokio::test]
async fn test_student_self_assigns_adviser() {
    let h = Harness::new().await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let adviser = h.user("Alma Lim", &[Role::Faculty]).await;

    let link = h.engine.self_assign_adviser(&student, adviser.id).await.unwrap();
    assert_eq!(link.student_id, student.id);
    assert_eq!(link.adviser_id, adviser.id);
}

#[tokio::test]
async fn test_unassign_adviser() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let adviser = h.user("Alma Lim", &[Role::Faculty]).await;

    h.engine
        .assign_adviser(&admins.program_chair, student.id, adviser.id, AdviserExclusivity::Required)
        .await
        .unwrap();
    let previous = h
        .engine
        .unassign_adviser(&admins.program_chair, student.id)
        .await
        .unwrap();
    assert_eq!(previous, adviser.id);

    let err = h
        .engine
        .unassign_adviser(&admins.program_chair, student.id)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

// =============================================================================
// Scope
// =============================================================================

#[tokio::test]
async fn test_out_of_scope_student_is_refused() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let outsider = h
        .user_in("Ivan Dela", &[Role::Student], Some("MBA"), Some("Business"), Some("College of Business"))
        .await;
    let adviser = h.user("Alma Lim", &[Role::Faculty]).await;

    let err = h
        .engine
        .assign_adviser(&admins.program_chair, outsider.id, adviser.id, AdviserExclusivity::Required)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::OutOfScope(_)));

    // Unassigning reveals nothing about students outside the scope
    h.engine.self_assign_adviser(&outsider, adviser.id).await.unwrap();
    let err = h
        .engine
        .unassign_adviser(&admins.program_chair, outsider.id)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

#[tokio::test]
async fn test_empty_scope_denies_by_default() {
    let h = Harness::new().await;
    let unscoped = h
        .user_in("Nora Vidal", &[Role::Faculty, Role::ProgramChairperson], None, None, None)
        .await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let adviser = h.user("Alma Lim", &[Role::Faculty]).await;

    let err = h
        .engine
        .assign_adviser(&unscoped, student.id, adviser.id, AdviserExclusivity::Required)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::OutOfScope(_)));

    let page = h.engine.list_unassigned_students(&unscoped, 1).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_empty_scope_opens_when_configured() {
    let settings = WorkflowSettings {
        open_scope_when_unset: true,
        ..WorkflowSettings::default()
    };
    let h = Harness::with_settings(settings).await;
    let unscoped = h
        .user_in("Nora Vidal", &[Role::Faculty, Role::ProgramChairperson], None, None, None)
        .await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let adviser = h.user("Alma Lim", &[Role::Faculty]).await;

    h.engine
        .assign_adviser(&unscoped, student.id, adviser.id, AdviserExclusivity::Required)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unassigned_students_are_paged_within_scope() {
    let settings = WorkflowSettings {
        unassigned_page_size: 2,
        ..WorkflowSettings::default()
    };
    let h = Harness::with_settings(settings).await;
    let admins = Admins::new(&h).await;
    for name in ["Ana Abad", "Bea Bautista", "Cris Castro"] {
        h.user(name, &[Role::Student]).await;
    }
    h.user_in("Ivan Dela", &[Role::Student], Some("MBA"), Some("Business"), Some("College of Business"))
        .await;

    let first = h
        .engine
        .list_unassigned_students(&admins.program_chair, 1)
        .await
        .unwrap();
    assert_eq!(first.total, 3);
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.pagination.total_pages, 2);
    assert_eq!(first.items[0].lastname, "Abad");

    let second = h
        .engine
        .list_unassigned_students(&admins.program_chair, 2)
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].lastname, "Castro");
}

// =============================================================================
// Submissions and reviews
// =============================================================================

#[tokio::test]
async fn test_failed_upload_leaves_no_submission() {
    let h = Harness::new().await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;

    h.blobs.fail_writes(true);
    let err = h
        .engine
        .submit(&student, SubmissionKind::ConceptPaper, "Offline Maps", upload("paper.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::StorageFailure(_)));
    assert!(err.is_retryable());

    let listed = h
        .engine
        .fetch_submissions_for_actor(&student, SubmissionFilter::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
    assert!(h.blobs.is_empty());
}

#[tokio::test]
async fn test_route_slip_cannot_be_submitted_by_student() {
    let h = Harness::new().await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;

    let err = h
        .engine
        .submit(&student, SubmissionKind::RouteSlip, "Slip", upload("slip.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[tokio::test]
async fn test_revision_and_resubmission() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let panel = h.user("Pia Go", &[Role::Faculty]).await;

    let paper = h
        .engine
        .submit(&student, SubmissionKind::ConceptPaper, "Offline Maps", upload("paper.pdf"))
        .await
        .unwrap();
    assert_eq!(paper.status, SubmissionStatus::Submitted);
    assert_eq!(paper.version, 1);

    let assignment = h
        .engine
        .assign_reviewer(&admins.program_chair, paper.id, panel.id, Role::Panel, None, None)
        .await
        .unwrap();

    let outcome = h
        .engine
        .record_review(&panel, assignment.id, verdict("needs revision"))
        .await
        .unwrap();
    assert_eq!(outcome.submission_status, SubmissionStatus::NeedsRevision);

    let revised = h
        .engine
        .resubmit(&student, paper.id, Some("Offline Maps for Field Nurses"), Some(upload("paper-v2.pdf")))
        .await
        .unwrap();
    assert_eq!(revised.version, 2);
    assert_eq!(revised.status, SubmissionStatus::Submitted);
    assert_ne!(revised.file_path, paper.file_path);

    let (current, history) = h.engine.submission_history(&student, paper.id).await.unwrap();
    assert_eq!(current.title, "Offline Maps for Field Nurses");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version, 1);
    assert_eq!(history[0].file_path, paper.file_path);

    let detail = h.engine.submission_detail(&panel, paper.id).await.unwrap();
    assert_eq!(detail.assignments[0].status, AssignmentStatus::Pending);
    assert!(detail.reviews.is_empty(), "old-version reviews are not current");

    // Approved papers cannot be resubmitted
    let outcome = h
        .engine
        .record_review(&panel, assignment.id, verdict("approved"))
        .await
        .unwrap();
    assert_eq!(outcome.submission_status, SubmissionStatus::Approved);
    let err = h.engine.resubmit(&student, paper.id, None, None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::StateChanged(_)));
}

#[tokio::test]
async fn test_second_revision_becomes_version_three() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let panel = h.user("Pia Go", &[Role::Faculty]).await;

    let paper = h
        .engine
        .submit(&student, SubmissionKind::ConceptPaper, "Offline Maps", upload("paper.pdf"))
        .await
        .unwrap();
    let assignment = h
        .engine
        .assign_reviewer(&admins.program_chair, paper.id, panel.id, Role::Panel, None, None)
        .await
        .unwrap();

    h.engine
        .record_review(&panel, assignment.id, verdict("needs revision"))
        .await
        .unwrap();
    let v2 = h
        .engine
        .resubmit(&student, paper.id, None, Some(upload("paper-v2.pdf")))
        .await
        .unwrap();
    assert_eq!(v2.version, 2);

    let outcome = h
        .engine
        .record_review(&panel, assignment.id, verdict("needs revision"))
        .await
        .unwrap();
    assert_eq!(outcome.submission_status, SubmissionStatus::NeedsRevision);

    let v3 = h
        .engine
        .resubmit(&student, paper.id, None, Some(upload("paper-v3.pdf")))
        .await
        .unwrap();
    assert_eq!(v3.version, 3);
    assert_eq!(v3.status, SubmissionStatus::Submitted);
    assert_ne!(v3.file_path, v2.file_path);

    let (current, history) = h.engine.submission_history(&student, paper.id).await.unwrap();
    assert_eq!(current.file_path, v3.file_path);
    let versions: Vec<_> = history.iter().map(|v| v.version).collect();
    assert_eq!(versions, vec![1, 2]);
    assert_eq!(history[1].file_path, v2.file_path);
}

#[tokio::test]
async fn test_verdict_must_fit_kind() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let panel = h.user("Pia Go", &[Role::Faculty]).await;

    let paper = h
        .engine
        .submit(&student, SubmissionKind::ConceptPaper, "Offline Maps", upload("paper.pdf"))
        .await
        .unwrap();
    let assignment = h
        .engine
        .assign_reviewer(&admins.program_chair, paper.id, panel.id, Role::Panel, None, None)
        .await
        .unwrap();

    let err = h
        .engine
        .record_review(&panel, assignment.id, verdict("passed"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidVerdict(_)));

    let stranger = h.user("Raul Uy", &[Role::Faculty]).await;
    let err = h
        .engine
        .record_review(&stranger, assignment.id, verdict("approved"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotAssigned(_)));
}

#[tokio::test]
async fn test_declined_reviewer_leaves_aggregate() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let first = h.user("Pia Go", &[Role::Faculty]).await;
    let second = h.user("Raul Uy", &[Role::Faculty]).await;

    let paper = h
        .engine
        .submit(&student, SubmissionKind::ConceptPaper, "Offline Maps", upload("paper.pdf"))
        .await
        .unwrap();
    let a1 = h
        .engine
        .assign_reviewer(&admins.program_chair, paper.id, first.id, Role::Panel, None, None)
        .await
        .unwrap();
    let a2 = h
        .engine
        .assign_reviewer(&admins.program_chair, paper.id, second.id, Role::Panel, None, None)
        .await
        .unwrap();

    h.engine.start_review(&first, a1.id).await.unwrap();
    let outcome = h
        .engine
        .record_review(&first, a1.id, verdict("approved"))
        .await
        .unwrap();
    assert_eq!(outcome.submission_status, SubmissionStatus::UnderReview);

    let err = h
        .engine
        .record_decline_feedback(&second, a2.id, "  ")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let declined = h
        .engine
        .record_decline_feedback(&second, a2.id, "On sabbatical")
        .await
        .unwrap();
    assert_eq!(declined.status, AssignmentStatus::Declined);
    assert_eq!(declined.decline_reason.as_deref(), Some("On sabbatical"));

    let detail = h.engine.submission_detail(&student, paper.id).await.unwrap();
    assert_eq!(detail.submission.status, SubmissionStatus::Approved);
}

#[tokio::test]
async fn test_concept_rank_ties_go_to_latest_review() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let adviser = h.user("Alma Lim", &[Role::Faculty]).await;
    let panel = h.user("Pia Go", &[Role::Faculty]).await;
    h.engine
        .assign_adviser(&admins.program_chair, student.id, adviser.id, AdviserExclusivity::Required)
        .await
        .unwrap();
    let adviser = h.reload(&adviser).await;

    let mut papers = Vec::new();
    for title in ["Offline Maps", "Clinic Queues", "Flood Sensors"] {
        let paper = h
            .engine
            .submit(&student, SubmissionKind::ConceptPaper, title, upload("paper.pdf"))
            .await
            .unwrap();
        h.engine
            .assign_reviewer(&admins.program_chair, paper.id, adviser.id, Role::Adviser, None, None)
            .await
            .unwrap();
        papers.push(paper);
    }

    // Only advisers rank
    let panel_assignment = h
        .engine
        .assign_reviewer(&admins.program_chair, papers[0].id, panel.id, Role::Panel, None, None)
        .await
        .unwrap();
    let err = h
        .engine
        .record_review(
            &panel,
            panel_assignment.id,
            ReviewInput {
                rank_order: Some(1),
                ..verdict("approved")
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let ranks = [(0, 1), (1, 2), (2, 1)];
    for (index, rank) in ranks {
        let assignment = assignment_for(&h, &adviser, papers[index].id).await;
        h.engine
            .record_review(
                &adviser,
                assignment,
                ReviewInput {
                    rank_order: Some(rank),
                    ..verdict("approved")
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let rankings = h.engine.concept_paper_rankings(&student, student.id).await.unwrap();
    assert_eq!(rankings.len(), 3);
    let top: Vec<_> = rankings.iter().filter(|r| r.top_pick).collect();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].submission_id, papers[2].id);
    assert_eq!(top[0].winning_rank, Some(1));
    assert_eq!(top[0].ranked_by, Some(adviser.id));

    let outsider = h.user("Ivan Dela", &[Role::Student]).await;
    let err = h
        .engine
        .concept_paper_rankings(&outsider, student.id)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::OutOfScope(_)));
}

#[tokio::test]
async fn test_rank_outside_bounds_is_rejected() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let adviser = h.user("Alma Lim", &[Role::Faculty]).await;

    let paper = h
        .engine
        .submit(&student, SubmissionKind::ConceptPaper, "Offline Maps", upload("paper.pdf"))
        .await
        .unwrap();
    let assignment = h
        .engine
        .assign_reviewer(&admins.program_chair, paper.id, adviser.id, Role::Adviser, None, None)
        .await
        .unwrap();

    for rank in [0, 11] {
        let err = h
            .engine
            .record_review(
                &adviser,
                assignment.id,
                ReviewInput {
                    rank_order: Some(rank),
                    ..verdict("approved")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)), "rank {}", rank);
    }
}

#[tokio::test]
async fn test_listing_respects_visibility() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let outsider = h
        .user_in("Ivan Dela", &[Role::Student], Some("MBA"), Some("Business"), Some("College of Business"))
        .await;

    let own = h
        .engine
        .submit(&student, SubmissionKind::ConceptPaper, "Offline Maps", upload("paper.pdf"))
        .await
        .unwrap();
    let foreign = h
        .engine
        .submit(&outsider, SubmissionKind::ConceptPaper, "Retail Forecasts", upload("paper.pdf"))
        .await
        .unwrap();

    let listed = h
        .engine
        .fetch_submissions_for_actor(&admins.program_chair, SubmissionFilter::default())
        .await
        .unwrap();
    let ids: Vec<_> = listed.iter().map(|p| p.submission.id).collect();
    assert!(ids.contains(&own.id));
    assert!(!ids.contains(&foreign.id));
    assert_eq!(listed[0].student_name, "Sofia Ramos");

    let err = h.engine.submission_detail(&student, foreign.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::OutOfScope(_)));
}

#[tokio::test]
async fn test_administrator_lists_own_advisees_outside_scope() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let advisee = h
        .user_in("Ivan Dela", &[Role::Student], Some("MBA"), Some("Business"), Some("College of Business"))
        .await;
    let stranger = h
        .user_in("Mara Sison", &[Role::Student], Some("MBA"), Some("Business"), Some("College of Business"))
        .await;
    h.engine
        .self_assign_adviser(&advisee, admins.program_chair.id)
        .await
        .unwrap();

    let advised = h
        .engine
        .submit(&advisee, SubmissionKind::ConceptPaper, "Retail Forecasts", upload("paper.pdf"))
        .await
        .unwrap();
    let foreign = h
        .engine
        .submit(&stranger, SubmissionKind::ConceptPaper, "Supply Chains", upload("paper.pdf"))
        .await
        .unwrap();

    let program_chair = h.reload(&admins.program_chair).await;
    let listed = h
        .engine
        .fetch_submissions_for_actor(&program_chair, SubmissionFilter::default())
        .await
        .unwrap();
    let ids: Vec<_> = listed.iter().map(|p| p.submission.id).collect();
    assert!(ids.contains(&advised.id));
    assert!(!ids.contains(&foreign.id));

    // Listing and detail agree
    h.engine.submission_detail(&program_chair, advised.id).await.unwrap();
    let err = h.engine.submission_detail(&program_chair, foreign.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::OutOfScope(_)));
}

// =============================================================================
// Notifications and events
// =============================================================================

#[tokio::test]
async fn test_notifications_follow_commit() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let adviser = h.user("Alma Lim", &[Role::Faculty]).await;

    h.engine
        .assign_adviser(&admins.program_chair, student.id, adviser.id, AdviserExclusivity::Required)
        .await
        .unwrap();

    let unread = h.engine.list_notifications(&student, true).await.unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].title, "Adviser assigned");

    let err = h
        .engine
        .mark_notification_read(&adviser, unread[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));

    h.engine.mark_notification_read(&student, unread[0].id).await.unwrap();
    assert!(h.engine.list_notifications(&student, true).await.unwrap().is_empty());
    assert_eq!(h.engine.list_notifications(&student, false).await.unwrap().len(), 1);

    // A refused operation notifies nobody
    let other = h.user("Ben Ong", &[Role::Faculty]).await;
    h.engine
        .assign_adviser(&admins.program_chair, student.id, other.id, AdviserExclusivity::Required)
        .await
        .unwrap_err();
    assert!(h.engine.list_notifications(&other, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_change_is_broadcast() {
    let h = Harness::new().await;
    let admins = Admins::new(&h).await;
    let student = h.user("Sofia Ramos", &[Role::Student]).await;
    let panel = h.user("Pia Go", &[Role::Faculty]).await;
    let mut rx = h.events.subscribe();

    let paper = h
        .engine
        .submit(&student, SubmissionKind::ConceptPaper, "Offline Maps", upload("paper.pdf"))
        .await
        .unwrap();
    h.engine
        .assign_reviewer(&admins.program_chair, paper.id, panel.id, Role::Panel, None, None)
        .await
        .unwrap();

    let mut statuses = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let WorkflowEvent::SubmissionStatusChanged {
            submission_id,
            new_status,
            ..
        } = event
        {
            assert_eq!(submission_id, paper.id);
            statuses.push(new_status);
        }
    }
    assert_eq!(statuses, vec!["under_review".to_string()]);
}
