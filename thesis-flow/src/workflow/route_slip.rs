//! Route slips: issue, committee sign-off, adviser finalization and the
//! chairperson's overall decision that yields a Notice to Commence

use chrono::Utc;
use serde::Serialize;
use thesis_common::WorkflowEvent;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::aggregation::route_slip_fully_signed;
use super::assignment::sync_reviewer_assignments;
use super::submission::blob_key;
use super::templates::{render_notice, NoticeFields};
use super::{refresh_status, require_submission, require_user, reviewer_states, state_machine};
use super::{UnitOfWork, WorkflowEngine};
use crate::actor::Actor;
use crate::blob::FileUpload;
use crate::db;
use crate::error::{is_unique_violation, Result, WorkflowError};
use crate::models::{
    AssignmentStatus, DecisionStatus, NoticeToCommence, RouteSlip, Submission, SubmissionKind,
    SubmissionStatus, Verdict,
};
use crate::roles::Role;
use crate::scope::{within_scope, Scope};

/// Adviser's route slip for a defended manuscript
#[derive(Debug, Clone)]
pub struct RouteSlipForm {
    pub manuscript_id: Uuid,
    pub course: String,
    pub panel_member: Option<String>,
    pub action_taken: String,
    pub upload: FileUpload,
}

/// Result of the chairperson's overall decision
#[derive(Debug, Clone, Serialize)]
pub struct RouteSlipDecision {
    pub route_slip: RouteSlip,
    pub manuscript_status: SubmissionStatus,
    pub notice: Option<NoticeToCommence>,
    /// The notice was generated by this call rather than found
    pub notice_created: bool,
}

/// Manuscript status that follows an overall decision
fn manuscript_status_for(decision: Verdict) -> SubmissionStatus {
    match decision {
        Verdict::Approved | Verdict::Passed => SubmissionStatus::Approved,
        Verdict::NeedsRevision | Verdict::MinorRevision | Verdict::MajorRevision => {
            SubmissionStatus::NeedsRevision
        }
        Verdict::Rejected => SubmissionStatus::Rejected,
    }
}

/// What the student is told about an overall decision
fn decision_message(decision: Verdict, title: &str) -> String {
    match decision {
        Verdict::Approved => format!(
            "The outline defense manuscript \"{}\" was approved. A Notice to Commence has been prepared.",
            title
        ),
        Verdict::Rejected => format!("The outline defense manuscript \"{}\" was rejected.", title),
        _ => format!(
            "The committee requires a {} of \"{}\".",
            decision.as_str().replace('_', " "),
            title
        ),
    }
}

async fn require_route_slip(uow: &mut UnitOfWork, id: Uuid) -> Result<RouteSlip> {
    db::route_slips::get_route_slip(uow.conn(), id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("route slip {}", id)))
}

impl WorkflowEngine {
    /// Adviser circulates a route slip to the approved defense committee
    pub async fn issue_route_slip(&self, actor: &Actor, form: RouteSlipForm) -> Result<RouteSlip> {
        actor.require(Role::Adviser)?;
        let course = form.course.trim().to_string();
        if course.is_empty() {
            return Err(WorkflowError::Validation("course is required".to_string()));
        }
        let action_taken = Verdict::parse_for(&form.action_taken, SubmissionKind::RouteSlip)?;
        let file_name = form.upload.validated_name()?;

        let mut uow = self.begin().await?;
        let result = async {
            let manuscript = require_submission(uow.conn(), form.manuscript_id).await?;
            if manuscript.kind != SubmissionKind::OutlineDefenseManuscript {
                return Err(WorkflowError::Validation(format!(
                    "route slips accompany an outline defense manuscript, not a {}",
                    manuscript.kind.label()
                )));
            }
            let adviser = db::advisers::get_adviser_id(uow.conn(), manuscript.student_id).await?;
            if adviser != Some(actor.id) {
                return Err(WorkflowError::OutOfScope(format!(
                    "user {} does not advise the author of {}",
                    actor.id, manuscript.id
                )));
            }

            if let Some(previous) =
                db::route_slips::latest_for_manuscript(uow.conn(), manuscript.id).await?
            {
                let slip_submission = require_submission(uow.conn(), previous.submission_id).await?;
                if previous.overall_decision.is_none()
                    && state_machine::is_review_open(slip_submission.kind, slip_submission.status)
                {
                    return Err(WorkflowError::StateChanged(format!(
                        "route slip {} is still circulating",
                        previous.id
                    )));
                }
            }

            let committee =
                db::committee::latest_approved_for_student(uow.conn(), manuscript.student_id)
                    .await?
                    .ok_or_else(|| {
                        WorkflowError::Validation(format!(
                            "student {} has no approved defense committee",
                            manuscript.student_id
                        ))
                    })?;

            let now = Utc::now();
            let id = Uuid::new_v4();
            let key = blob_key(SubmissionKind::RouteSlip, manuscript.student_id, id, 1, &file_name);
            let file_path = uow.put_blob(key, &form.upload.bytes).await?;

            let submission = Submission {
                id,
                student_id: manuscript.student_id,
                kind: SubmissionKind::RouteSlip,
                title: format!("Route slip: {}", manuscript.title),
                file_path,
                status: SubmissionStatus::Submitted,
                version: 1,
                submitted_at: now,
                reviewed_at: None,
                updated_at: now,
            };
            db::submissions::insert_submission(uow.conn(), &submission).await?;

            let slip = RouteSlip {
                id: Uuid::new_v4(),
                submission_id: submission.id,
                manuscript_id: manuscript.id,
                student_id: manuscript.student_id,
                adviser_id: actor.id,
                course,
                panel_member: form
                    .panel_member
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
                action_taken,
                overall_decision: None,
                overall_notes: None,
                decided_by: None,
                decided_at: None,
                adviser_signature_path: None,
                adviser_signed_at: None,
                created_at: now,
            };
            db::route_slips::insert_route_slip(uow.conn(), &slip).await?;

            let signers = [
                (committee.chair_id, Role::CommitteeChairperson),
                (committee.panel_ids[0], Role::Panel),
                (committee.panel_ids[1], Role::Panel),
            ];
            sync_reviewer_assignments(uow.conn(), submission.id, &signers, actor.id).await?;

            let (conn, outbox) = uow.split();
            refresh_status(conn, outbox, &submission).await?;

            info!(
                "Route slip {} issued for manuscript {} by {}",
                slip.id, manuscript.id, actor.id
            );
            for (user_id, _) in signers {
                uow.outbox.notify_user(
                    user_id,
                    "Route slip to sign",
                    format!(
                        "{} sent a route slip for \"{}\" ({}). Please record your decision and signature.",
                        actor.display_name, manuscript.title, action_taken
                    ),
                    Some(format!("/route-slips/{}", slip.id)),
                );
            }
            Ok(slip)
        }
        .await;
        self.finish(uow, result).await
    }

    /// Adviser applies the final signature once the committee has signed
    pub async fn apply_adviser_signature(
        &self,
        actor: &Actor,
        route_slip_id: Uuid,
        signature: FileUpload,
    ) -> Result<RouteSlip> {
        let file_name = signature.validated_name()?;

        let mut uow = self.begin().await?;
        let result = async {
            let slip = require_route_slip(&mut uow, route_slip_id).await?;
            if slip.adviser_id != actor.id {
                return Err(WorkflowError::NotAssigned(format!(
                    "user {} is not the adviser on route slip {}",
                    actor.id, route_slip_id
                )));
            }
            if slip.adviser_signature_path.is_some() {
                return Err(WorkflowError::AlreadyDecided(format!(
                    "route slip {} is already signed by the adviser",
                    route_slip_id
                )));
            }

            let submission = require_submission(uow.conn(), slip.submission_id).await?;
            let states = reviewer_states(uow.conn(), &submission).await?;
            if !route_slip_fully_signed(&states) {
                let signed = states.iter().filter(|s| s.signature.is_some()).count();
                return Err(WorkflowError::SignaturesPending(format!(
                    "route slip {} has {} of {} committee signatures",
                    route_slip_id,
                    signed,
                    states
                        .iter()
                        .filter(|s| s.assignment_status != AssignmentStatus::Declined)
                        .count()
                )));
            }

            let now = Utc::now();
            let key = format!("signatures/{}/adviser/{}", submission.id, file_name);
            let path = uow.put_blob(key, &signature.bytes).await?;
            if db::route_slips::set_adviser_signature(uow.conn(), slip.id, &path, now).await? == 0 {
                return Err(WorkflowError::AlreadyDecided(format!(
                    "route slip {} was signed concurrently",
                    route_slip_id
                )));
            }
            let (conn, outbox) = uow.split();
            state_machine::transition(conn, outbox, &submission, SubmissionStatus::Verified).await?;

            info!("Route slip {} finalized by adviser {}", slip.id, actor.id);
            match slip.overall_decision {
                Some(decision) => {
                    let manuscript = require_submission(uow.conn(), slip.manuscript_id).await?;
                    uow.outbox.notify_user(
                        slip.student_id,
                        "Route slip decision",
                        decision_message(decision, &manuscript.title),
                        Some(format!("/submissions/{}", manuscript.id)),
                    );
                }
                None => uow.outbox.notify_user(
                    slip.student_id,
                    "Route slip signed",
                    "Your adviser signed the route slip. It now awaits the committee chairperson's overall decision.",
                    Some(format!("/route-slips/{}", slip.id)),
                ),
            }
            require_route_slip(&mut uow, slip.id).await
        }
        .await;
        self.finish(uow, result).await
    }

    /// Committee chairperson records the overall decision on a manuscript
    ///
    /// `submission_id` may name the manuscript or its route slip. Approval
    /// marks the manuscript Approved and produces at most one live Notice to
    /// Commence; repeating an identical decision is harmless.
    pub async fn record_route_slip_overall_decision(
        &self,
        actor: &Actor,
        submission_id: Uuid,
        decision: &str,
        notes: Option<&str>,
    ) -> Result<RouteSlipDecision> {
        actor.require(Role::CommitteeChairperson)?;
        let decision = Verdict::parse_for(decision, SubmissionKind::RouteSlip)?;
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());

        let mut uow = self.begin().await?;
        let result = async {
            let target = require_submission(uow.conn(), submission_id).await?;
            let (manuscript, slip) = match target.kind {
                SubmissionKind::OutlineDefenseManuscript => {
                    let slip = db::route_slips::latest_for_manuscript(uow.conn(), target.id)
                        .await?
                        .ok_or_else(|| {
                            WorkflowError::NotFound(format!("route slip for manuscript {}", target.id))
                        })?;
                    (target, slip)
                }
                SubmissionKind::RouteSlip => {
                    let slip = db::route_slips::get_by_submission(uow.conn(), target.id)
                        .await?
                        .ok_or_else(|| {
                            WorkflowError::NotFound(format!("route slip for submission {}", target.id))
                        })?;
                    let manuscript = require_submission(uow.conn(), slip.manuscript_id).await?;
                    (manuscript, slip)
                }
                other => {
                    return Err(WorkflowError::Validation(format!(
                        "a {} has no route slip",
                        other.label()
                    )))
                }
            };

            let is_chair = db::assignments::list_for_submission(uow.conn(), slip.submission_id)
                .await?
                .iter()
                .any(|a| {
                    a.reviewer_id == actor.id
                        && a.role == Role::CommitteeChairperson
                        && a.status != AssignmentStatus::Declined
                });
            if !is_chair {
                return Err(WorkflowError::NotAssigned(format!(
                    "user {} is not the chairperson on route slip {}",
                    actor.id, slip.id
                )));
            }

            let now = Utc::now();
            let rows = db::route_slips::set_overall_decision(
                uow.conn(),
                slip.id,
                decision,
                notes,
                actor.id,
                now,
            )
            .await?;
            if rows == 0 {
                return Err(WorkflowError::AlreadyDecided(format!(
                    "route slip {} already carries a different decision",
                    slip.id
                )));
            }

            let wanted = manuscript_status_for(decision);
            if manuscript.status != wanted {
                let (conn, outbox) = uow.split();
                state_machine::transition(conn, outbox, &manuscript, wanted).await?;
            }
            let student = require_user(uow.conn(), manuscript.student_id).await?;
            let link = Some(format!("/submissions/{}", manuscript.id));

            let (notice, notice_created) = if decision == Verdict::Approved {
                let (notice, created) = self
                    .ensure_notice(&mut uow, &manuscript, &slip, notes)
                    .await?;
                (Some(notice), created)
            } else {
                (None, false)
            };

            let message = decision_message(decision, &manuscript.title);
            // The adviser's signature releases the decision to the student
            if slip.adviser_signature_path.is_some() {
                uow.outbox
                    .notify_user(student.id, "Route slip decision", message.clone(), link.clone());
            } else {
                debug!("Decision on route slip {} held until the adviser signs", slip.id);
            }
            if decision == Verdict::Approved {
                let admin_message = format!("{} ({})", message, student.display_name());
                uow.outbox.notify_role(
                    Role::ProgramChairperson,
                    &student.affiliation,
                    "Notice to Commence ready",
                    admin_message.clone(),
                    link.clone(),
                );
                uow.outbox.notify_role(
                    Role::Dean,
                    &student.affiliation,
                    "Outline defense approved",
                    admin_message,
                    link,
                );
            }
            info!(
                "Overall decision {} on route slip {} by {}",
                decision, slip.id, actor.id
            );

            Ok(RouteSlipDecision {
                route_slip: require_route_slip(&mut uow, slip.id).await?,
                manuscript_status: wanted,
                notice,
                notice_created,
            })
        }
        .await;
        self.finish(uow, result).await
    }

    /// Return the live notice for a manuscript, creating it if none exists
    async fn ensure_notice(
        &self,
        uow: &mut UnitOfWork,
        manuscript: &Submission,
        slip: &RouteSlip,
        notes: Option<&str>,
    ) -> Result<(NoticeToCommence, bool)> {
        if let Some(existing) = db::notices::live_for_submission(uow.conn(), manuscript.id).await? {
            info!("Notice to Commence {} already exists for {}", existing.id, manuscript.id);
            return Ok((existing, false));
        }

        let student = require_user(uow.conn(), manuscript.student_id).await?;
        let committee = match db::committee::latest_approved_for_student(uow.conn(), student.id).await? {
            Some(request) => self.committee_names(uow, &request).await?,
            None => Default::default(),
        };

        let program_chair = db::users::users_with_role(uow.conn(), Role::ProgramChairperson)
            .await?
            .into_iter()
            .find(|u| {
                let scope = Scope::for_role(Role::ProgramChairperson, &u.affiliation);
                within_scope(&scope, &student.affiliation, self.policy)
            });
        if program_chair.is_none() {
            warn!("No program chairperson in scope for student {}", student.id);
        }

        let now = Utc::now();
        let notice = NoticeToCommence {
            id: Uuid::new_v4(),
            submission_id: manuscript.id,
            student_id: student.id,
            program_chair_id: program_chair.as_ref().map(|u| u.id),
            status: DecisionStatus::Pending,
            fields: NoticeFields {
                student_name: student.display_name(),
                title: manuscript.title.clone(),
                course: Some(slip.course.clone()),
                approved_on: now,
                committee,
                addressee: program_chair.as_ref().map(|u| u.display_name()),
                notes: notes.map(str::to_string),
            },
            created_at: now,
            forwarded_at: None,
        };

        match db::notices::insert_notice(uow.conn(), &notice).await {
            Ok(()) => {
                info!("Notice to Commence {} created for {}", notice.id, manuscript.id);
                uow.outbox.event(WorkflowEvent::NoticeToCommenceCreated {
                    notice_id: notice.id,
                    submission_id: manuscript.id,
                    timestamp: now,
                });
                Ok((notice, true))
            }
            Err(e) if is_unique_violation(&e) => {
                let existing = db::notices::live_for_submission(uow.conn(), manuscript.id)
                    .await?
                    .ok_or_else(|| {
                        WorkflowError::StateChanged(format!(
                            "notice for {} changed concurrently",
                            manuscript.id
                        ))
                    })?;
                Ok((existing, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Program chairperson approves a pending notice and forwards it to the dean
    pub async fn forward_notice(&self, actor: &Actor, notice_id: Uuid) -> Result<NoticeToCommence> {
        actor.require(Role::ProgramChairperson)?;

        let mut uow = self.begin().await?;
        let result = async {
            let notice = db::notices::get_notice(uow.conn(), notice_id)
                .await?
                .ok_or_else(|| WorkflowError::NotFound(format!("notice {}", notice_id)))?;
            let student = require_user(uow.conn(), notice.student_id).await?;
            actor.require_scope(&student.affiliation, self.policy, "student")?;

            if notice.status != DecisionStatus::Pending {
                return Err(WorkflowError::AlreadyDecided(format!(
                    "notice {} is {}",
                    notice_id,
                    notice.status.as_str()
                )));
            }
            if db::notices::forward_notice(uow.conn(), notice_id, Utc::now()).await? == 0 {
                return Err(WorkflowError::AlreadyDecided(format!(
                    "notice {} forwarded concurrently",
                    notice_id
                )));
            }
            info!("Notice {} forwarded by {}", notice_id, actor.id);

            let link = Some(format!("/notices/{}", notice_id));
            uow.outbox.notify_role(
                Role::Dean,
                &student.affiliation,
                "Notice to Commence for approval",
                render_notice(&notice.fields),
                link.clone(),
            );
            uow.outbox.notify_user(
                student.id,
                "Notice to Commence forwarded",
                "Your Notice to Commence was forwarded to the dean.",
                link,
            );

            db::notices::get_notice(uow.conn(), notice_id)
                .await?
                .ok_or_else(|| WorkflowError::NotFound(format!("notice {}", notice_id)))
        }
        .await;
        self.finish(uow, result).await
    }

    /// A notice with its rendered text, for anyone who may see the manuscript
    pub async fn view_notice(&self, actor: &Actor, notice_id: Uuid) -> Result<(NoticeToCommence, String)> {
        let mut conn = self.db.acquire().await?;
        let notice = db::notices::get_notice(&mut conn, notice_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("notice {}", notice_id)))?;
        let manuscript = require_submission(&mut conn, notice.submission_id).await?;
        self.require_visible(&mut conn, actor, &manuscript).await?;
        let text = render_notice(&notice.fields);
        Ok((notice, text))
    }

    /// The route slip and its current sign-off state
    pub async fn route_slip(&self, actor: &Actor, route_slip_id: Uuid) -> Result<(RouteSlip, bool)> {
        let mut conn = self.db.acquire().await?;
        let slip = db::route_slips::get_route_slip(&mut conn, route_slip_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("route slip {}", route_slip_id)))?;
        let submission = require_submission(&mut conn, slip.submission_id).await?;
        self.require_visible(&mut conn, actor, &submission).await?;
        let states = reviewer_states(&mut conn, &submission).await?;
        Ok((slip, route_slip_fully_signed(&states)))
    }
}
