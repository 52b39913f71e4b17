//! Defense committee proposals and the dean's decision

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use thesis_common::time::intervals_overlap;
use thesis_common::WorkflowEvent;
use tracing::{info, warn};
use uuid::Uuid;

use super::assignment::sync_reviewer_assignments;
use super::templates::{render_memo, CommitteeNames, DefenseContext};
use super::{require_submission, require_user, state_machine, UnitOfWork, WorkflowEngine};
use crate::actor::Actor;
use crate::db;
use crate::error::{Result, WorkflowError};
use crate::models::{
    CalendarEntry, CommitteeRequest, DecisionStatus, DefenseSchedule, MemoFields, ScheduleStatus,
    SubmissionKind, SubmissionStatus,
};
use crate::roles::Role;
use crate::scope::scope_predicate;

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleProposal {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub venue: String,
}

/// Program chairperson's proposed committee and defense slot
#[derive(Debug, Clone, Deserialize)]
pub struct CommitteeProposal {
    pub student_id: Uuid,
    pub adviser_id: Uuid,
    pub chair_id: Uuid,
    pub panel_ids: [Uuid; 2],
    pub schedule: ScheduleProposal,
    #[serde(default)]
    pub submission_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CommitteeProposal {
    /// Input checks that need no database access
    fn validate(&self) -> Result<()> {
        if self.schedule.venue.trim().is_empty() {
            return Err(WorkflowError::Validation("venue is required".to_string()));
        }
        if self.schedule.ends_at <= self.schedule.starts_at {
            return Err(WorkflowError::Validation(
                "defense must end after it starts".to_string(),
            ));
        }

        let members = [
            self.adviser_id,
            self.chair_id,
            self.panel_ids[0],
            self.panel_ids[1],
        ];
        let distinct: HashSet<Uuid> = members.iter().copied().collect();
        if distinct.len() != members.len() {
            return Err(WorkflowError::DuplicateMember(
                "adviser, chairperson and panel members must be four different people".to_string(),
            ));
        }
        if distinct.contains(&self.student_id) {
            return Err(WorkflowError::DuplicateMember(
                "the student cannot sit on their own committee".to_string(),
            ));
        }
        Ok(())
    }
}

/// Dean's decision on a committee request
#[derive(Debug, Clone)]
pub enum CommitteeDecision {
    Approve(MemoFields),
    Reject { reason: Option<String> },
}

impl CommitteeDecision {
    fn validate(&self) -> Result<()> {
        if let CommitteeDecision::Approve(memo) = self {
            let missing: Vec<&str> = [
                ("memo number", &memo.number),
                ("memo series", &memo.series),
                ("memo date", &memo.date),
                ("memo subject", &memo.subject),
            ]
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
            if !missing.is_empty() {
                return Err(WorkflowError::Validation(format!(
                    "missing {}",
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Fail with `ScheduleConflict` when a confirmed defense overlaps at the venue
async fn check_venue_conflict(
    uow: &mut UnitOfWork,
    venue: &str,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    ignore: Option<Uuid>,
) -> Result<()> {
    let booked = db::committee::confirmed_at_venue(uow.conn(), venue).await?;
    let clash = booked.iter().find(|s| {
        Some(s.id) != ignore && intervals_overlap(starts_at, ends_at, s.starts_at, s.ends_at)
    });

    match clash {
        Some(existing) => Err(WorkflowError::ScheduleConflict(format!(
            "{} is booked {} - {} (schedule {})",
            existing.venue, existing.starts_at, existing.ends_at, existing.id
        ))),
        None => Ok(()),
    }
}

impl WorkflowEngine {
    pub(super) async fn committee_names(
        &self,
        uow: &mut UnitOfWork,
        request: &CommitteeRequest,
    ) -> Result<CommitteeNames> {
        let adviser = require_user(uow.conn(), request.adviser_id).await?;
        let chair = require_user(uow.conn(), request.chair_id).await?;
        let mut panel = Vec::with_capacity(2);
        for id in request.panel_ids {
            panel.push(require_user(uow.conn(), id).await?.display_name());
        }
        Ok(CommitteeNames {
            adviser: adviser.display_name(),
            chair: chair.display_name(),
            panel,
        })
    }

    /// Propose a defense committee and schedule for the dean's approval
    pub async fn create_committee_request(
        &self,
        actor: &Actor,
        proposal: CommitteeProposal,
    ) -> Result<CommitteeRequest> {
        actor.require(Role::ProgramChairperson)?;
        proposal.validate()?;

        let mut uow = self.begin().await?;
        let result = async {
            let student = require_user(uow.conn(), proposal.student_id).await?;
            if !student.roles.contains(Role::Student) {
                return Err(WorkflowError::Validation(format!(
                    "user {} is not a student",
                    student.id
                )));
            }
            actor.require_scope(&student.affiliation, self.policy, "student")?;

            for id in [
                proposal.adviser_id,
                proposal.chair_id,
                proposal.panel_ids[0],
                proposal.panel_ids[1],
            ] {
                let member = require_user(uow.conn(), id).await?;
                if !member.roles.is_faculty_eligible() {
                    return Err(WorkflowError::IneligibleMember(format!(
                        "{} ({}) holds no faculty or adviser role",
                        member.display_name(),
                        member.id
                    )));
                }
            }

            if let Some(linked) = db::advisers::get_adviser_id(uow.conn(), student.id).await? {
                if linked != proposal.adviser_id {
                    return Err(WorkflowError::Validation(format!(
                        "student {} is advised by {}, not {}",
                        student.id, linked, proposal.adviser_id
                    )));
                }
            }

            let venue = proposal.schedule.venue.trim().to_string();
            check_venue_conflict(
                &mut uow,
                &venue,
                proposal.schedule.starts_at,
                proposal.schedule.ends_at,
                None,
            )
            .await?;

            let submission = match proposal.submission_id {
                Some(id) => {
                    let submission = require_submission(uow.conn(), id).await?;
                    if submission.student_id != student.id {
                        return Err(WorkflowError::Validation(format!(
                            "submission {} belongs to another student",
                            id
                        )));
                    }
                    if !matches!(
                        submission.kind,
                        SubmissionKind::OutlineDefenseManuscript | SubmissionKind::Hardbound
                    ) {
                        return Err(WorkflowError::Validation(format!(
                            "a committee reviews manuscripts and hardbound copies, not a {}",
                            submission.kind.label()
                        )));
                    }
                    if !state_machine::is_review_open(submission.kind, submission.status) {
                        return Err(WorkflowError::StateChanged(format!(
                            "submission {} is {}",
                            id, submission.status
                        )));
                    }
                    Some(submission)
                }
                None => None,
            };

            let now = Utc::now();
            let schedule = DefenseSchedule {
                id: Uuid::new_v4(),
                student_id: student.id,
                submission_id: proposal.submission_id,
                starts_at: proposal.schedule.starts_at,
                ends_at: proposal.schedule.ends_at,
                venue,
                status: ScheduleStatus::Pending,
                created_at: now,
            };
            db::committee::insert_schedule(uow.conn(), &schedule).await?;

            let request = CommitteeRequest {
                id: Uuid::new_v4(),
                student_id: student.id,
                submission_id: proposal.submission_id,
                schedule_id: schedule.id,
                adviser_id: proposal.adviser_id,
                chair_id: proposal.chair_id,
                panel_ids: proposal.panel_ids,
                requested_by: actor.id,
                notes: proposal
                    .notes
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string),
                status: DecisionStatus::Pending,
                memo: None,
                decided_by: None,
                decided_at: None,
                created_at: now,
            };
            for (user_id, role) in request.members() {
                db::committee::insert_panel_member(uow.conn(), schedule.id, user_id, role).await?;
            }
            db::committee::insert_request(uow.conn(), &request).await?;

            if let Some(submission) = submission {
                sync_reviewer_assignments(uow.conn(), submission.id, &request.members(), actor.id)
                    .await?;
                if submission.status == SubmissionStatus::Submitted {
                    let (conn, outbox) = uow.split();
                    state_machine::transition(conn, outbox, &submission, SubmissionStatus::UnderReview)
                        .await?;
                }
            }

            info!(
                "Committee request {} for student {} proposed by {}",
                request.id, student.id, actor.id
            );
            uow.outbox.notify_role(
                Role::Dean,
                &student.affiliation,
                "Committee request awaiting approval",
                format!(
                    "{} proposed a defense committee for {} on {} at {}.",
                    actor.display_name,
                    student.display_name(),
                    schedule.starts_at.format("%B %-d, %Y %H:%M UTC"),
                    schedule.venue
                ),
                Some(format!("/committee-requests/{}", request.id)),
            );
            Ok(request)
        }
        .await;
        self.finish(uow, result).await
    }

    /// Approve or reject a pending committee request
    ///
    /// Approval re-checks the venue against defenses confirmed since the
    /// request was made, confirms the schedule, grants committee roles and
    /// writes calendar entries for the student and every member.
    pub async fn decide_committee_request(
        &self,
        actor: &Actor,
        request_id: Uuid,
        decision: CommitteeDecision,
    ) -> Result<CommitteeRequest> {
        actor.require(Role::Dean)?;
        decision.validate()?;

        let mut uow = self.begin().await?;
        let result = async {
            let request = db::committee::get_request(uow.conn(), request_id)
                .await?
                .ok_or_else(|| WorkflowError::NotFound(format!("committee request {}", request_id)))?;
            let student = require_user(uow.conn(), request.student_id).await?;
            actor.require_scope(&student.affiliation, self.policy, "student")?;

            if request.status != DecisionStatus::Pending {
                return Err(WorkflowError::AlreadyDecided(format!(
                    "committee request {} is {}",
                    request_id,
                    request.status.as_str()
                )));
            }
            let schedule = db::committee::get_schedule(uow.conn(), request.schedule_id)
                .await?
                .ok_or_else(|| WorkflowError::NotFound(format!("schedule {}", request.schedule_id)))?;

            let now = Utc::now();
            match decision {
                CommitteeDecision::Approve(mut memo) => {
                    check_venue_conflict(
                        &mut uow,
                        &schedule.venue,
                        schedule.starts_at,
                        schedule.ends_at,
                        Some(schedule.id),
                    )
                    .await?;

                    let names = self.committee_names(&mut uow, &request).await?;
                    let title = match request.submission_id {
                        Some(id) => Some(require_submission(uow.conn(), id).await?.title),
                        None => None,
                    };
                    let ctx = DefenseContext {
                        student_name: student.display_name(),
                        title,
                        starts_at: schedule.starts_at,
                        ends_at: schedule.ends_at,
                        venue: schedule.venue.clone(),
                        committee: names,
                    };
                    memo.body = Some(render_memo(&memo, &ctx));

                    let rows = db::committee::decide_request(
                        uow.conn(),
                        request_id,
                        DecisionStatus::Approved,
                        Some(&memo),
                        actor.id,
                        now,
                    )
                    .await?;
                    if rows == 0 {
                        return Err(WorkflowError::AlreadyDecided(format!(
                            "committee request {} decided concurrently",
                            request_id
                        )));
                    }
                    if db::committee::set_schedule_status(
                        uow.conn(),
                        schedule.id,
                        ScheduleStatus::Pending,
                        ScheduleStatus::Confirmed,
                    )
                    .await?
                        == 0
                    {
                        return Err(WorkflowError::StateChanged(format!(
                            "schedule {} is no longer pending",
                            schedule.id
                        )));
                    }

                    for (user_id, role) in request.members() {
                        if role != Role::Adviser
                            && db::users::grant_role(uow.conn(), user_id, role).await?
                        {
                            info!("Granted {} to {}", role, user_id);
                        }
                    }

                    let entry_title = format!("Outline defense: {}", student.display_name());
                    let attendees = std::iter::once(student.id).chain(request.members().map(|(id, _)| id));
                    for user_id in attendees {
                        db::committee::insert_calendar_entry(
                            uow.conn(),
                            &CalendarEntry {
                                id: Uuid::new_v4(),
                                user_id,
                                title: entry_title.clone(),
                                starts_at: schedule.starts_at,
                                ends_at: schedule.ends_at,
                                venue: schedule.venue.clone(),
                                committee_request_id: Some(request_id),
                            },
                        )
                        .await?;
                    }

                    let summary = ctx.summary();
                    let link = Some(format!("/committee-requests/{}", request_id));
                    uow.outbox.notify_user(
                        request.requested_by,
                        "Committee request approved",
                        summary.clone(),
                        link.clone(),
                    );
                    uow.outbox.notify_user(
                        student.id,
                        "Defense scheduled",
                        summary.clone(),
                        link.clone(),
                    );
                    for (user_id, role) in request.members() {
                        uow.outbox.notify_user(
                            user_id,
                            "Defense committee assignment",
                            format!("You will serve as {}. {}", role.as_str().replace('_', " "), summary),
                            link.clone(),
                        );
                    }
                    info!("Committee request {} approved by {}", request_id, actor.id);
                }
                CommitteeDecision::Reject { reason } => {
                    let rows = db::committee::decide_request(
                        uow.conn(),
                        request_id,
                        DecisionStatus::Rejected,
                        None,
                        actor.id,
                        now,
                    )
                    .await?;
                    if rows == 0 {
                        return Err(WorkflowError::AlreadyDecided(format!(
                            "committee request {} decided concurrently",
                            request_id
                        )));
                    }
                    if db::committee::set_schedule_status(
                        uow.conn(),
                        schedule.id,
                        ScheduleStatus::Pending,
                        ScheduleStatus::Cancelled,
                    )
                    .await?
                        == 0
                    {
                        warn!("Schedule {} was not pending when its request was rejected", schedule.id);
                    }

                    let reason = reason
                        .as_deref()
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .unwrap_or("No reason given");
                    uow.outbox.notify_user(
                        request.requested_by,
                        "Committee request rejected",
                        format!(
                            "The committee request for {} was rejected: {}",
                            student.display_name(),
                            reason
                        ),
                        Some(format!("/committee-requests/{}", request_id)),
                    );
                    info!("Committee request {} rejected by {}", request_id, actor.id);
                }
            }

            let decided = db::committee::get_request(uow.conn(), request_id)
                .await?
                .ok_or_else(|| WorkflowError::NotFound(format!("committee request {}", request_id)))?;
            uow.outbox.event(WorkflowEvent::CommitteeRequestDecided {
                request_id,
                student_id: decided.student_id,
                status: decided.status.as_str().to_string(),
                timestamp: now,
            });
            Ok(decided)
        }
        .await;
        self.finish(uow, result).await
    }

    /// Committee requests for students in the actor's scope
    pub async fn list_committee_requests(
        &self,
        actor: &Actor,
        status: Option<DecisionStatus>,
    ) -> Result<Vec<CommitteeRequest>> {
        actor.require_any(&[Role::ProgramChairperson, Role::Dean])?;
        let predicate = scope_predicate(&actor.scope(), self.policy, "u");
        let mut conn = self.db.acquire().await?;
        db::committee::list_requests(&mut conn, &predicate, status).await
    }

    /// The actor's own defense calendar
    pub async fn calendar(&self, actor: &Actor) -> Result<Vec<CalendarEntry>> {
        let mut conn = self.db.acquire().await?;
        db::committee::calendar_for_user(&mut conn, actor.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn proposal() -> CommitteeProposal {
        CommitteeProposal {
            student_id: Uuid::new_v4(),
            adviser_id: Uuid::new_v4(),
            chair_id: Uuid::new_v4(),
            panel_ids: [Uuid::new_v4(), Uuid::new_v4()],
            schedule: ScheduleProposal {
                starts_at: Utc.with_ymd_and_hms(2025, 5, 2, 9, 0, 0).unwrap(),
                ends_at: Utc.with_ymd_and_hms(2025, 5, 2, 11, 0, 0).unwrap(),
                venue: "AVR 2".to_string(),
            },
            submission_id: None,
            notes: None,
        }
    }

    #[test]
    fn test_duplicate_members_rejected() {
        let mut p = proposal();
        p.panel_ids[1] = p.chair_id;
        assert!(matches!(p.validate(), Err(WorkflowError::DuplicateMember(_))));

        let mut p = proposal();
        p.panel_ids[0] = p.student_id;
        assert!(matches!(p.validate(), Err(WorkflowError::DuplicateMember(_))));
    }

    #[test]
    fn test_schedule_shape_validated() {
        let mut p = proposal();
        p.schedule.ends_at = p.schedule.starts_at;
        assert!(matches!(p.validate(), Err(WorkflowError::Validation(_))));

        let mut p = proposal();
        p.schedule.venue = "  ".to_string();
        assert!(matches!(p.validate(), Err(WorkflowError::Validation(_))));

        assert!(proposal().validate().is_ok());
    }

    #[test]
    fn test_approval_requires_memo_fields() {
        let decision = CommitteeDecision::Approve(MemoFields {
            number: "7".into(),
            series: "".into(),
            date: "May 1, 2025".into(),
            subject: "Outline defense".into(),
            body: None,
        });
        let err = decision.validate().unwrap_err();
        assert!(err.to_string().contains("memo series"));
        assert!(CommitteeDecision::Reject { reason: None }.validate().is_ok());
    }
}
