//! Workflow record types
//!
//! Enum codes match the snake_case values stored in the database and sent
//! over the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::roles::{Role, RoleSet};
use crate::scope::Affiliation;

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    ConceptPaper,
    OutlineDefenseManuscript,
    RouteSlip,
    Hardbound,
}

impl SubmissionKind {
    pub const ALL: [SubmissionKind; 4] = [
        SubmissionKind::ConceptPaper,
        SubmissionKind::OutlineDefenseManuscript,
        SubmissionKind::RouteSlip,
        SubmissionKind::Hardbound,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionKind::ConceptPaper => "concept_paper",
            SubmissionKind::OutlineDefenseManuscript => "outline_defense_manuscript",
            SubmissionKind::RouteSlip => "route_slip",
            SubmissionKind::Hardbound => "hardbound",
        }
    }

    /// Human label used in notification text
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionKind::ConceptPaper => "concept paper",
            SubmissionKind::OutlineDefenseManuscript => "outline defense manuscript",
            SubmissionKind::RouteSlip => "route slip",
            SubmissionKind::Hardbound => "hardbound copy",
        }
    }
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n = normalize(s);
        SubmissionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == n)
            .ok_or_else(|| WorkflowError::Validation(format!("unknown submission kind '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    UnderReview,
    Passed,
    NeedsRevision,
    Approved,
    Verified,
    Rejected,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 7] = [
        SubmissionStatus::Submitted,
        SubmissionStatus::UnderReview,
        SubmissionStatus::Passed,
        SubmissionStatus::NeedsRevision,
        SubmissionStatus::Approved,
        SubmissionStatus::Verified,
        SubmissionStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::UnderReview => "under_review",
            SubmissionStatus::Passed => "passed",
            SubmissionStatus::NeedsRevision => "needs_revision",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Verified => "verified",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n = normalize(s);
        SubmissionStatus::ALL
            .into_iter()
            .find(|k| k.as_str() == n)
            .ok_or_else(|| WorkflowError::Validation(format!("unknown submission status '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Completed,
    Declined,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Declined => "declined",
        }
    }
}

impl FromStr for AssignmentStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(AssignmentStatus::Pending),
            "in_progress" => Ok(AssignmentStatus::InProgress),
            "completed" => Ok(AssignmentStatus::Completed),
            "declined" => Ok(AssignmentStatus::Declined),
            _ => Err(WorkflowError::Validation(format!(
                "unknown assignment status '{}'",
                s
            ))),
        }
    }
}

/// Reviewer or committee decision
///
/// Which verdicts are legal depends on the submission kind; see
/// [`Verdict::parse_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Passed,
    NeedsRevision,
    MinorRevision,
    MajorRevision,
    Rejected,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "approved",
            Verdict::Passed => "passed",
            Verdict::NeedsRevision => "needs_revision",
            Verdict::MinorRevision => "minor_revision",
            Verdict::MajorRevision => "major_revision",
            Verdict::Rejected => "rejected",
        }
    }

    /// Verdicts a reviewer may record for a submission kind
    pub fn allowed_for(kind: SubmissionKind) -> &'static [Verdict] {
        match kind {
            SubmissionKind::ConceptPaper | SubmissionKind::OutlineDefenseManuscript => {
                &[Verdict::Approved, Verdict::NeedsRevision, Verdict::Rejected]
            }
            SubmissionKind::RouteSlip => &[
                Verdict::Approved,
                Verdict::MinorRevision,
                Verdict::MajorRevision,
                Verdict::Rejected,
            ],
            SubmissionKind::Hardbound => {
                &[Verdict::Passed, Verdict::Approved, Verdict::NeedsRevision]
            }
        }
    }

    /// Parse free-form verdict input and check it against the kind
    ///
    /// On route slips the legacy spelling "needs revision" is read as a
    /// minor revision.
    pub fn parse_for(input: &str, kind: SubmissionKind) -> Result<Verdict, WorkflowError> {
        let n = normalize(input);
        let verdict = match n.as_str() {
            "approved" | "approve" => Verdict::Approved,
            "passed" | "pass" => Verdict::Passed,
            "needs_revision" | "revise" if kind == SubmissionKind::RouteSlip => {
                Verdict::MinorRevision
            }
            "needs_revision" | "revise" => Verdict::NeedsRevision,
            "minor_revision" | "minor" => Verdict::MinorRevision,
            "major_revision" | "major" => Verdict::MajorRevision,
            "rejected" | "reject" => Verdict::Rejected,
            "" => return Err(WorkflowError::Validation("verdict is required".to_string())),
            _ => {
                return Err(WorkflowError::InvalidVerdict(format!(
                    "unknown verdict '{}'",
                    input
                )))
            }
        };

        if Verdict::allowed_for(kind).contains(&verdict) {
            Ok(verdict)
        } else {
            Err(WorkflowError::InvalidVerdict(format!(
                "'{}' is not a valid verdict for a {}",
                verdict.as_str(),
                kind.label()
            )))
        }
    }

    pub fn is_revision(&self) -> bool {
        matches!(
            self,
            Verdict::NeedsRevision | Verdict::MinorRevision | Verdict::MajorRevision
        )
    }

    pub fn is_favorable(&self) -> bool {
        matches!(self, Verdict::Approved | Verdict::Passed)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = WorkflowError;

    /// Parse a stored code without kind validation
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "approved" => Ok(Verdict::Approved),
            "passed" => Ok(Verdict::Passed),
            "needs_revision" => Ok(Verdict::NeedsRevision),
            "minor_revision" => Ok(Verdict::MinorRevision),
            "major_revision" => Ok(Verdict::MajorRevision),
            "rejected" => Ok(Verdict::Rejected),
            _ => Err(WorkflowError::InvalidVerdict(format!("unknown verdict '{}'", s))),
        }
    }
}

/// Shared status for committee requests and notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Pending,
    Approved,
    Rejected,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Pending => "pending",
            DecisionStatus::Approved => "approved",
            DecisionStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for DecisionStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(DecisionStatus::Pending),
            "approved" | "approve" => Ok(DecisionStatus::Approved),
            "rejected" | "reject" => Ok(DecisionStatus::Rejected),
            _ => Err(WorkflowError::Validation(format!("unknown decision '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Confirmed => "confirmed",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(ScheduleStatus::Pending),
            "confirmed" => Ok(ScheduleStatus::Confirmed),
            "cancelled" => Ok(ScheduleStatus::Cancelled),
            _ => Err(WorkflowError::Validation(format!(
                "unknown schedule status '{}'",
                s
            ))),
        }
    }
}

/// User with affiliation and roles
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: Option<String>,
    pub affiliation: Affiliation,
    pub roles: RoleSet,
}

impl UserRecord {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

/// Input for registering a user
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub firstname: String,
    pub lastname: String,
    pub email: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub college: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub id: Uuid,
    pub student_id: Uuid,
    pub kind: SubmissionKind,
    pub title: String,
    pub file_path: String,
    pub status: SubmissionStatus,
    pub version: i64,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Superseded version of a submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionVersion {
    pub submission_id: Uuid,
    pub version: i64,
    pub title: String,
    pub file_path: String,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub superseded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewerAssignment {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub reviewer_id: Uuid,
    pub role: Role,
    pub status: AssignmentStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub instructions: Option<String>,
    pub decline_reason: Option<String>,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub submission_id: Uuid,
    pub reviewer_id: Uuid,
    pub submission_version: i64,
    pub verdict: Verdict,
    pub rank_order: Option<i64>,
    pub score: Option<f64>,
    pub comments: Option<String>,
    pub signature_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DefenseSchedule {
    pub id: Uuid,
    pub student_id: Uuid,
    pub submission_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub venue: String,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
}

/// Memo attached to an approved committee request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoFields {
    pub number: String,
    pub series: String,
    pub date: String,
    pub subject: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitteeRequest {
    pub id: Uuid,
    pub student_id: Uuid,
    pub submission_id: Option<Uuid>,
    pub schedule_id: Uuid,
    pub adviser_id: Uuid,
    pub chair_id: Uuid,
    pub panel_ids: [Uuid; 2],
    pub requested_by: Uuid,
    pub notes: Option<String>,
    pub status: DecisionStatus,
    pub memo: Option<MemoFields>,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CommitteeRequest {
    /// Committee members with the seat each one fills
    pub fn members(&self) -> [(Uuid, Role); 4] {
        [
            (self.adviser_id, Role::Adviser),
            (self.chair_id, Role::CommitteeChairperson),
            (self.panel_ids[0], Role::Panel),
            (self.panel_ids[1], Role::Panel),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub venue: String,
    pub committee_request_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteSlip {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub manuscript_id: Uuid,
    pub student_id: Uuid,
    pub adviser_id: Uuid,
    pub course: String,
    pub panel_member: Option<String>,
    pub action_taken: Verdict,
    pub overall_decision: Option<Verdict>,
    pub overall_notes: Option<String>,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub adviser_signature_path: Option<String>,
    pub adviser_signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoticeToCommence {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub student_id: Uuid,
    pub program_chair_id: Option<Uuid>,
    pub status: DecisionStatus,
    pub fields: crate::workflow::templates::NoticeFields,
    pub created_at: DateTime<Utc>,
    pub forwarded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_slip_needs_revision_reads_as_minor() {
        assert_eq!(
            Verdict::parse_for("Needs Revision", SubmissionKind::RouteSlip).unwrap(),
            Verdict::MinorRevision
        );
        assert_eq!(
            Verdict::parse_for("needs_revision", SubmissionKind::ConceptPaper).unwrap(),
            Verdict::NeedsRevision
        );
    }

    #[test]
    fn test_verdict_kind_mismatch_is_invalid_verdict() {
        let err = Verdict::parse_for("passed", SubmissionKind::ConceptPaper).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidVerdict(_)));
        let err = Verdict::parse_for("rejected", SubmissionKind::Hardbound).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidVerdict(_)));
        let err = Verdict::parse_for("maybe", SubmissionKind::RouteSlip).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidVerdict(_)));
    }

    #[test]
    fn test_empty_verdict_is_validation_error() {
        let err = Verdict::parse_for("  ", SubmissionKind::Hardbound).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn test_status_codes_round_trip() {
        for status in SubmissionStatus::ALL {
            assert_eq!(status.as_str().parse::<SubmissionStatus>().unwrap(), status);
        }
        for kind in SubmissionKind::ALL {
            assert_eq!(kind.as_str().parse::<SubmissionKind>().unwrap(), kind);
        }
    }
}
