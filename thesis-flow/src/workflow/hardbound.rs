//! Final verification of a hardbound copy after committee review

use tracing::info;
use uuid::Uuid;

use super::{require_submission, require_user, state_machine, WorkflowEngine};
use crate::actor::Actor;
use crate::db;
use crate::error::{Result, WorkflowError};
use crate::models::{Submission, SubmissionKind, SubmissionStatus};
use crate::roles::Role;

/// Parse the verification outcome; only Verified and Rejected are accepted
fn parse_verification(input: &str) -> Result<SubmissionStatus> {
    match input.trim().to_ascii_lowercase().as_str() {
        "verified" | "verify" => Ok(SubmissionStatus::Verified),
        "rejected" | "reject" => Ok(SubmissionStatus::Rejected),
        "" => Err(WorkflowError::Validation("decision is required".to_string())),
        other => Err(WorkflowError::InvalidVerdict(format!(
            "'{}' is not a hardbound verification outcome",
            other
        ))),
    }
}

impl WorkflowEngine {
    /// Program chairperson or dean verifies or rejects a passed hardbound copy
    pub async fn verify_hardbound(
        &self,
        actor: &Actor,
        submission_id: Uuid,
        decision: &str,
        notes: Option<&str>,
    ) -> Result<Submission> {
        actor.require_any(&[Role::ProgramChairperson, Role::Dean])?;
        let to = parse_verification(decision)?;
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());

        let mut uow = self.begin().await?;
        let result = async {
            let submission = require_submission(uow.conn(), submission_id).await?;
            if submission.kind != SubmissionKind::Hardbound {
                return Err(WorkflowError::Validation(format!(
                    "only hardbound copies are verified, not a {}",
                    submission.kind.label()
                )));
            }
            let student = require_user(uow.conn(), submission.student_id).await?;
            actor.require_scope(&student.affiliation, self.policy, "student")?;

            match submission.status {
                SubmissionStatus::Passed => {}
                SubmissionStatus::Verified | SubmissionStatus::Rejected => {
                    return Err(WorkflowError::AlreadyDecided(format!(
                        "hardbound {} is already {}",
                        submission_id, submission.status
                    )))
                }
                other => {
                    return Err(WorkflowError::Validation(format!(
                        "hardbound {} is {} and has not passed committee review",
                        submission_id, other
                    )))
                }
            }

            let (conn, outbox) = uow.split();
            state_machine::transition(conn, outbox, &submission, to).await?;
            info!("Hardbound {} {} by {}", submission_id, to, actor.id);

            let mut message = format!(
                "Your hardbound copy \"{}\" was {} by {}.",
                submission.title,
                to,
                actor.display_name
            );
            if let Some(notes) = notes {
                message.push_str(&format!(" Remarks: {}", notes));
            }
            let link = Some(format!("/submissions/{}", submission_id));
            uow.outbox
                .notify_user(student.id, "Hardbound verification", message.clone(), link.clone());
            if let Some(adviser_id) = db::advisers::get_adviser_id(uow.conn(), student.id).await? {
                uow.outbox.notify_user(
                    adviser_id,
                    "Advisee hardbound verification",
                    format!("{} ({})", message, student.display_name()),
                    link,
                );
            }

            require_submission(uow.conn(), submission_id).await
        }
        .await;
        self.finish(uow, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verification() {
        assert_eq!(parse_verification("Verified").unwrap(), SubmissionStatus::Verified);
        assert_eq!(parse_verification(" reject ").unwrap(), SubmissionStatus::Rejected);
        assert!(matches!(
            parse_verification("passed"),
            Err(WorkflowError::InvalidVerdict(_))
        ));
        assert!(matches!(parse_verification(""), Err(WorkflowError::Validation(_))));
    }
}
