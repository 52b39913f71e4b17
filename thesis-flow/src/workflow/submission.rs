//! Submission store: first submission, resubmission and version history

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::{require_submission, require_user, state_machine, UnitOfWork, WorkflowEngine};
use crate::actor::Actor;
use crate::blob::FileUpload;
use crate::db;
use crate::error::{Result, WorkflowError};
use crate::models::{Submission, SubmissionKind, SubmissionStatus, SubmissionVersion};
use crate::roles::Role;

/// Storage key for one version of a submission's file
pub fn blob_key(
    kind: SubmissionKind,
    student_id: Uuid,
    submission_id: Uuid,
    version: i64,
    file_name: &str,
) -> String {
    format!(
        "{}/{}/{}/v{}/{}",
        kind.as_str(),
        student_id,
        submission_id,
        version,
        file_name
    )
}

fn clean_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WorkflowError::Validation("title is required".to_string()));
    }
    Ok(title.to_string())
}

impl WorkflowEngine {
    /// Store a student's first version of a concept paper, manuscript or hardbound
    pub async fn submit(
        &self,
        actor: &Actor,
        kind: SubmissionKind,
        title: &str,
        upload: FileUpload,
    ) -> Result<Submission> {
        actor.require(Role::Student)?;
        if kind == SubmissionKind::RouteSlip {
            return Err(WorkflowError::Validation(
                "route slips are issued by the adviser".to_string(),
            ));
        }
        let title = clean_title(title)?;
        let file_name = upload.validated_name()?;

        let mut uow = self.begin().await?;
        let result = async {
            let now = Utc::now();
            let id = Uuid::new_v4();
            let key = blob_key(kind, actor.id, id, 1, &file_name);
            let file_path = uow.put_blob(key, &upload.bytes).await?;

            let submission = Submission {
                id,
                student_id: actor.id,
                kind,
                title,
                file_path,
                status: SubmissionStatus::Submitted,
                version: 1,
                submitted_at: now,
                reviewed_at: None,
                updated_at: now,
            };
            db::submissions::insert_submission(uow.conn(), &submission).await?;
            info!(
                "Student {} submitted {} {} ({} bytes)",
                actor.id,
                kind,
                id,
                upload.bytes.len()
            );

            self.announce_submission(&mut uow, &submission, "New submission").await?;
            Ok(submission)
        }
        .await;
        self.finish(uow, result).await
    }

    /// Upload a new version after a revision request or rejection
    ///
    /// Without a new file the previous file is carried forward.
    pub async fn resubmit(
        &self,
        actor: &Actor,
        submission_id: Uuid,
        title: Option<&str>,
        upload: Option<FileUpload>,
    ) -> Result<Submission> {
        actor.require(Role::Student)?;
        let title = title.map(clean_title).transpose()?;
        let file_name = upload.as_ref().map(|u| u.validated_name()).transpose()?;

        let mut uow = self.begin().await?;
        let result = async {
            let previous = require_submission(uow.conn(), submission_id).await?;
            if previous.student_id != actor.id {
                return Err(WorkflowError::OutOfScope(format!(
                    "submission {} belongs to another student",
                    submission_id
                )));
            }
            if !state_machine::is_resubmittable(previous.kind, previous.status) {
                return Err(WorkflowError::StateChanged(format!(
                    "submission {} is {} and cannot be resubmitted",
                    submission_id, previous.status
                )));
            }

            let now = Utc::now();
            let version = previous.version + 1;
            let file_path = match (&upload, &file_name) {
                (Some(upload), Some(name)) => {
                    let key = blob_key(previous.kind, actor.id, previous.id, version, name);
                    uow.put_blob(key, &upload.bytes).await?
                }
                _ => previous.file_path.clone(),
            };

            let next = Submission {
                title: title.clone().unwrap_or_else(|| previous.title.clone()),
                file_path,
                status: SubmissionStatus::Submitted,
                version,
                submitted_at: now,
                reviewed_at: None,
                updated_at: now,
                ..previous.clone()
            };

            db::submissions::archive_version(uow.conn(), &previous, now).await?;
            if db::submissions::replace_version(uow.conn(), &previous, &next).await? == 0 {
                return Err(WorkflowError::StateChanged(format!(
                    "submission {} changed during resubmission",
                    submission_id
                )));
            }
            let reset = db::assignments::reset_for_new_version(uow.conn(), submission_id).await?;
            info!(
                "Submission {} resubmitted as v{} ({} reviewer(s) reset)",
                submission_id, version, reset
            );

            uow.outbox.event(thesis_common::WorkflowEvent::SubmissionStatusChanged {
                submission_id,
                kind: previous.kind.as_str().to_string(),
                old_status: previous.status.as_str().to_string(),
                new_status: SubmissionStatus::Submitted.as_str().to_string(),
                timestamp: now,
            });
            self.announce_submission(&mut uow, &next, "Revised submission").await?;
            for assignment in db::assignments::list_for_submission(uow.conn(), submission_id).await? {
                if assignment.status != crate::models::AssignmentStatus::Declined {
                    uow.outbox.notify_user(
                        assignment.reviewer_id,
                        "Revised submission to review",
                        format!(
                            "Version {} of \"{}\" is ready for your review.",
                            version, next.title
                        ),
                        Some(format!("/submissions/{}", submission_id)),
                    );
                }
            }
            Ok(next)
        }
        .await;
        self.finish(uow, result).await
    }

    /// Notify the adviser and the program chairpersons responsible for the student
    async fn announce_submission(
        &self,
        uow: &mut UnitOfWork,
        submission: &Submission,
        title: &str,
    ) -> Result<()> {
        let student = require_user(uow.conn(), submission.student_id).await?;
        let message = format!(
            "{} submitted version {} of the {} \"{}\".",
            student.display_name(),
            submission.version,
            submission.kind.label(),
            submission.title
        );
        let link = Some(format!("/submissions/{}", submission.id));

        if let Some(adviser_id) = db::advisers::get_adviser_id(uow.conn(), student.id).await? {
            uow.outbox
                .notify_user(adviser_id, title, message.clone(), link.clone());
        }
        uow.outbox.notify_role(
            Role::ProgramChairperson,
            &student.affiliation,
            title,
            message,
            link,
        );
        Ok(())
    }

    /// Superseded versions, oldest first; the current version is the submission row
    pub async fn submission_history(
        &self,
        actor: &Actor,
        submission_id: Uuid,
    ) -> Result<(Submission, Vec<SubmissionVersion>)> {
        let mut conn = self.db.acquire().await?;
        let submission = require_submission(&mut conn, submission_id).await?;
        self.require_visible(&mut conn, actor, &submission).await?;
        let versions = db::submissions::list_versions(&mut conn, submission_id).await?;
        Ok((submission, versions))
    }
}
