//! Workflow error taxonomy
//!
//! Every rejected operation maps to exactly one variant. The variant carries
//! a developer-facing detail; `user_message()` is the fixed text shown to
//! the person who triggered the action, and `code()` is the stable machine
//! code used in API responses.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Malformed or missing input, rejected before any write
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Target student or adviser lies outside the actor's scope
    #[error("Out of scope: {0}")]
    OutOfScope(String),

    /// Actor lacks the role the operation requires
    #[error("Missing capability: {0}")]
    MissingCapability(String),

    /// Request or record already left its pending state
    #[error("Already decided: {0}")]
    AlreadyDecided(String),

    /// Another writer changed the record between read and write
    #[error("State changed concurrently: {0}")]
    StateChanged(String),

    /// Reviewer has no assignment for the submission
    #[error("Not assigned: {0}")]
    NotAssigned(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Exclusive link (adviser, reviewer slot) already present
    #[error("Already assigned: {0}")]
    AlreadyAssigned(String),

    #[error("Duplicate committee member: {0}")]
    DuplicateMember(String),

    #[error("Schedule conflict: {0}")]
    ScheduleConflict(String),

    /// Verdict not allowed for the submission kind
    #[error("Invalid verdict: {0}")]
    InvalidVerdict(String),

    /// Proposed member does not hold a faculty or adviser role
    #[error("Ineligible member: {0}")]
    IneligibleMember(String),

    /// Adviser tried to sign before every committee member signed
    #[error("Signatures pending: {0}")]
    SignaturesPending(String),

    /// Persistence or file storage failed; nothing was committed
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl WorkflowError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "VALIDATION_FAILED",
            WorkflowError::OutOfScope(_) => "OUT_OF_SCOPE",
            WorkflowError::MissingCapability(_) => "MISSING_CAPABILITY",
            WorkflowError::AlreadyDecided(_) => "ALREADY_DECIDED",
            WorkflowError::StateChanged(_) => "STATE_CHANGED",
            WorkflowError::NotAssigned(_) => "NOT_ASSIGNED",
            WorkflowError::NotFound(_) => "NOT_FOUND",
            WorkflowError::AlreadyAssigned(_) => "ALREADY_ASSIGNED",
            WorkflowError::DuplicateMember(_) => "DUPLICATE_MEMBER",
            WorkflowError::ScheduleConflict(_) => "SCHEDULE_CONFLICT",
            WorkflowError::InvalidVerdict(_) => "INVALID_VERDICT",
            WorkflowError::IneligibleMember(_) => "INELIGIBLE_MEMBER",
            WorkflowError::SignaturesPending(_) => "SIGNATURES_PENDING",
            WorkflowError::StorageFailure(_) => "STORAGE_FAILURE",
        }
    }

    /// Message shown to the acting user
    pub fn user_message(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => {
                "Some required information is missing or invalid. Please check the form and try again."
            }
            WorkflowError::OutOfScope(_) => {
                "This student or adviser is outside the program or college you manage."
            }
            WorkflowError::MissingCapability(_) => {
                "Your account does not have the role needed for this action."
            }
            WorkflowError::AlreadyDecided(_) => {
                "This item has already been decided. Refresh the page to see its current status."
            }
            WorkflowError::StateChanged(_) => {
                "Someone else updated this record while you were working. Refresh and try again."
            }
            WorkflowError::NotAssigned(_) => "You are not assigned to review this submission.",
            WorkflowError::NotFound(_) => "The requested record could not be found.",
            WorkflowError::AlreadyAssigned(_) => {
                "This person is already assigned here. Remove the current assignment first."
            }
            WorkflowError::DuplicateMember(_) => {
                "Each committee seat needs a different person, and the student cannot sit on their own committee."
            }
            WorkflowError::ScheduleConflict(_) => {
                "Another defense is already booked at this venue for an overlapping time."
            }
            WorkflowError::InvalidVerdict(_) => {
                "That decision is not available for this type of submission."
            }
            WorkflowError::IneligibleMember(_) => {
                "Only faculty members and advisers can be assigned to this role."
            }
            WorkflowError::SignaturesPending(_) => {
                "The chairperson and both panel members must sign before the adviser can sign."
            }
            WorkflowError::StorageFailure(_) => {
                "Your changes could not be saved and nothing was recorded. Please try again."
            }
        }
    }

    /// Failures the caller may retry unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::StorageFailure(_) | WorkflowError::StateChanged(_)
        )
    }
}

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => WorkflowError::NotFound("row not found".to_string()),
            other => WorkflowError::StorageFailure(other.to_string()),
        }
    }
}

impl From<thesis_common::Error> for WorkflowError {
    fn from(err: thesis_common::Error) -> Self {
        match err {
            thesis_common::Error::NotFound(msg) => WorkflowError::NotFound(msg),
            thesis_common::Error::InvalidInput(msg) => WorkflowError::Validation(msg),
            other => WorkflowError::StorageFailure(other.to_string()),
        }
    }
}

/// True when the database rejected a write on a UNIQUE constraint
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
