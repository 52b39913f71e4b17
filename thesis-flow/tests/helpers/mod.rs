//! Test helper utilities
//!
//! Shared setup for thesis-flow integration tests: a temporary database,
//! an in-memory blob store and a few canned people and scenarios.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use thesis_common::config::WorkflowSettings;
use thesis_common::EventBus;
use uuid::Uuid;

use thesis_flow::actor::Actor;
use thesis_flow::blob::{FileUpload, MemoryBlobStore};
use thesis_flow::models::{CommitteeRequest, MemoFields, NewUser, Submission, SubmissionKind};
use thesis_flow::roles::Role;
use thesis_flow::workflow::{
    AdviserExclusivity, CommitteeDecision, CommitteeProposal, ScheduleProposal, WorkflowEngine,
};

pub const PROGRAM: &str = "MSIT";
pub const DEPARTMENT: &str = "Information Technology";
pub const COLLEGE: &str = "College of Computing";

pub struct Harness {
    pub engine: Arc<WorkflowEngine>,
    pub blobs: Arc<MemoryBlobStore>,
    pub events: Arc<EventBus>,
    _dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(WorkflowSettings::default()).await
    }

    pub async fn with_settings(settings: WorkflowSettings) -> Self {
        let dir = TempDir::new().expect("Should create temp dir");
        let pool = thesis_common::db::init_database(&dir.path().join("thesis.db"))
            .await
            .expect("Should initialize database");
        let blobs = Arc::new(MemoryBlobStore::new());
        let events = Arc::new(EventBus::new(64));
        let engine = WorkflowEngine::new(pool, blobs.clone(), events.clone(), settings);

        Self {
            engine: Arc::new(engine),
            blobs,
            events,
            _dir: dir,
        }
    }

    /// Register someone in the default program
    pub async fn user(&self, name: &str, roles: &[Role]) -> Actor {
        self.user_in(name, roles, Some(PROGRAM), Some(DEPARTMENT), Some(COLLEGE))
            .await
    }

    pub async fn user_in(
        &self,
        name: &str,
        roles: &[Role],
        program: Option<&str>,
        department: Option<&str>,
        college: Option<&str>,
    ) -> Actor {
        let (first, last) = name.split_once(' ').unwrap_or((name, "Test"));
        let user = self
            .engine
            .register_user(NewUser {
                firstname: first.to_string(),
                lastname: last.to_string(),
                email: Some(format!(
                    "{}.{}@example.edu",
                    first.to_lowercase(),
                    Uuid::new_v4().simple()
                )),
                program: program.map(str::to_string),
                department: department.map(str::to_string),
                college: college.map(str::to_string),
                roles: roles.to_vec(),
            })
            .await
            .expect("Should register user");
        self.engine.load_actor(user.id).await.expect("Should load actor")
    }

    /// Reload an actor after roles were granted
    pub async fn reload(&self, actor: &Actor) -> Actor {
        self.engine.load_actor(actor.id).await.expect("Should reload actor")
    }
}

pub fn upload(name: &str) -> FileUpload {
    FileUpload::new(name, b"%PDF-1.7 test document".to_vec())
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, day, hour, 0, 0).unwrap()
}

pub fn memo() -> MemoFields {
    MemoFields {
        number: "12".to_string(),
        series: "2025".to_string(),
        date: "April 28, 2025".to_string(),
        subject: "Outline defense committee".to_string(),
        body: None,
    }
}

pub fn proposal(
    student: &Actor,
    committee: &Committee,
    submission_id: Option<Uuid>,
    venue: &str,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> CommitteeProposal {
    CommitteeProposal {
        student_id: student.id,
        adviser_id: committee.adviser.id,
        chair_id: committee.chair.id,
        panel_ids: [committee.panel[0].id, committee.panel[1].id],
        schedule: ScheduleProposal {
            starts_at,
            ends_at,
            venue: venue.to_string(),
        },
        submission_id,
        notes: None,
    }
}

/// Administrators for the default program
pub struct Admins {
    pub program_chair: Actor,
    pub dean: Actor,
}

impl Admins {
    pub async fn new(h: &Harness) -> Self {
        Self {
            program_chair: h.user("Paz Cruz", &[Role::Faculty, Role::ProgramChairperson]).await,
            dean: h.user("Dina Santos", &[Role::Faculty, Role::Dean]).await,
        }
    }
}

/// Adviser, committee chairperson and two panel members
pub struct Committee {
    pub adviser: Actor,
    pub chair: Actor,
    pub panel: [Actor; 2],
}

impl Committee {
    pub async fn new(h: &Harness) -> Self {
        Self {
            adviser: h.user("Alma Lim", &[Role::Faculty]).await,
            chair: h.user("Carlo Tan", &[Role::Faculty]).await,
            panel: [
                h.user("Pia Go", &[Role::Faculty]).await,
                h.user("Raul Uy", &[Role::Faculty]).await,
            ],
        }
    }

    pub async fn reload(&mut self, h: &Harness) {
        self.adviser = h.reload(&self.adviser).await;
        self.chair = h.reload(&self.chair).await;
        self.panel = [h.reload(&self.panel[0]).await, h.reload(&self.panel[1]).await];
    }
}

/// A student with an approved defense committee reviewing their manuscript
pub struct Defense {
    pub admins: Admins,
    pub committee: Committee,
    pub student: Actor,
    pub manuscript: Submission,
    pub request: CommitteeRequest,
}

impl Defense {
    pub async fn new(h: &Harness) -> Self {
        let admins = Admins::new(h).await;
        let mut committee = Committee::new(h).await;
        let student = h.user("Sofia Ramos", &[Role::Student]).await;

        h.engine
            .assign_adviser(
                &admins.program_chair,
                student.id,
                committee.adviser.id,
                AdviserExclusivity::Required,
            )
            .await
            .expect("Should link adviser");

        let manuscript = h
            .engine
            .submit(
                &student,
                SubmissionKind::OutlineDefenseManuscript,
                "Edge Caching for Rural Clinics",
                upload("manuscript.pdf"),
            )
            .await
            .expect("Should submit manuscript");

        let request = h
            .engine
            .create_committee_request(
                &admins.program_chair,
                proposal(&student, &committee, Some(manuscript.id), "AVR 2", at(2, 9), at(2, 11)),
            )
            .await
            .expect("Should create committee request");
        let request = h
            .engine
            .decide_committee_request(&admins.dean, request.id, CommitteeDecision::Approve(memo()))
            .await
            .expect("Should approve committee request");

        committee.reload(h).await;
        let manuscript = h
            .engine
            .submission_detail(&student, manuscript.id)
            .await
            .expect("Should load manuscript")
            .submission;

        Self {
            admins,
            committee,
            student,
            manuscript,
            request,
        }
    }
}

/// The caller's assignment on a submission
pub async fn assignment_for(h: &Harness, reviewer: &Actor, submission_id: Uuid) -> Uuid {
    h.engine
        .list_my_assignments(reviewer)
        .await
        .expect("Should list assignments")
        .into_iter()
        .find(|a| a.submission_id == submission_id)
        .map(|a| a.id)
        .expect("Reviewer should be assigned")
}
