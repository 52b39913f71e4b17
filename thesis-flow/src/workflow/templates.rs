//! Memo and notice text
//!
//! Rendered text is plain; the presentation layer decides how to lay it
//! out. Notice fields are stored as JSON so the text can be regenerated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::MemoFields;

/// Names filling each committee seat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitteeNames {
    pub adviser: String,
    pub chair: String,
    pub panel: Vec<String>,
}

impl CommitteeNames {
    pub fn summary(&self) -> String {
        format!(
            "Adviser: {}; Chairperson: {}; Panel: {}",
            self.adviser,
            self.chair,
            self.panel.join(", ")
        )
    }
}

/// Facts about a scheduled defense used in memos and notifications
#[derive(Debug, Clone)]
pub struct DefenseContext {
    pub student_name: String,
    pub title: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub venue: String,
    pub committee: CommitteeNames,
}

impl DefenseContext {
    pub fn when(&self) -> String {
        format!(
            "{} {}-{} UTC",
            self.starts_at.format("%B %-d, %Y"),
            self.starts_at.format("%H:%M"),
            self.ends_at.format("%H:%M")
        )
    }

    /// One-line summary sent with committee decision notifications
    pub fn summary(&self) -> String {
        format!(
            "Defense of {} on {} at {}. {}",
            self.student_name,
            self.when(),
            self.venue,
            self.committee.summary()
        )
    }
}

/// Render the memo body, or use the body supplied by the dean
pub fn render_memo(fields: &MemoFields, ctx: &DefenseContext) -> String {
    if let Some(body) = fields.body.as_deref().filter(|b| !b.trim().is_empty()) {
        return body.to_string();
    }

    let mut text = String::new();
    text.push_str(&format!(
        "MEMORANDUM No. {}, Series of {}\n",
        fields.number, fields.series
    ));
    text.push_str(&format!("Date: {}\n", fields.date));
    text.push_str(&format!("Subject: {}\n\n", fields.subject));
    text.push_str(&format!(
        "The outline defense of {} is scheduled on {} at {}.",
        ctx.student_name,
        ctx.when(),
        ctx.venue
    ));
    if let Some(title) = ctx.title.as_deref() {
        text.push_str(&format!(" Title: \"{}\".", title));
    }
    text.push_str("\n\nThe following are designated as members of the defense committee:\n");
    text.push_str(&format!("  Adviser: {}\n", ctx.committee.adviser));
    text.push_str(&format!("  Chairperson: {}\n", ctx.committee.chair));
    for member in &ctx.committee.panel {
        text.push_str(&format!("  Panel Member: {}\n", member));
    }
    text.push_str("\nFor your information and guidance.\n");
    text
}

/// Stored content of a Notice to Commence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeFields {
    pub student_name: String,
    pub title: String,
    pub course: Option<String>,
    pub approved_on: DateTime<Utc>,
    pub committee: CommitteeNames,
    pub addressee: Option<String>,
    pub notes: Option<String>,
}

pub fn render_notice(fields: &NoticeFields) -> String {
    let mut text = String::from("NOTICE TO COMMENCE\n\n");
    if let Some(addressee) = fields.addressee.as_deref() {
        text.push_str(&format!("To: {}\n", addressee));
    }
    text.push_str(&format!(
        "Date: {}\n\n",
        fields.approved_on.format("%B %-d, %Y")
    ));
    text.push_str(&format!(
        "This is to certify that {} has successfully defended the thesis outline entitled \"{}\"",
        fields.student_name, fields.title
    ));
    if let Some(course) = fields.course.as_deref() {
        text.push_str(&format!(" under {}", course));
    }
    text.push_str(" and may commence the study.\n\n");
    text.push_str(&format!("{}\n", fields.committee.summary()));
    if let Some(notes) = fields.notes.as_deref() {
        text.push_str(&format!("\nRemarks: {}\n", notes));
    }
    text
}
