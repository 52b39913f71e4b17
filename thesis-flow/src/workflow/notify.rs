//! Notification dispatch
//!
//! Operations queue notifications and events on an [`Outbox`] while their
//! transaction is open. The outbox is handed to [`Notifier::dispatch`] only
//! after commit, so nothing is announced for work that rolled back.
//! Delivery failures are logged and never fail the operation.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thesis_common::{EventBus, WorkflowEvent};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db;
use crate::error::Result;
use crate::roles::Role;
use crate::scope::{within_scope, Affiliation, Scope, ScopePolicy};

/// Who a queued notification is for
#[derive(Debug, Clone, PartialEq)]
pub enum Recipient {
    User(Uuid),
    /// Every holder of `role` whose scope covers `target`
    RoleInScope { role: Role, target: Affiliation },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingNotification {
    pub recipient: Recipient,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

/// Notifications and events produced by one operation
#[derive(Debug, Default)]
pub struct Outbox {
    notifications: Vec<PendingNotification>,
    events: Vec<WorkflowEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify_user(
        &mut self,
        user_id: Uuid,
        title: impl Into<String>,
        message: impl Into<String>,
        link: Option<String>,
    ) {
        self.notifications.push(PendingNotification {
            recipient: Recipient::User(user_id),
            title: title.into(),
            message: message.into(),
            link,
        });
    }

    pub fn notify_role(
        &mut self,
        role: Role,
        target: &Affiliation,
        title: impl Into<String>,
        message: impl Into<String>,
        link: Option<String>,
    ) {
        self.notifications.push(PendingNotification {
            recipient: Recipient::RoleInScope {
                role,
                target: target.clone(),
            },
            title: title.into(),
            message: message.into(),
            link,
        });
    }

    pub fn event(&mut self, event: WorkflowEvent) {
        self.events.push(event);
    }

    pub fn notifications(&self) -> &[PendingNotification] {
        &self.notifications
    }

    pub fn events(&self) -> &[WorkflowEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty() && self.events.is_empty()
    }
}

/// Delivers notification rows and broadcasts workflow events
#[derive(Clone)]
pub struct Notifier {
    db: SqlitePool,
    events: Arc<EventBus>,
    policy: ScopePolicy,
}

impl Notifier {
    pub fn new(db: SqlitePool, events: Arc<EventBus>, policy: ScopePolicy) -> Self {
        Self { db, events, policy }
    }

    /// Deliver one notification; returns whether it was stored
    pub async fn notify_user(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> bool {
        match self.try_notify_user(user_id, title, message, link).await {
            Ok(id) => {
                debug!("Notification {} delivered to {}", id, user_id);
                true
            }
            Err(e) => {
                warn!("Failed to notify user {} ({}): {}", user_id, title, e);
                false
            }
        }
    }

    async fn try_notify_user(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> Result<Uuid> {
        let mut conn = self.db.acquire().await?;
        let now = Utc::now();
        let id =
            db::notifications::insert_notification(&mut conn, user_id, title, message, link, now)
                .await?;

        self.events.emit_lossy(WorkflowEvent::Notification {
            notification_id: id,
            user_id,
            title: title.to_string(),
            link: link.map(str::to_string),
            timestamp: now,
        });
        Ok(id)
    }

    /// Notify every holder of `role` whose scope covers `target`
    ///
    /// Returns the number of notifications delivered.
    pub async fn notify_role(
        &self,
        role: Role,
        target: &Affiliation,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> usize {
        let holders = match self.db.acquire().await {
            Ok(mut conn) => db::users::users_with_role(&mut conn, role).await,
            Err(e) => Err(e.into()),
        };
        let holders = match holders {
            Ok(holders) => holders,
            Err(e) => {
                warn!("Failed to resolve {} recipients for '{}': {}", role, title, e);
                return 0;
            }
        };

        let mut delivered = 0;
        for holder in holders {
            let scope = Scope::for_role(role, &holder.affiliation);
            if !within_scope(&scope, target, self.policy) {
                continue;
            }
            if self.notify_user(holder.id, title, message, link).await {
                delivered += 1;
            }
        }

        if delivered == 0 {
            debug!("No {} in scope to receive '{}'", role, title);
        }
        delivered
    }

    /// Deliver everything queued by a committed operation
    pub async fn dispatch(&self, outbox: Outbox) {
        for pending in &outbox.notifications {
            let link = pending.link.as_deref();
            match &pending.recipient {
                Recipient::User(user_id) => {
                    self.notify_user(*user_id, &pending.title, &pending.message, link)
                        .await;
                }
                Recipient::RoleInScope { role, target } => {
                    self.notify_role(*role, target, &pending.title, &pending.message, link)
                        .await;
                }
            }
        }

        for event in outbox.events {
            self.events.emit_lossy(event);
        }
    }
}
