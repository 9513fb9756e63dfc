//! In-Process Notification Center
//!
//! Implements the delivery seam: checks the recipient's preferences
//! before delivery and retains delivered notifications for the read
//! endpoints (out of scope here). A suppressed notification is a
//! successful delivery from the caller's perspective.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use ats_workflow::notify::{Notification, NotificationKind, Notifier, NotifyError};

/// Per-user notification toggles; everything defaults to on
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub sla_at_risk: bool,
    pub sla_overdue: bool,
    pub approval_requests: bool,
    pub job_updates: bool,
    pub system_alerts: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            sla_at_risk: true,
            sla_overdue: true,
            approval_requests: true,
            job_updates: true,
            system_alerts: true,
        }
    }
}

impl NotificationPreferences {
    fn allows(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Sla => self.sla_at_risk || self.sla_overdue,
            NotificationKind::Approval => self.approval_requests,
            NotificationKind::Job => self.job_updates,
            NotificationKind::System => self.system_alerts,
        }
    }
}

/// Preference-aware in-process notifier
#[derive(Default)]
pub struct NotificationCenter {
    preferences: RwLock<HashMap<Uuid, NotificationPreferences>>,
    delivered: RwLock<Vec<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_preferences(&self, user_id: Uuid, preferences: NotificationPreferences) {
        self.preferences.write().await.insert(user_id, preferences);
    }

    pub async fn preferences(&self, user_id: Uuid) -> NotificationPreferences {
        self.preferences
            .read()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or_default()
    }

    /// Everything delivered so far, oldest first
    pub async fn delivered(&self) -> Vec<Notification> {
        self.delivered.read().await.clone()
    }

    pub async fn delivered_for(&self, user_id: Uuid) -> Vec<Notification> {
        self.delivered
            .read()
            .await
            .iter()
            .filter(|n| n.recipient_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for NotificationCenter {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let allowed = self
            .preferences
            .read()
            .await
            .get(&notification.recipient_id)
            .map(|p| p.allows(notification.kind))
            .unwrap_or(true);

        if !allowed {
            debug!(
                recipient = %notification.recipient_id,
                "Notification suppressed by preferences"
            );
            return Ok(());
        }

        self.delivered.write().await.push(notification);
        Ok(())
    }
}
