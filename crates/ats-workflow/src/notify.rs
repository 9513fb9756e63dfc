//! Notification Seam
//!
//! Delivery is fire-and-forget from the core's perspective: callers log
//! failures and never propagate them into a sweep or an approval
//! operation. Transport and user preferences are the implementation's
//! concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::approval::{ApprovalChain, ApprovalStatus};
use crate::escalation::Severity;
use crate::stage::EntityStageView;
use crate::status::SlaStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Sla,
    Approval,
    Job,
    System,
}

/// One notification addressed to one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: Uuid,
    pub tenant_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: serde_json::Value,
}

impl Notification {
    /// SLA breach alert for one recipient
    pub fn sla_alert(
        view: &EntityStageView,
        status: &SlaStatus,
        severity: Severity,
        recipient_id: Uuid,
    ) -> Self {
        let overdue = severity == Severity::Overdue;
        Self {
            recipient_id,
            tenant_id: view.tenant_id,
            kind: NotificationKind::Sla,
            title: if overdue { "SLA Overdue" } else { "SLA At Risk" }.to_string(),
            message: format!(
                "{} in {} - {}",
                view.candidate_name.as_deref().unwrap_or("Candidate"),
                view.stage.name,
                if overdue {
                    "SLA breached"
                } else {
                    "approaching deadline"
                },
            ),
            link: Some(format!("/candidates/{}", view.entity_id)),
            metadata: json!({
                "entityId": view.entity_id,
                "slaStatus": status,
                "severity": severity,
            }),
        }
    }

    /// Ask an approver to act on the step that just became current
    pub fn approval_request(chain: &ApprovalChain, approver_id: Uuid) -> Self {
        Self {
            recipient_id: approver_id,
            tenant_id: chain.tenant_id,
            kind: NotificationKind::Approval,
            title: "Approval Required".to_string(),
            message: format!("\"{}\" requires your approval.", chain.subject),
            link: Some(format!("/requisitions/{}", chain.entity_id)),
            metadata: json!({
                "entityId": chain.entity_id,
                "chainId": chain.chain_id,
            }),
        }
    }

    /// Tell the requester how their chain ended
    pub fn approval_resolved(chain: &ApprovalChain, reason: Option<&str>) -> Self {
        let (title, message) = match chain.status {
            ApprovalStatus::Approved => (
                "Request Approved",
                format!("Your request \"{}\" has been approved.", chain.subject),
            ),
            ApprovalStatus::Rejected => (
                "Request Rejected",
                format!(
                    "Your request \"{}\" was rejected. Reason: {}",
                    chain.subject,
                    reason.unwrap_or("none given"),
                ),
            ),
            _ => (
                "Request Updated",
                format!("Your request \"{}\" was updated.", chain.subject),
            ),
        };
        Self {
            recipient_id: chain.requested_by,
            tenant_id: chain.tenant_id,
            kind: NotificationKind::Approval,
            title: title.to_string(),
            message,
            link: Some(format!("/requisitions/{}", chain.entity_id)),
            metadata: json!({
                "entityId": chain.entity_id,
                "chainId": chain.chain_id,
                "status": chain.status,
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Notification collaborator.
///
/// A notification suppressed by user preferences is `Ok`, not an error.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}
