//! Escalation Fan-Out
//!
//! One audit record per (entity, stage entry, severity); recipients are
//! the recruiter and hiring manager of the owning job. Delivery failures
//! are isolated per recipient and never abort the sweep.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::notify::{Notification, Notifier};
use crate::stage::EntityStageView;
use crate::status::SlaStatus;
use crate::store::WorkflowStore;
use crate::WorkflowError;

/// Default bound on concurrent notification deliveries
pub const DEFAULT_DELIVERY_CONCURRENCY: usize = 8;

/// How far past the warning line the entity is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    AtRisk,
    Overdue,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AtRisk => "AT_RISK",
            Self::Overdue => "OVERDUE",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AT_RISK" => Ok(Self::AtRisk),
            "OVERDUE" => Ok(Self::Overdue),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Audit record of one escalation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub record_id: Uuid,
    pub tenant_id: Uuid,
    pub entity_id: Uuid,
    pub stage_name: String,
    pub severity: Severity,
    /// Status snapshot at the time of the breach
    pub snapshot: SlaStatus,
    /// Stage entry that produced the breach; part of the dedupe key
    pub stage_entered_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// Records breaches and fans notifications out to the responsible users
pub struct EscalationNotifier {
    store: Arc<dyn WorkflowStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    delivery_concurrency: usize,
}

impl EscalationNotifier {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            delivery_concurrency: DEFAULT_DELIVERY_CONCURRENCY,
        }
    }

    pub fn with_delivery_concurrency(mut self, bound: usize) -> Self {
        self.delivery_concurrency = bound.max(1);
        self
    }

    /// Escalate one breached entity: append the audit record and notify
    /// the recruiter and hiring manager.
    ///
    /// Returns `true` for a fresh breach; `false` when this
    /// (entity, stage entry, severity) was already escalated, in which
    /// case nothing is recorded and nobody is re-notified.
    pub async fn escalate(
        &self,
        view: &EntityStageView,
        status: &SlaStatus,
        severity: Severity,
    ) -> Result<bool, WorkflowError> {
        if self
            .store
            .escalation_exists(view.entity_id, view.entered_at, severity)
            .await?
        {
            debug!(
                entity_id = %view.entity_id,
                severity = %severity,
                "Escalation already recorded for this stage entry"
            );
            return Ok(false);
        }

        let record = EscalationRecord {
            record_id: Uuid::new_v4(),
            tenant_id: view.tenant_id,
            entity_id: view.entity_id,
            stage_name: view.stage.name.clone(),
            severity,
            snapshot: *status,
            stage_entered_at: view.entered_at,
            recorded_at: self.clock.now(),
        };
        self.store.record_escalation(record).await?;

        let recipients = view.recipients();
        if recipients.is_empty() {
            warn!(entity_id = %view.entity_id, "No recipients resolved for SLA escalation");
            return Ok(true);
        }

        // Per-recipient error capture; one bad recipient must not starve
        // the rest.
        stream::iter(recipients)
            .map(|recipient| {
                let notification = Notification::sla_alert(view, status, severity, recipient);
                let notifier = Arc::clone(&self.notifier);
                async move {
                    if let Err(e) = notifier.notify(notification).await {
                        warn!(
                            recipient = %recipient,
                            error = %e,
                            "Failed to deliver SLA notification"
                        );
                    }
                }
            })
            .buffer_unordered(self.delivery_concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(true)
    }
}
