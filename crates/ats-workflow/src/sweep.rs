//! Daily At-Risk Sweep
//!
//! Enumerates active entities, evaluates each against its resolved budget,
//! partitions them into at-risk/overdue buckets, and fans escalations out.
//! One entity's failure never aborts the sweep; the scheduler skips a
//! trigger that fires while the previous sweep is still running.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::escalation::{EscalationNotifier, Severity};
use crate::policy::{resolve_budget, SlaBudgetConfig};
use crate::stage::EntityStageView;
use crate::status::{evaluate_resolved, SlaState, SlaStatus};
use crate::store::WorkflowStore;
use crate::WorkflowError;

/// One evaluated entity with its status
#[derive(Debug, Clone)]
pub struct SweepEntry {
    pub view: EntityStageView,
    pub status: SlaStatus,
}

/// Outcome of one sweep
#[derive(Debug, Default)]
pub struct SweepReport {
    pub at_risk: Vec<SweepEntry>,
    pub overdue: Vec<SweepEntry>,
    /// Entities that were evaluated (monitored or not)
    pub evaluated: usize,
    /// Entities skipped because their stage or config failed to load
    pub skipped: usize,
    /// Fresh escalations recorded; deduped re-breaches are not counted
    pub escalated: usize,
}

/// Per-job SLA summary
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct JobSlaStats {
    pub total: usize,
    pub on_track: usize,
    pub at_risk: usize,
    pub overdue: usize,
}

impl JobSlaStats {
    /// Share of all applications (monitored or not) in the given count
    fn pct(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }

    pub fn on_track_pct(&self) -> f64 {
        self.pct(self.on_track)
    }

    pub fn at_risk_pct(&self) -> f64 {
        self.pct(self.at_risk)
    }

    pub fn overdue_pct(&self) -> f64 {
        self.pct(self.overdue)
    }
}

/// Scans active entities and drives escalations
pub struct SlaMonitor {
    store: Arc<dyn WorkflowStore>,
    escalation: EscalationNotifier,
    clock: Arc<dyn Clock>,
}

impl SlaMonitor {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        escalation: EscalationNotifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            escalation,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Evaluate every active entity and bucket the breaches.
    ///
    /// The partition is strict: an entity lands in at most one bucket, and
    /// unmonitored entities land in neither. A tenant whose config fails
    /// to load only skips that tenant's entities.
    pub async fn partition(&self) -> Result<SweepReport, WorkflowError> {
        let now = self.clock.now();
        let entities = self.store.list_active().await?;

        let mut report = SweepReport::default();
        // Config is read-mostly; one read per tenant per sweep
        let mut configs: HashMap<Uuid, Option<SlaBudgetConfig>> = HashMap::new();

        for view in entities {
            let config = match configs.entry(view.tenant_id) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    match self.store.sla_config(view.tenant_id).await {
                        Ok(config) => entry.insert(config),
                        Err(e) => {
                            warn!(
                                entity_id = %view.entity_id,
                                tenant_id = %view.tenant_id,
                                error = %e,
                                "Skipping entity: failed to load tenant SLA config"
                            );
                            report.skipped += 1;
                            continue;
                        }
                    }
                }
            };

            let budget = resolve_budget(&view.stage, config.as_ref());
            report.evaluated += 1;

            let Some(status) = evaluate_resolved(now, view.entered_at, budget.as_ref()) else {
                continue; // unmonitored stage, a valid end state
            };

            match status.status {
                SlaState::Overdue => report.overdue.push(SweepEntry { view, status }),
                SlaState::AtRisk => report.at_risk.push(SweepEntry { view, status }),
                SlaState::OnTrack => {}
            }
        }

        Ok(report)
    }

    /// One full sweep: partition, then escalate every breach
    pub async fn sweep(&self) -> Result<SweepReport, WorkflowError> {
        self.sweep_cancellable(None).await
    }

    /// Sweep with cooperative cancellation between entities. Partial
    /// completion is fine; the next sweep re-evaluates everyone.
    pub async fn sweep_cancellable(
        &self,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<SweepReport, WorkflowError> {
        let mut report = self.partition().await?;

        let breaches: Vec<(usize, Severity)> = (0..report.at_risk.len())
            .map(|i| (i, Severity::AtRisk))
            .chain((0..report.overdue.len()).map(|i| (i, Severity::Overdue)))
            .collect();

        for (index, severity) in breaches {
            if let Some(rx) = shutdown {
                if *rx.borrow() {
                    info!("Sweep cancelled before completion");
                    break;
                }
            }

            let entry = match severity {
                Severity::AtRisk => &report.at_risk[index],
                Severity::Overdue => &report.overdue[index],
            };
            let entity_id = entry.view.entity_id;
            match self
                .escalation
                .escalate(&entry.view, &entry.status, severity)
                .await
            {
                Ok(true) => report.escalated += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        entity_id = %entity_id,
                        error = %e,
                        "Failed to escalate entity"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Per-job counts of on-track/at-risk/overdue applications.
    /// Unmonitored applications count toward the total only.
    pub async fn job_sla_stats(&self, job_id: Uuid) -> Result<JobSlaStats, WorkflowError> {
        let now = self.clock.now();
        let entities = self.store.list_for_job(job_id).await?;

        let mut stats = JobSlaStats {
            total: entities.len(),
            ..Default::default()
        };

        for view in entities {
            let config = self.store.sla_config(view.tenant_id).await?;
            let budget = resolve_budget(&view.stage, config.as_ref());
            match evaluate_resolved(now, view.entered_at, budget.as_ref()) {
                Some(status) => match status.status {
                    SlaState::OnTrack => stats.on_track += 1,
                    SlaState::AtRisk => stats.at_risk += 1,
                    SlaState::Overdue => stats.overdue += 1,
                },
                None => {}
            }
        }

        Ok(stats)
    }

    /// Mean whole-day dwell over completed visits to a stage; 0 when no
    /// visit has completed yet.
    pub async fn average_days_in_stage(&self, stage_id: Uuid) -> Result<f64, WorkflowError> {
        let dwells = self.store.stage_dwells(stage_id).await?;

        let mut total_days = 0i64;
        let mut count = 0usize;
        for dwell in dwells {
            if let Some(exited_at) = dwell.exited_at {
                total_days += (exited_at - dwell.entered_at).num_days().max(0);
                count += 1;
            }
        }

        if count == 0 {
            Ok(0.0)
        } else {
            Ok(total_days as f64 / count as f64)
        }
    }
}

/// Fires the sweep once per day at a fixed UTC hour
pub struct SweepScheduler {
    monitor: Arc<SlaMonitor>,
    hour_utc: u32,
    running: Mutex<()>,
}

impl SweepScheduler {
    pub fn new(monitor: Arc<SlaMonitor>, hour_utc: u32) -> Self {
        Self {
            monitor,
            hour_utc: hour_utc % 24,
            running: Mutex::new(()),
        }
    }

    /// Run until shutdown is signalled (blocks like a queue listener)
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(hour_utc = self.hour_utc, "SLA sweep scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let wait = self.until_next_fire();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.trigger(&shutdown).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("SLA sweep scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run one sweep now, unless one is already in flight
    pub async fn trigger(&self, shutdown: &watch::Receiver<bool>) {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Previous sweep still running, skipping this trigger");
            return;
        };

        info!("Running daily SLA check");
        match self.monitor.sweep_cancellable(Some(shutdown)).await {
            Ok(report) => info!(
                at_risk = report.at_risk.len(),
                overdue = report.overdue.len(),
                escalated = report.escalated,
                skipped = report.skipped,
                "SLA check complete"
            ),
            Err(e) => warn!(error = %e, "SLA sweep failed"),
        }
    }

    fn until_next_fire(&self) -> Duration {
        let now = self.monitor.clock().now();
        let fire_today = now
            .date_naive()
            .and_hms_opt(self.hour_utc, 0, 0)
            .unwrap_or_default()
            .and_utc();
        let next = if fire_today > now {
            fire_today
        } else {
            fire_today + chrono::Duration::days(1)
        };
        (next - now).to_std().unwrap_or(Duration::from_secs(60))
    }
}
