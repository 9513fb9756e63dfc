//! Pipeline Stage Types
//!
//! Stages, stage-entry facts, and the per-entity view the sweep reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named step in a hiring pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub stage_id: Uuid,
    pub name: String,
    /// Ordering position within the pipeline
    pub position: u32,
    /// Explicit per-stage SLA budget in days; overrides the tenant default
    pub sla_days: Option<u32>,
    /// Terminal stages (hired, rejected) are excluded from SLA monitoring
    pub terminal: bool,
}

impl Stage {
    pub fn new(name: impl Into<String>, position: u32) -> Self {
        Self {
            stage_id: Uuid::new_v4(),
            name: name.into(),
            position,
            sla_days: None,
            terminal: false,
        }
    }

    pub fn with_sla_days(mut self, days: u32) -> Self {
        self.sla_days = Some(days);
        self
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

/// Immutable fact: an entity entered a stage at a point in time.
///
/// Created on every stage transition; superseded (never mutated) by the
/// next transition. The most recent entry defines the current-stage clock
/// start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEntry {
    pub entity_id: Uuid,
    pub stage_id: Uuid,
    pub entered_at: DateTime<Utc>,
}

/// One entity's visit to a stage, completed or still open
#[derive(Debug, Clone, Copy)]
pub struct StageDwell {
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
}

/// Everything the sweep needs to know about one entity.
///
/// `entered_at` is the most recent stage-entry timestamp, falling back to
/// the application timestamp when no transition has ever been recorded
/// (resolved at the store layer).
#[derive(Debug, Clone)]
pub struct EntityStageView {
    pub entity_id: Uuid,
    pub tenant_id: Uuid,
    pub job_id: Uuid,
    pub candidate_name: Option<String>,
    pub stage: Stage,
    pub entered_at: DateTime<Utc>,
    pub recruiter_id: Option<Uuid>,
    pub hiring_manager_id: Option<Uuid>,
}

impl EntityStageView {
    /// Escalation recipients: recruiter and hiring manager of the owning
    /// job, deduplicated.
    pub fn recipients(&self) -> Vec<Uuid> {
        let mut out = Vec::with_capacity(2);
        for id in [self.recruiter_id, self.hiring_manager_id].into_iter().flatten() {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(recruiter: Option<Uuid>, manager: Option<Uuid>) -> EntityStageView {
        EntityStageView {
            entity_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            candidate_name: None,
            stage: Stage::new("Screening", 1),
            entered_at: Utc::now(),
            recruiter_id: recruiter,
            hiring_manager_id: manager,
        }
    }

    #[test]
    fn test_recipients_deduplicated() {
        let shared = Uuid::new_v4();
        assert_eq!(view(Some(shared), Some(shared)).recipients(), vec![shared]);

        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(view(Some(a), Some(b)).recipients(), vec![a, b]);
    }

    #[test]
    fn test_recipients_empty_when_unassigned() {
        assert!(view(None, None).recipients().is_empty());
    }
}
