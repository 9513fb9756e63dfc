//! Persistence Seam
//!
//! The narrow store interface the workflow core consumes, plus an
//! in-memory implementation used by tests and the database-less sweeper.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::approval::{ApprovalChain, ApprovalStatus};
use crate::escalation::{EscalationRecord, Severity};
use crate::policy::SlaBudgetConfig;
use crate::stage::{EntityStageView, Stage, StageDwell, StageEntry};
use crate::WorkflowError;

/// Persistence collaborator for the SLA sweep and the approval engine
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// All entities with an active (non-terminal) current stage
    async fn list_active(&self) -> Result<Vec<EntityStageView>, WorkflowError>;

    /// All applications for one job, active or not
    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<EntityStageView>, WorkflowError>;

    /// Completed and in-progress visits to one stage
    async fn stage_dwells(&self, stage_id: Uuid) -> Result<Vec<StageDwell>, WorkflowError>;

    /// Mutate a stage's explicit SLA budget
    async fn set_stage_sla(
        &self,
        stage_id: Uuid,
        sla_days: Option<u32>,
    ) -> Result<(), WorkflowError>;

    async fn sla_config(&self, tenant_id: Uuid)
        -> Result<Option<SlaBudgetConfig>, WorkflowError>;

    async fn put_sla_config(
        &self,
        tenant_id: Uuid,
        config: SlaBudgetConfig,
    ) -> Result<(), WorkflowError>;

    /// Free-form tenant setting document (approval workflow config etc.)
    async fn tenant_setting(
        &self,
        tenant_id: Uuid,
        key: &str,
    ) -> Result<Option<serde_json::Value>, WorkflowError>;

    async fn put_tenant_setting(
        &self,
        tenant_id: Uuid,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), WorkflowError>;

    /// Append-only escalation audit
    async fn record_escalation(&self, record: EscalationRecord) -> Result<(), WorkflowError>;

    async fn escalation_exists(
        &self,
        entity_id: Uuid,
        stage_entered_at: DateTime<Utc>,
        severity: Severity,
    ) -> Result<bool, WorkflowError>;

    async fn insert_chain(&self, chain: &ApprovalChain) -> Result<(), WorkflowError>;

    async fn load_chain(&self, chain_id: Uuid) -> Result<ApprovalChain, WorkflowError>;

    /// Latest chain for an entity, if any
    async fn find_chain_for_entity(
        &self,
        entity_id: Uuid,
    ) -> Result<Option<ApprovalChain>, WorkflowError>;

    /// All chains currently pending approval
    async fn list_pending_chains(&self) -> Result<Vec<ApprovalChain>, WorkflowError>;

    /// Conditional update: applies only when the stored chain still has
    /// the expected cursor and status. Fails with `Conflict` otherwise,
    /// leaving the stored chain untouched.
    async fn update_chain_if(
        &self,
        chain: &ApprovalChain,
        expected_step: u32,
        expected_status: ApprovalStatus,
    ) -> Result<(), WorkflowError>;
}

#[derive(Default)]
struct Inner {
    entities: Vec<EntityStageView>,
    dwells: HashMap<Uuid, Vec<StageDwell>>,
    sla_configs: HashMap<Uuid, SlaBudgetConfig>,
    settings: HashMap<(Uuid, String), serde_json::Value>,
    escalations: Vec<EscalationRecord>,
    chains: HashMap<Uuid, ApprovalChain>,
    chain_order: Vec<Uuid>,
}

/// In-memory store for tests and single-process runs
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity's current-stage view
    pub async fn seed_entity(&self, view: EntityStageView) {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .entities
            .iter_mut()
            .find(|e| e.entity_id == view.entity_id)
        {
            *existing = view;
        } else {
            inner.entities.push(view);
        }
    }

    /// Apply a stage transition: the previous visit's dwell is closed and
    /// the entity's current-stage clock restarts at the new entry.
    pub async fn record_stage_entry(
        &self,
        entry: StageEntry,
        stage: Stage,
    ) -> Result<(), WorkflowError> {
        let mut inner = self.inner.write().await;
        let view = inner
            .entities
            .iter_mut()
            .find(|e| e.entity_id == entry.entity_id)
            .ok_or(WorkflowError::EntityNotFound(entry.entity_id))?;

        let previous = StageDwell {
            entered_at: view.entered_at,
            exited_at: Some(entry.entered_at),
        };
        let previous_stage = view.stage.stage_id;
        view.stage = stage;
        view.entered_at = entry.entered_at;

        inner.dwells.entry(previous_stage).or_default().push(previous);
        Ok(())
    }

    pub async fn seed_dwell(&self, stage_id: Uuid, dwell: StageDwell) {
        self.inner
            .write()
            .await
            .dwells
            .entry(stage_id)
            .or_default()
            .push(dwell);
    }

    /// All escalation records appended so far
    pub async fn escalations(&self) -> Vec<EscalationRecord> {
        self.inner.read().await.escalations.clone()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn list_active(&self) -> Result<Vec<EntityStageView>, WorkflowError> {
        Ok(self
            .inner
            .read()
            .await
            .entities
            .iter()
            .filter(|e| !e.stage.terminal)
            .cloned()
            .collect())
    }

    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<EntityStageView>, WorkflowError> {
        Ok(self
            .inner
            .read()
            .await
            .entities
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn stage_dwells(&self, stage_id: Uuid) -> Result<Vec<StageDwell>, WorkflowError> {
        Ok(self
            .inner
            .read()
            .await
            .dwells
            .get(&stage_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_stage_sla(
        &self,
        stage_id: Uuid,
        sla_days: Option<u32>,
    ) -> Result<(), WorkflowError> {
        let mut inner = self.inner.write().await;
        let mut found = false;
        for entity in inner
            .entities
            .iter_mut()
            .filter(|e| e.stage.stage_id == stage_id)
        {
            entity.stage.sla_days = sla_days;
            found = true;
        }
        if !found {
            return Err(WorkflowError::BadRequest(format!(
                "Unknown stage: {}",
                stage_id
            )));
        }
        Ok(())
    }

    async fn sla_config(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<SlaBudgetConfig>, WorkflowError> {
        Ok(self.inner.read().await.sla_configs.get(&tenant_id).cloned())
    }

    async fn put_sla_config(
        &self,
        tenant_id: Uuid,
        config: SlaBudgetConfig,
    ) -> Result<(), WorkflowError> {
        self.inner.write().await.sla_configs.insert(tenant_id, config);
        Ok(())
    }

    async fn tenant_setting(
        &self,
        tenant_id: Uuid,
        key: &str,
    ) -> Result<Option<serde_json::Value>, WorkflowError> {
        Ok(self
            .inner
            .read()
            .await
            .settings
            .get(&(tenant_id, key.to_string()))
            .cloned())
    }

    async fn put_tenant_setting(
        &self,
        tenant_id: Uuid,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), WorkflowError> {
        self.inner
            .write()
            .await
            .settings
            .insert((tenant_id, key.to_string()), value);
        Ok(())
    }

    async fn record_escalation(&self, record: EscalationRecord) -> Result<(), WorkflowError> {
        self.inner.write().await.escalations.push(record);
        Ok(())
    }

    async fn escalation_exists(
        &self,
        entity_id: Uuid,
        stage_entered_at: DateTime<Utc>,
        severity: Severity,
    ) -> Result<bool, WorkflowError> {
        Ok(self.inner.read().await.escalations.iter().any(|r| {
            r.entity_id == entity_id
                && r.stage_entered_at == stage_entered_at
                && r.severity == severity
        }))
    }

    async fn insert_chain(&self, chain: &ApprovalChain) -> Result<(), WorkflowError> {
        let mut inner = self.inner.write().await;
        inner.chains.insert(chain.chain_id, chain.clone());
        inner.chain_order.push(chain.chain_id);
        Ok(())
    }

    async fn load_chain(&self, chain_id: Uuid) -> Result<ApprovalChain, WorkflowError> {
        self.inner
            .read()
            .await
            .chains
            .get(&chain_id)
            .cloned()
            .ok_or(WorkflowError::ChainNotFound(chain_id))
    }

    async fn find_chain_for_entity(
        &self,
        entity_id: Uuid,
    ) -> Result<Option<ApprovalChain>, WorkflowError> {
        let inner = self.inner.read().await;
        for chain_id in inner.chain_order.iter().rev() {
            if let Some(chain) = inner.chains.get(chain_id) {
                if chain.entity_id == entity_id {
                    return Ok(Some(chain.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn list_pending_chains(&self) -> Result<Vec<ApprovalChain>, WorkflowError> {
        Ok(self
            .inner
            .read()
            .await
            .chains
            .values()
            .filter(|c| c.status == ApprovalStatus::PendingApproval)
            .cloned()
            .collect())
    }

    async fn update_chain_if(
        &self,
        chain: &ApprovalChain,
        expected_step: u32,
        expected_status: ApprovalStatus,
    ) -> Result<(), WorkflowError> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .chains
            .get_mut(&chain.chain_id)
            .ok_or(WorkflowError::ChainNotFound(chain.chain_id))?;

        if existing.current_step != expected_step || existing.status != expected_status {
            return Err(WorkflowError::Conflict(format!(
                "Chain {} is at step {} ({}), expected step {} ({})",
                chain.chain_id,
                existing.current_step,
                existing.status,
                expected_step,
                expected_status
            )));
        }
        *existing = chain.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn view_in(stage: Stage) -> EntityStageView {
        EntityStageView {
            entity_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            candidate_name: None,
            stage,
            entered_at: Utc::now(),
            recruiter_id: None,
            hiring_manager_id: None,
        }
    }

    #[tokio::test]
    async fn test_set_stage_sla_updates_current_views() {
        let store = InMemoryStore::new();
        let stage = Stage::new("Screening", 1).with_sla_days(3);
        let stage_id = stage.stage_id;
        store.seed_entity(view_in(stage)).await;

        store.set_stage_sla(stage_id, Some(7)).await.unwrap();
        let views = store.list_active().await.unwrap();
        assert_eq!(views[0].stage.sla_days, Some(7));

        let err = store.set_stage_sla(Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_stage_entry_closes_previous_dwell() {
        let store = InMemoryStore::new();
        let screening = Stage::new("Screening", 1);
        let screening_id = screening.stage_id;
        let view = view_in(screening);
        let entity_id = view.entity_id;
        let entered = view.entered_at;
        store.seed_entity(view).await;

        let interview = Stage::new("Interview", 2);
        store
            .record_stage_entry(
                StageEntry {
                    entity_id,
                    stage_id: interview.stage_id,
                    entered_at: entered + chrono::Duration::days(2),
                },
                interview.clone(),
            )
            .await
            .unwrap();

        let views = store.list_active().await.unwrap();
        assert_eq!(views[0].stage.name, "Interview");

        let dwells = store.stage_dwells(screening_id).await.unwrap();
        assert_eq!(dwells.len(), 1);
        assert_eq!(dwells[0].exited_at, Some(entered + chrono::Duration::days(2)));
    }

    #[tokio::test]
    async fn test_latest_chain_wins_for_entity() {
        let store = InMemoryStore::new();
        let entity_id = Uuid::new_v4();
        let now = Utc::now();

        let first = ApprovalChain::draft(Uuid::new_v4(), entity_id, Uuid::new_v4(), "Old", now);
        let second = ApprovalChain::draft(Uuid::new_v4(), entity_id, Uuid::new_v4(), "New", now);
        store.insert_chain(&first).await.unwrap();
        store.insert_chain(&second).await.unwrap();

        let latest = store.find_chain_for_entity(entity_id).await.unwrap().unwrap();
        assert_eq!(latest.chain_id, second.chain_id);
    }
}
