//! Shared fixtures for the integration suites.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use ats_workflow::approval::{ApprovalChain, ApprovalStatus};
use ats_workflow::escalation::{EscalationRecord, Severity};
use ats_workflow::policy::SlaBudgetConfig;
use ats_workflow::stage::{EntityStageView, Stage, StageDwell};
use ats_workflow::store::{InMemoryStore, WorkflowStore};
use ats_workflow::WorkflowError;

pub fn entity(
    tenant_id: Uuid,
    job_id: Uuid,
    stage: Stage,
    entered_at: DateTime<Utc>,
    recruiter_id: Option<Uuid>,
    hiring_manager_id: Option<Uuid>,
) -> EntityStageView {
    EntityStageView {
        entity_id: Uuid::new_v4(),
        tenant_id,
        job_id,
        candidate_name: Some("Priya Sharma".to_string()),
        stage,
        entered_at,
        recruiter_id,
        hiring_manager_id,
    }
}

/// Store wrapper whose tenant-config reads fail for one poisoned tenant.
/// Everything else delegates to the wrapped in-memory store.
pub struct FailingConfigStore {
    pub inner: Arc<InMemoryStore>,
    pub poisoned_tenant: Uuid,
}

#[async_trait]
impl WorkflowStore for FailingConfigStore {
    async fn list_active(&self) -> Result<Vec<EntityStageView>, WorkflowError> {
        self.inner.list_active().await
    }

    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<EntityStageView>, WorkflowError> {
        self.inner.list_for_job(job_id).await
    }

    async fn stage_dwells(&self, stage_id: Uuid) -> Result<Vec<StageDwell>, WorkflowError> {
        self.inner.stage_dwells(stage_id).await
    }

    async fn set_stage_sla(
        &self,
        stage_id: Uuid,
        sla_days: Option<u32>,
    ) -> Result<(), WorkflowError> {
        self.inner.set_stage_sla(stage_id, sla_days).await
    }

    async fn sla_config(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<SlaBudgetConfig>, WorkflowError> {
        if tenant_id == self.poisoned_tenant {
            return Err(WorkflowError::Storage(
                "Simulated config read failure".to_string(),
            ));
        }
        self.inner.sla_config(tenant_id).await
    }

    async fn put_sla_config(
        &self,
        tenant_id: Uuid,
        config: SlaBudgetConfig,
    ) -> Result<(), WorkflowError> {
        self.inner.put_sla_config(tenant_id, config).await
    }

    async fn tenant_setting(
        &self,
        tenant_id: Uuid,
        key: &str,
    ) -> Result<Option<serde_json::Value>, WorkflowError> {
        self.inner.tenant_setting(tenant_id, key).await
    }

    async fn put_tenant_setting(
        &self,
        tenant_id: Uuid,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), WorkflowError> {
        self.inner.put_tenant_setting(tenant_id, key, value).await
    }

    async fn record_escalation(&self, record: EscalationRecord) -> Result<(), WorkflowError> {
        self.inner.record_escalation(record).await
    }

    async fn escalation_exists(
        &self,
        entity_id: Uuid,
        stage_entered_at: DateTime<Utc>,
        severity: Severity,
    ) -> Result<bool, WorkflowError> {
        self.inner
            .escalation_exists(entity_id, stage_entered_at, severity)
            .await
    }

    async fn insert_chain(&self, chain: &ApprovalChain) -> Result<(), WorkflowError> {
        self.inner.insert_chain(chain).await
    }

    async fn load_chain(&self, chain_id: Uuid) -> Result<ApprovalChain, WorkflowError> {
        self.inner.load_chain(chain_id).await
    }

    async fn find_chain_for_entity(
        &self,
        entity_id: Uuid,
    ) -> Result<Option<ApprovalChain>, WorkflowError> {
        self.inner.find_chain_for_entity(entity_id).await
    }

    async fn list_pending_chains(&self) -> Result<Vec<ApprovalChain>, WorkflowError> {
        self.inner.list_pending_chains().await
    }

    async fn update_chain_if(
        &self,
        chain: &ApprovalChain,
        expected_step: u32,
        expected_status: ApprovalStatus,
    ) -> Result<(), WorkflowError> {
        self.inner
            .update_chain_if(chain, expected_step, expected_status)
            .await
    }
}
