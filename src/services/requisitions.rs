//! Job Requisitions
//!
//! Requisitions gate job creation behind a sequential approval chain.
//! The approver list is resolved from tenant settings at submission
//! time; rejection resets the flow and a resubmission starts a fresh
//! chain.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use ats_workflow::approval::{ApprovalChain, ApprovalEngine, ApprovalStatus};
use ats_workflow::clock::Clock;
use ats_workflow::notify::Notifier;
use ats_workflow::store::WorkflowStore;
use ats_workflow::WorkflowError;

use super::settings::SettingsService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

/// A request to open a new position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequisition {
    pub requisition_id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub department: Option<String>,
    pub headcount: u32,
    pub salary_max: Option<u64>,
    pub justification: String,
    pub urgency: Urgency,
    pub status: ApprovalStatus,
    pub chain_id: Uuid,
    /// Explicit approvers requested at creation; empty means tenant
    /// defaults apply at submission
    pub approver_ids: Vec<Uuid>,
    pub requested_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Creation payload
#[derive(Debug, Clone)]
pub struct NewRequisition {
    pub title: String,
    pub department: Option<String>,
    pub headcount: u32,
    pub salary_max: Option<u64>,
    pub justification: String,
    pub urgency: Urgency,
    pub approver_ids: Vec<Uuid>,
}

pub struct RequisitionService {
    requisitions: RwLock<HashMap<Uuid, JobRequisition>>,
    engine: ApprovalEngine,
    settings: SettingsService,
    clock: Arc<dyn Clock>,
}

impl RequisitionService {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            requisitions: RwLock::new(HashMap::new()),
            engine: ApprovalEngine::new(store.clone(), notifier, clock.clone()),
            settings: SettingsService::new(store),
            clock,
        }
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        requested_by: Uuid,
        new: NewRequisition,
    ) -> Result<JobRequisition, WorkflowError> {
        let requisition_id = Uuid::new_v4();
        let chain = self
            .engine
            .open_chain(tenant_id, requisition_id, requested_by, &new.title)
            .await?;

        let requisition = JobRequisition {
            requisition_id,
            tenant_id,
            title: new.title,
            department: new.department,
            headcount: new.headcount.max(1),
            salary_max: new.salary_max,
            justification: new.justification,
            urgency: new.urgency,
            status: ApprovalStatus::Draft,
            chain_id: chain.chain_id,
            approver_ids: new.approver_ids,
            requested_by,
            created_at: self.clock.now(),
        };

        self.requisitions
            .write()
            .await
            .insert(requisition_id, requisition.clone());
        Ok(requisition)
    }

    pub async fn get(&self, requisition_id: Uuid) -> Result<JobRequisition, WorkflowError> {
        self.requisitions
            .read()
            .await
            .get(&requisition_id)
            .cloned()
            .ok_or(WorkflowError::EntityNotFound(requisition_id))
    }

    /// Submit for approval. The approver list is resolved here: explicit
    /// approvers win over tenant defaults, and the finance approver is
    /// appended when the salary ceiling crosses the tenant threshold. An
    /// empty resolution auto-approves.
    pub async fn submit_for_approval(
        &self,
        requisition_id: Uuid,
    ) -> Result<JobRequisition, WorkflowError> {
        let requisition = self.get(requisition_id).await?;
        let approvers = self
            .settings
            .resolve_approvers(
                requisition.tenant_id,
                &requisition.approver_ids,
                requisition.salary_max,
            )
            .await?;

        let chain = self.engine.submit(requisition.chain_id, &approvers).await?;
        self.apply_chain(requisition_id, &chain).await
    }

    pub async fn approve_step(
        &self,
        requisition_id: Uuid,
        approver_id: Uuid,
        comment: Option<String>,
    ) -> Result<JobRequisition, WorkflowError> {
        let requisition = self.get(requisition_id).await?;
        let chain = self
            .engine
            .approve_step(requisition.chain_id, approver_id, comment)
            .await?;
        self.apply_chain(requisition_id, &chain).await
    }

    pub async fn reject_step(
        &self,
        requisition_id: Uuid,
        approver_id: Uuid,
        reason: &str,
    ) -> Result<JobRequisition, WorkflowError> {
        let requisition = self.get(requisition_id).await?;
        let chain = self
            .engine
            .reject_step(requisition.chain_id, approver_id, reason)
            .await?;
        self.apply_chain(requisition_id, &chain).await
    }

    pub async fn cancel(
        &self,
        requisition_id: Uuid,
        user_id: Uuid,
    ) -> Result<JobRequisition, WorkflowError> {
        let requisition = self.get(requisition_id).await?;
        let chain = self.engine.cancel(requisition.chain_id, user_id).await?;
        self.apply_chain(requisition_id, &chain).await
    }

    /// Start over after a rejection: a fresh chain, fresh steps
    pub async fn resubmit(&self, requisition_id: Uuid) -> Result<JobRequisition, WorkflowError> {
        let requisition = self.get(requisition_id).await?;
        let approvers = self
            .settings
            .resolve_approvers(
                requisition.tenant_id,
                &requisition.approver_ids,
                requisition.salary_max,
            )
            .await?;

        let chain = self
            .engine
            .resubmit(requisition.chain_id, &approvers)
            .await?;
        self.apply_chain(requisition_id, &chain).await
    }

    /// Requisitions waiting on the given approver
    pub async fn pending_for(
        &self,
        approver_id: Uuid,
    ) -> Result<Vec<JobRequisition>, WorkflowError> {
        let chains = self.engine.pending_for_approver(approver_id).await?;
        let requisitions = self.requisitions.read().await;
        Ok(chains
            .iter()
            .filter_map(|chain| requisitions.get(&chain.entity_id).cloned())
            .collect())
    }

    async fn apply_chain(
        &self,
        requisition_id: Uuid,
        chain: &ApprovalChain,
    ) -> Result<JobRequisition, WorkflowError> {
        let mut requisitions = self.requisitions.write().await;
        let requisition = requisitions
            .get_mut(&requisition_id)
            .ok_or(WorkflowError::EntityNotFound(requisition_id))?;
        requisition.status = chain.status;
        requisition.chain_id = chain.chain_id;
        Ok(requisition.clone())
    }
}
