//! Tenant Settings Facade
//!
//! Typed accessors over the store's tenant-setting documents. Absent
//! settings resolve to defaults, never to errors.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use ats_workflow::approval::{ApprovalWorkflowConfig, Approver};
use ats_workflow::policy::SlaBudgetConfig;
use ats_workflow::store::WorkflowStore;
use ats_workflow::WorkflowError;

const APPROVAL_WORKFLOW_KEY: &str = "approval_workflow_config";

pub struct SettingsService {
    store: Arc<dyn WorkflowStore>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    pub async fn sla_config(&self, tenant_id: Uuid) -> Result<SlaBudgetConfig, WorkflowError> {
        Ok(self.store.sla_config(tenant_id).await?.unwrap_or_default())
    }

    pub async fn update_sla_config(
        &self,
        tenant_id: Uuid,
        config: SlaBudgetConfig,
    ) -> Result<(), WorkflowError> {
        self.store.put_sla_config(tenant_id, config).await
    }

    pub async fn approval_workflow_config(
        &self,
        tenant_id: Uuid,
    ) -> Result<ApprovalWorkflowConfig, WorkflowError> {
        let value = self
            .store
            .tenant_setting(tenant_id, APPROVAL_WORKFLOW_KEY)
            .await?;

        Ok(match value {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(tenant_id = %tenant_id, error = %e, "Malformed approval workflow config, using defaults");
                ApprovalWorkflowConfig::default()
            }),
            None => ApprovalWorkflowConfig::default(),
        })
    }

    pub async fn update_approval_workflow_config(
        &self,
        tenant_id: Uuid,
        config: &ApprovalWorkflowConfig,
    ) -> Result<(), WorkflowError> {
        let value = serde_json::to_value(config).map_err(|e| {
            WorkflowError::Storage(format!("Unserializable approval config: {}", e))
        })?;
        self.store
            .put_tenant_setting(tenant_id, APPROVAL_WORKFLOW_KEY, value)
            .await
    }

    /// Resolve the approver list for a submission.
    ///
    /// Explicit approvers override the tenant defaults; the finance
    /// approver is appended when the salary ceiling crosses the threshold.
    /// A disabled workflow resolves to an empty list (auto-approval).
    pub async fn resolve_approvers(
        &self,
        tenant_id: Uuid,
        explicit: &[Uuid],
        salary_max: Option<u64>,
    ) -> Result<Vec<Approver>, WorkflowError> {
        let config = self.approval_workflow_config(tenant_id).await?;
        if !config.enabled {
            return Ok(Vec::new());
        }

        let mut ids: Vec<Uuid> = if explicit.is_empty() {
            config.default_approvers.clone()
        } else {
            explicit.to_vec()
        };

        if config.require_finance_approval {
            if let (Some(salary), Some(finance)) = (salary_max, config.finance_approver_id) {
                if salary > config.salary_threshold_for_finance && !ids.contains(&finance) {
                    ids.push(finance);
                }
            }
        }

        ids.dedup();
        Ok(ids.into_iter().map(Approver::new).collect())
    }
}
