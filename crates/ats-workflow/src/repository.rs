//! Postgres Store
//!
//! Database-backed implementation of the workflow store.
//!
//! NOTE: All queries use runtime-checked sqlx::query() instead of
//! compile-time sqlx::query!() macros because the tables are created by
//! migrations that may not exist at compile time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::approval::{ApprovalChain, ApprovalStatus, ApprovalStep};
use crate::escalation::{EscalationRecord, Severity};
use crate::policy::SlaBudgetConfig;
use crate::stage::{EntityStageView, Stage, StageDwell};
use crate::store::WorkflowStore;
use crate::WorkflowError;

/// Tenant-setting key under which the SLA budget config is stored
const SLA_CONFIG_KEY: &str = "sla_budget_config";

/// Postgres-backed workflow store
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn view_from_row(row: &sqlx::postgres::PgRow) -> Result<EntityStageView, WorkflowError> {
        let sla_days: Option<i32> = row.get("sla_days");
        let position: i32 = row.get("position");
        Ok(EntityStageView {
            entity_id: row.get("application_id"),
            tenant_id: row.get("tenant_id"),
            job_id: row.get("job_id"),
            candidate_name: row.get("candidate_name"),
            stage: Stage {
                stage_id: row.get("stage_id"),
                name: row.get("stage_name"),
                position: position.max(0) as u32,
                sla_days: sla_days.and_then(|d| u32::try_from(d).ok()),
                terminal: row.get("terminal"),
            },
            entered_at: row.get("entered_at"),
            recruiter_id: row.get("recruiter_id"),
            hiring_manager_id: row.get("hiring_manager_id"),
        })
    }

    async fn list_views(
        &self,
        job_id: Option<Uuid>,
        active_only: bool,
    ) -> Result<Vec<EntityStageView>, WorkflowError> {
        // The most recent stage entry wins; applications that never moved
        // fall back to their application timestamp.
        let mut sql = String::from(
            r#"
            SELECT a.application_id, a.tenant_id, a.job_id, a.candidate_name,
                   a.recruiter_id, a.hiring_manager_id,
                   s.stage_id, s.name AS stage_name, s.position, s.sla_days, s.terminal,
                   COALESCE(e.entered_at, a.applied_at) AS entered_at
            FROM ats.applications a
            JOIN ats.pipeline_stages s ON s.stage_id = a.current_stage_id
            LEFT JOIN LATERAL (
                SELECT entered_at FROM ats.stage_entries
                WHERE entity_id = a.application_id AND stage_id = a.current_stage_id
                ORDER BY entered_at DESC
                LIMIT 1
            ) e ON true
            WHERE 1 = 1
            "#,
        );
        if active_only {
            sql.push_str(" AND NOT s.terminal");
        }
        if job_id.is_some() {
            sql.push_str(" AND a.job_id = $1");
        }

        let mut query = sqlx::query(&sql);
        if let Some(job_id) = job_id {
            query = query.bind(job_id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::view_from_row).collect()
    }

    fn chain_from_row(row: &sqlx::postgres::PgRow) -> Result<ApprovalChain, WorkflowError> {
        let status: String = row.get("status");
        let status: ApprovalStatus = status.parse().map_err(WorkflowError::Storage)?;
        let steps: serde_json::Value = row.get("steps");
        let steps: Vec<ApprovalStep> = serde_json::from_value(steps)
            .map_err(|e| WorkflowError::Storage(format!("Malformed chain steps: {}", e)))?;
        let current_step: i32 = row.get("current_step");

        Ok(ApprovalChain {
            chain_id: row.get("chain_id"),
            tenant_id: row.get("tenant_id"),
            entity_id: row.get("entity_id"),
            subject: row.get("subject"),
            status,
            steps,
            current_step: current_step.max(0) as u32,
            requested_by: row.get("requested_by"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            approved_at: row.get("approved_at"),
            rejected_at: row.get("rejected_at"),
        })
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn list_active(&self) -> Result<Vec<EntityStageView>, WorkflowError> {
        self.list_views(None, true).await
    }

    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<EntityStageView>, WorkflowError> {
        self.list_views(Some(job_id), false).await
    }

    async fn stage_dwells(&self, stage_id: Uuid) -> Result<Vec<StageDwell>, WorkflowError> {
        // Exit time is the entity's next entry anywhere in the pipeline
        let rows = sqlx::query(
            r#"
            SELECT e.entered_at,
                   (SELECT MIN(n.entered_at) FROM ats.stage_entries n
                    WHERE n.entity_id = e.entity_id AND n.entered_at > e.entered_at)
                   AS exited_at
            FROM ats.stage_entries e
            WHERE e.stage_id = $1
            "#,
        )
        .bind(stage_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| StageDwell {
                entered_at: row.get("entered_at"),
                exited_at: row.get("exited_at"),
            })
            .collect())
    }

    async fn set_stage_sla(
        &self,
        stage_id: Uuid,
        sla_days: Option<u32>,
    ) -> Result<(), WorkflowError> {
        let updated = sqlx::query(
            r#"UPDATE ats.pipeline_stages SET sla_days = $2 WHERE stage_id = $1"#,
        )
        .bind(stage_id)
        .bind(sla_days.map(|d| d as i32))
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
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
        let value = self.tenant_setting(tenant_id, SLA_CONFIG_KEY).await?;
        match value {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| WorkflowError::Storage(format!("Malformed SLA config: {}", e))),
            None => Ok(None),
        }
    }

    async fn put_sla_config(
        &self,
        tenant_id: Uuid,
        config: SlaBudgetConfig,
    ) -> Result<(), WorkflowError> {
        let value = serde_json::to_value(&config)
            .map_err(|e| WorkflowError::Storage(format!("Unserializable SLA config: {}", e)))?;
        self.put_tenant_setting(tenant_id, SLA_CONFIG_KEY, value)
            .await
    }

    async fn tenant_setting(
        &self,
        tenant_id: Uuid,
        key: &str,
    ) -> Result<Option<serde_json::Value>, WorkflowError> {
        let row = sqlx::query(
            r#"SELECT value FROM ats.tenant_settings WHERE tenant_id = $1 AND key = $2"#,
        )
        .bind(tenant_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("value")))
    }

    async fn put_tenant_setting(
        &self,
        tenant_id: Uuid,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), WorkflowError> {
        sqlx::query(
            r#"
            INSERT INTO ats.tenant_settings (tenant_id, key, value, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (tenant_id, key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_escalation(&self, record: EscalationRecord) -> Result<(), WorkflowError> {
        sqlx::query(
            r#"
            INSERT INTO ats.sla_escalations
                (record_id, tenant_id, entity_id, stage_name, severity,
                 snapshot, stage_entered_at, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.record_id)
        .bind(record.tenant_id)
        .bind(record.entity_id)
        .bind(&record.stage_name)
        .bind(record.severity.as_str())
        .bind(serde_json::to_value(&record.snapshot).unwrap_or_default())
        .bind(record.stage_entered_at)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn escalation_exists(
        &self,
        entity_id: Uuid,
        stage_entered_at: DateTime<Utc>,
        severity: Severity,
    ) -> Result<bool, WorkflowError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM ats.sla_escalations
                WHERE entity_id = $1 AND stage_entered_at = $2 AND severity = $3
            ) AS found
            "#,
        )
        .bind(entity_id)
        .bind(stage_entered_at)
        .bind(severity.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("found"))
    }

    async fn insert_chain(&self, chain: &ApprovalChain) -> Result<(), WorkflowError> {
        sqlx::query(
            r#"
            INSERT INTO ats.approval_chains
                (chain_id, tenant_id, entity_id, subject, status, steps,
                 current_step, requested_by, created_at, updated_at,
                 approved_at, rejected_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(chain.chain_id)
        .bind(chain.tenant_id)
        .bind(chain.entity_id)
        .bind(&chain.subject)
        .bind(chain.status.as_str())
        .bind(serde_json::to_value(&chain.steps).unwrap_or_default())
        .bind(chain.current_step as i32)
        .bind(chain.requested_by)
        .bind(chain.created_at)
        .bind(chain.updated_at)
        .bind(chain.approved_at)
        .bind(chain.rejected_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_chain(&self, chain_id: Uuid) -> Result<ApprovalChain, WorkflowError> {
        let row = sqlx::query(
            r#"
            SELECT chain_id, tenant_id, entity_id, subject, status, steps,
                   current_step, requested_by, created_at, updated_at,
                   approved_at, rejected_at
            FROM ats.approval_chains
            WHERE chain_id = $1
            "#,
        )
        .bind(chain_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(WorkflowError::ChainNotFound(chain_id))?;

        Self::chain_from_row(&row)
    }

    async fn find_chain_for_entity(
        &self,
        entity_id: Uuid,
    ) -> Result<Option<ApprovalChain>, WorkflowError> {
        let row = sqlx::query(
            r#"
            SELECT chain_id, tenant_id, entity_id, subject, status, steps,
                   current_step, requested_by, created_at, updated_at,
                   approved_at, rejected_at
            FROM ats.approval_chains
            WHERE entity_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::chain_from_row).transpose()
    }

    async fn list_pending_chains(&self) -> Result<Vec<ApprovalChain>, WorkflowError> {
        let rows = sqlx::query(
            r#"
            SELECT chain_id, tenant_id, entity_id, subject, status, steps,
                   current_step, requested_by, created_at, updated_at,
                   approved_at, rejected_at
            FROM ats.approval_chains
            WHERE status = 'PENDING_APPROVAL'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::chain_from_row).collect()
    }

    async fn update_chain_if(
        &self,
        chain: &ApprovalChain,
        expected_step: u32,
        expected_status: ApprovalStatus,
    ) -> Result<(), WorkflowError> {
        let updated = sqlx::query(
            r#"
            UPDATE ats.approval_chains
            SET status = $4, steps = $5, current_step = $6, updated_at = $7,
                approved_at = $8, rejected_at = $9
            WHERE chain_id = $1 AND current_step = $2 AND status = $3
            "#,
        )
        .bind(chain.chain_id)
        .bind(expected_step as i32)
        .bind(expected_status.as_str())
        .bind(chain.status.as_str())
        .bind(serde_json::to_value(&chain.steps).unwrap_or_default())
        .bind(chain.current_step as i32)
        .bind(chain.updated_at)
        .bind(chain.approved_at)
        .bind(chain.rejected_at)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            // Distinguish a vanished chain from a lost race
            let current = self.load_chain(chain.chain_id).await?;
            return Err(WorkflowError::Conflict(format!(
                "Chain {} is at step {} ({}), expected step {} ({})",
                chain.chain_id,
                current.current_step,
                current.status,
                expected_step,
                expected_status
            )));
        }
        Ok(())
    }
}
