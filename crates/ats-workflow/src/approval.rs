//! Sequential Approval Chains
//!
//! A chain is an ordered list of approver steps with a single cursor.
//! Approval advances the cursor by exactly one; rejection at any step
//! short-circuits the whole chain. Every mutation is persisted through a
//! conditional update keyed on the expected (cursor, status) pair so two
//! racing approvers fail with a conflict instead of corrupting the cursor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::clock::Clock;
use crate::notify::{Notification, Notifier};
use crate::store::WorkflowStore;
use crate::WorkflowError;

/// Approval status of the owning entity (job or requisition)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Cancelled,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "PENDING_APPROVAL" => Ok(Self::PendingApproval),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown approval status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
    Skipped,
}

/// One approver's slot in a chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalStep {
    /// 1-based position, fixed at submission time
    pub order: u32,
    pub approver_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_name: Option<String>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_at: Option<DateTime<Utc>>,
}

/// A resolved approver, named when the directory had a name for them
#[derive(Debug, Clone)]
pub struct Approver {
    pub approver_id: Uuid,
    pub name: Option<String>,
}

impl Approver {
    pub fn new(approver_id: Uuid) -> Self {
        Self {
            approver_id,
            name: None,
        }
    }
}

/// Tenant-level approval workflow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApprovalWorkflowConfig {
    pub enabled: bool,
    pub default_approvers: Vec<Uuid>,
    pub require_finance_approval: bool,
    pub salary_threshold_for_finance: u64,
    pub finance_approver_id: Option<Uuid>,
}

impl Default for ApprovalWorkflowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_approvers: Vec::new(),
            require_finance_approval: false,
            salary_threshold_for_finance: 150_000,
            finance_approver_id: None,
        }
    }
}

/// What happened on submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty approver list: the chain completed immediately
    AutoApproved,
    /// First approver to notify
    Submitted { first_approver: Uuid },
    /// Chain was already pending; nothing changed
    AlreadyPending,
}

/// What happened on approve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApproveOutcome {
    /// Cursor advanced by one; this approver is now current
    Advanced { next_approver: Uuid },
    /// That was the last step; the chain is approved
    Completed,
}

/// Sequential approval chain for one job or requisition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalChain {
    pub chain_id: Uuid,
    pub tenant_id: Uuid,
    /// The job or requisition this chain gates
    pub entity_id: Uuid,
    /// Human-readable subject used in notification text
    pub subject: String,
    pub status: ApprovalStatus,
    pub steps: Vec<ApprovalStep>,
    /// Index of the first non-terminal step
    pub current_step: u32,
    pub requested_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl ApprovalChain {
    /// New draft chain with no steps yet
    pub fn draft(
        tenant_id: Uuid,
        entity_id: Uuid,
        requested_by: Uuid,
        subject: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            chain_id: Uuid::new_v4(),
            tenant_id,
            entity_id,
            subject: subject.into(),
            status: ApprovalStatus::Draft,
            steps: Vec::new(),
            current_step: 0,
            requested_by,
            created_at: now,
            updated_at: now,
            approved_at: None,
            rejected_at: None,
        }
    }

    /// The step awaiting action, if any
    pub fn current(&self) -> Option<&ApprovalStep> {
        self.steps.get(self.current_step as usize)
    }

    /// Whether this chain is waiting on the given approver
    pub fn pending_for(&self, approver_id: Uuid) -> bool {
        self.status == ApprovalStatus::PendingApproval
            && self
                .current()
                .map(|s| s.approver_id == approver_id && s.status == StepStatus::Pending)
                .unwrap_or(false)
    }

    /// Submit the chain with a resolved approver list.
    ///
    /// Steps are created here, in order 1..N. An empty list auto-approves.
    /// Submitting an already-pending chain is a no-op.
    pub fn submit(
        &mut self,
        approvers: &[Approver],
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, WorkflowError> {
        match self.status {
            ApprovalStatus::PendingApproval => return Ok(SubmitOutcome::AlreadyPending),
            ApprovalStatus::Draft => {}
            other => {
                return Err(WorkflowError::BadRequest(format!(
                    "Only draft chains can be submitted (status: {})",
                    other
                )))
            }
        }

        self.updated_at = now;

        if approvers.is_empty() {
            self.status = ApprovalStatus::Approved;
            self.approved_at = Some(now);
            return Ok(SubmitOutcome::AutoApproved);
        }

        self.steps = approvers
            .iter()
            .enumerate()
            .map(|(index, approver)| ApprovalStep {
                order: index as u32 + 1,
                approver_id: approver.approver_id,
                approver_name: approver.name.clone(),
                status: StepStatus::Pending,
                comment: None,
                action_at: None,
            })
            .collect();
        self.current_step = 0;
        self.status = ApprovalStatus::PendingApproval;

        Ok(SubmitOutcome::Submitted {
            first_approver: approvers[0].approver_id,
        })
    }

    /// Approve the current step. Only the approver of the current pending
    /// step may act; the cursor advances by exactly one, or the chain
    /// completes if this was the last step. The two outcomes are mutually
    /// exclusive.
    pub fn approve(
        &mut self,
        approver_id: Uuid,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ApproveOutcome, WorkflowError> {
        self.check_actionable(approver_id)?;

        let index = self.current_step as usize;
        let is_last = index + 1 >= self.steps.len();

        let step = &mut self.steps[index];
        step.status = StepStatus::Approved;
        step.comment = comment;
        step.action_at = Some(now);
        self.updated_at = now;

        if is_last {
            self.status = ApprovalStatus::Approved;
            self.approved_at = Some(now);
            Ok(ApproveOutcome::Completed)
        } else {
            self.current_step += 1;
            Ok(ApproveOutcome::Advanced {
                next_approver: self.steps[index + 1].approver_id,
            })
        }
    }

    /// Reject the current step. Rejection at any step short-circuits the
    /// entire chain; later steps are never evaluated and stay pending.
    pub fn reject(
        &mut self,
        approver_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if reason.trim().is_empty() {
            return Err(WorkflowError::BadRequest(
                "A rejection reason is required".to_string(),
            ));
        }
        self.check_actionable(approver_id)?;

        let step = &mut self.steps[self.current_step as usize];
        step.status = StepStatus::Rejected;
        step.comment = Some(reason.to_string());
        step.action_at = Some(now);

        self.status = ApprovalStatus::Rejected;
        self.rejected_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Cancel the chain. Only the original requester may cancel, and only
    /// from DRAFT or PENDING_APPROVAL; a completed approval cannot be
    /// retracted.
    pub fn cancel(&mut self, requester_id: Uuid, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if requester_id != self.requested_by {
            return Err(WorkflowError::NotAuthorized(
                "Only the requester can cancel this chain".to_string(),
            ));
        }
        match self.status {
            ApprovalStatus::Draft | ApprovalStatus::PendingApproval => {
                self.status = ApprovalStatus::Cancelled;
                self.updated_at = now;
                Ok(())
            }
            ApprovalStatus::Approved => Err(WorkflowError::BadRequest(
                "Cannot cancel an approved chain".to_string(),
            )),
            other => Err(WorkflowError::BadRequest(format!(
                "Cannot cancel a chain in status {}",
                other
            ))),
        }
    }

    fn check_actionable(&self, approver_id: Uuid) -> Result<(), WorkflowError> {
        if self.status != ApprovalStatus::PendingApproval {
            return Err(WorkflowError::BadRequest(format!(
                "Chain is not pending approval (status: {})",
                self.status
            )));
        }
        let step = self.current().ok_or_else(|| {
            WorkflowError::BadRequest("Chain has no current step".to_string())
        })?;
        if step.approver_id != approver_id {
            return Err(WorkflowError::NotAuthorized(
                "You are not the approver for the current step".to_string(),
            ));
        }
        if step.status != StepStatus::Pending {
            return Err(WorkflowError::BadRequest(
                "Current step has already been resolved".to_string(),
            ));
        }
        Ok(())
    }
}

/// Drives chains through the store with optimistic concurrency and
/// notifies the affected parties. Notification failures are logged and
/// swallowed; they never fail the operation.
pub struct ApprovalEngine {
    store: Arc<dyn WorkflowStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl ApprovalEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
        }
    }

    /// Create and persist a fresh draft chain for an entity
    pub async fn open_chain(
        &self,
        tenant_id: Uuid,
        entity_id: Uuid,
        requested_by: Uuid,
        subject: &str,
    ) -> Result<ApprovalChain, WorkflowError> {
        let chain = ApprovalChain::draft(tenant_id, entity_id, requested_by, subject, self.clock.now());
        self.store.insert_chain(&chain).await?;
        Ok(chain)
    }

    /// Submit a chain for approval. Only the first approver is notified;
    /// later approvers hear about it when their step becomes current.
    pub async fn submit(
        &self,
        chain_id: Uuid,
        approvers: &[Approver],
    ) -> Result<ApprovalChain, WorkflowError> {
        let mut chain = self.store.load_chain(chain_id).await?;
        let (expected_step, expected_status) = (chain.current_step, chain.status);

        let outcome = chain.submit(approvers, self.clock.now())?;
        if outcome != SubmitOutcome::AlreadyPending {
            self.store
                .update_chain_if(&chain, expected_step, expected_status)
                .await?;
        }

        if let SubmitOutcome::Submitted { first_approver } = outcome {
            self.notify_quietly(Notification::approval_request(&chain, first_approver))
                .await;
        }
        Ok(chain)
    }

    /// Approve the current step as `approver_id`
    pub async fn approve_step(
        &self,
        chain_id: Uuid,
        approver_id: Uuid,
        comment: Option<String>,
    ) -> Result<ApprovalChain, WorkflowError> {
        let mut chain = self.store.load_chain(chain_id).await?;
        let (expected_step, expected_status) = (chain.current_step, chain.status);

        let outcome = chain.approve(approver_id, comment, self.clock.now())?;
        self.store
            .update_chain_if(&chain, expected_step, expected_status)
            .await?;

        match outcome {
            ApproveOutcome::Completed => {
                self.notify_quietly(Notification::approval_resolved(&chain, None))
                    .await;
            }
            ApproveOutcome::Advanced { next_approver } => {
                self.notify_quietly(Notification::approval_request(&chain, next_approver))
                    .await;
            }
        }
        Ok(chain)
    }

    /// Reject the current step as `approver_id`, with a mandatory reason
    pub async fn reject_step(
        &self,
        chain_id: Uuid,
        approver_id: Uuid,
        reason: &str,
    ) -> Result<ApprovalChain, WorkflowError> {
        let mut chain = self.store.load_chain(chain_id).await?;
        let (expected_step, expected_status) = (chain.current_step, chain.status);

        chain.reject(approver_id, reason, self.clock.now())?;
        self.store
            .update_chain_if(&chain, expected_step, expected_status)
            .await?;

        self.notify_quietly(Notification::approval_resolved(&chain, Some(reason)))
            .await;
        Ok(chain)
    }

    /// Cancel a chain as the original requester
    pub async fn cancel(
        &self,
        chain_id: Uuid,
        requester_id: Uuid,
    ) -> Result<ApprovalChain, WorkflowError> {
        let mut chain = self.store.load_chain(chain_id).await?;
        let (expected_step, expected_status) = (chain.current_step, chain.status);

        chain.cancel(requester_id, self.clock.now())?;
        self.store
            .update_chain_if(&chain, expected_step, expected_status)
            .await?;
        Ok(chain)
    }

    /// Fresh chain for an entity whose previous chain was rejected.
    /// Previous steps are never reused; the old chain keeps its record.
    pub async fn resubmit(
        &self,
        chain_id: Uuid,
        approvers: &[Approver],
    ) -> Result<ApprovalChain, WorkflowError> {
        let old = self.store.load_chain(chain_id).await?;
        if old.status != ApprovalStatus::Rejected {
            return Err(WorkflowError::BadRequest(format!(
                "Only rejected chains can be resubmitted (status: {})",
                old.status
            )));
        }

        let fresh = self
            .open_chain(old.tenant_id, old.entity_id, old.requested_by, &old.subject)
            .await?;
        self.submit(fresh.chain_id, approvers).await
    }

    /// Chains currently waiting on the given approver
    pub async fn pending_for_approver(
        &self,
        approver_id: Uuid,
    ) -> Result<Vec<ApprovalChain>, WorkflowError> {
        let chains = self.store.list_pending_chains().await?;
        Ok(chains
            .into_iter()
            .filter(|c| c.pending_for(approver_id))
            .collect())
    }

    async fn notify_quietly(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(notification).await {
            warn!(error = %e, "Failed to deliver approval notification");
        }
    }
}
