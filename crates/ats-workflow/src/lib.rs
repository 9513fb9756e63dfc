//! Hiring Pipeline Workflow Core
//!
//! SLA budget resolution and status evaluation, the daily at-risk sweep,
//! escalation fan-out, and the sequential approval-chain state machine.
//!
//! Persistence and notification delivery are collaborator traits
//! ([`store::WorkflowStore`], [`notify::Notifier`]); wall-clock access goes
//! through [`clock::Clock`] so tests can simulate elapsed days.

pub mod approval;
pub mod clock;
pub mod escalation;
pub mod notify;
pub mod policy;
pub mod stage;
pub mod status;
pub mod store;
pub mod sweep;

#[cfg(feature = "database")]
pub mod repository;

pub use approval::{
    ApprovalChain, ApprovalEngine, ApprovalStatus, ApprovalStep, ApprovalWorkflowConfig, Approver,
    StepStatus,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use escalation::{EscalationNotifier, EscalationRecord, Severity};
pub use notify::{Notification, NotificationKind, Notifier, NotifyError};
pub use policy::{resolve_budget, ResolvedBudget, SlaBudget, SlaBudgetConfig, StageCategory};
pub use stage::{EntityStageView, Stage, StageDwell, StageEntry};
pub use status::{evaluate, evaluate_with_lead, SlaState, SlaStatus};
pub use store::{InMemoryStore, WorkflowStore};
pub use sweep::{JobSlaStats, SlaMonitor, SweepEntry, SweepReport, SweepScheduler};

use uuid::Uuid;

/// Errors surfaced by the workflow core
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Approval chain not found: {0}")]
    ChainNotFound(Uuid),

    #[error("Entity not found: {0}")]
    EntityNotFound(Uuid),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflicting update: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
