//! Requisition flow end to end: tenant-config approver resolution,
//! finance gating, pending listings, and the reject/resubmit loop.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use ats_poc::services::{
    NewRequisition, NotificationCenter, RequisitionService, SettingsService, Urgency,
};
use ats_workflow::approval::{ApprovalStatus, ApprovalWorkflowConfig};
use ats_workflow::clock::{Clock, ManualClock};
use ats_workflow::notify::Notifier;
use ats_workflow::store::{InMemoryStore, WorkflowStore};
use ats_workflow::WorkflowError;

struct Fixture {
    service: RequisitionService,
    settings: SettingsService,
    tenant: Uuid,
}

fn fixture() -> Fixture {
    let store: Arc<dyn WorkflowStore> = Arc::new(InMemoryStore::new());
    let notifier: Arc<dyn Notifier> = Arc::new(NotificationCenter::new());
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
    Fixture {
        service: RequisitionService::new(store.clone(), notifier, clock),
        settings: SettingsService::new(store),
        tenant: Uuid::new_v4(),
    }
}

fn new_requisition(salary_max: Option<u64>) -> NewRequisition {
    NewRequisition {
        title: "Senior Backend Engineer".to_string(),
        department: Some("Engineering".to_string()),
        headcount: 2,
        salary_max,
        justification: "Team is at capacity".to_string(),
        urgency: Urgency::High,
        approver_ids: Vec::new(),
    }
}

#[tokio::test]
async fn test_finance_step_appended_above_salary_threshold() {
    let fixture = fixture();
    let manager = Uuid::new_v4();
    let finance = Uuid::new_v4();
    let requester = Uuid::new_v4();

    fixture
        .settings
        .update_approval_workflow_config(
            fixture.tenant,
            &ApprovalWorkflowConfig {
                default_approvers: vec![manager],
                require_finance_approval: true,
                salary_threshold_for_finance: 150_000,
                finance_approver_id: Some(finance),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let requisition = fixture
        .service
        .create(fixture.tenant, requester, new_requisition(Some(200_000)))
        .await
        .unwrap();
    assert_eq!(requisition.status, ApprovalStatus::Draft);

    let requisition = fixture
        .service
        .submit_for_approval(requisition.requisition_id)
        .await
        .unwrap();
    assert_eq!(requisition.status, ApprovalStatus::PendingApproval);

    // Manager first, then finance
    let pending = fixture.service.pending_for(manager).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(fixture.service.pending_for(finance).await.unwrap().is_empty());

    let requisition = fixture
        .service
        .approve_step(requisition.requisition_id, manager, None)
        .await
        .unwrap();
    assert_eq!(requisition.status, ApprovalStatus::PendingApproval);
    assert_eq!(fixture.service.pending_for(finance).await.unwrap().len(), 1);

    let requisition = fixture
        .service
        .approve_step(requisition.requisition_id, finance, Some("within band".to_string()))
        .await
        .unwrap();
    assert_eq!(requisition.status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn test_below_threshold_skips_finance() {
    let fixture = fixture();
    let manager = Uuid::new_v4();
    let finance = Uuid::new_v4();

    fixture
        .settings
        .update_approval_workflow_config(
            fixture.tenant,
            &ApprovalWorkflowConfig {
                default_approvers: vec![manager],
                require_finance_approval: true,
                salary_threshold_for_finance: 150_000,
                finance_approver_id: Some(finance),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let requisition = fixture
        .service
        .create(fixture.tenant, Uuid::new_v4(), new_requisition(Some(120_000)))
        .await
        .unwrap();
    let requisition = fixture
        .service
        .submit_for_approval(requisition.requisition_id)
        .await
        .unwrap();

    let requisition = fixture
        .service
        .approve_step(requisition.requisition_id, manager, None)
        .await
        .unwrap();
    // Single approver: the manager's approval completes the chain
    assert_eq!(requisition.status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn test_no_approvers_configured_auto_approves() {
    let fixture = fixture();
    let requisition = fixture
        .service
        .create(fixture.tenant, Uuid::new_v4(), new_requisition(None))
        .await
        .unwrap();
    let requisition = fixture
        .service
        .submit_for_approval(requisition.requisition_id)
        .await
        .unwrap();
    assert_eq!(requisition.status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn test_cancel_is_requester_only() {
    let fixture = fixture();
    let manager = Uuid::new_v4();
    let requester = Uuid::new_v4();

    fixture
        .settings
        .update_approval_workflow_config(
            fixture.tenant,
            &ApprovalWorkflowConfig {
                default_approvers: vec![manager],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let requisition = fixture
        .service
        .create(fixture.tenant, requester, new_requisition(None))
        .await
        .unwrap();
    let requisition = fixture
        .service
        .submit_for_approval(requisition.requisition_id)
        .await
        .unwrap();

    let err = fixture
        .service
        .cancel(requisition.requisition_id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotAuthorized(_)));

    let requisition = fixture
        .service
        .cancel(requisition.requisition_id, requester)
        .await
        .unwrap();
    assert_eq!(requisition.status, ApprovalStatus::Cancelled);
}

#[tokio::test]
async fn test_reject_then_resubmit_starts_fresh() {
    let fixture = fixture();
    let manager = Uuid::new_v4();

    fixture
        .settings
        .update_approval_workflow_config(
            fixture.tenant,
            &ApprovalWorkflowConfig {
                default_approvers: vec![manager],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let requisition = fixture
        .service
        .create(fixture.tenant, Uuid::new_v4(), new_requisition(None))
        .await
        .unwrap();
    let requisition = fixture
        .service
        .submit_for_approval(requisition.requisition_id)
        .await
        .unwrap();
    let old_chain = requisition.chain_id;

    let requisition = fixture
        .service
        .reject_step(requisition.requisition_id, manager, "not this quarter")
        .await
        .unwrap();
    assert_eq!(requisition.status, ApprovalStatus::Rejected);

    let requisition = fixture
        .service
        .resubmit(requisition.requisition_id)
        .await
        .unwrap();
    assert_eq!(requisition.status, ApprovalStatus::PendingApproval);
    assert_ne!(requisition.chain_id, old_chain);

    // The manager can act again on the fresh chain
    let requisition = fixture
        .service
        .approve_step(requisition.requisition_id, manager, None)
        .await
        .unwrap();
    assert_eq!(requisition.status, ApprovalStatus::Approved);
}
