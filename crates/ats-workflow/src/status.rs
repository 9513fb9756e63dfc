//! Derived SLA Status
//!
//! Pure computation over a stage-entry timestamp and a resolved budget,
//! recomputed at read time so it can never go stale. Nothing here is
//! persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::{ResolvedBudget, DEFAULT_ALERT_LEAD_DAYS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaState {
    OnTrack,
    AtRisk,
    Overdue,
}

impl SlaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnTrack => "ON_TRACK",
            Self::AtRisk => "AT_RISK",
            Self::Overdue => "OVERDUE",
        }
    }

    pub fn is_breach(&self) -> bool {
        matches!(self, Self::AtRisk | Self::Overdue)
    }
}

impl std::fmt::Display for SlaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of where an entity stands against its stage budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaStatus {
    pub status: SlaState,
    /// Whole days elapsed in the current stage (truncated, never negative)
    pub days_in_stage: i64,
    pub sla_limit: u32,
    /// Negative once overdue
    pub days_remaining: i64,
}

/// Evaluate SLA status with the default one-day at-risk window.
///
/// `None` budget means the entity is unmonitored, not an error.
pub fn evaluate(
    now: DateTime<Utc>,
    entered_at: DateTime<Utc>,
    budget_days: Option<u32>,
) -> Option<SlaStatus> {
    evaluate_with_lead(now, entered_at, budget_days, DEFAULT_ALERT_LEAD_DAYS)
}

/// Evaluate with an explicit at-risk lead window.
///
/// Partial days count as not yet elapsed. Landing exactly on the deadline
/// is at-risk, not overdue; an entity that entered today against a 1-day
/// budget is already at-risk.
pub fn evaluate_with_lead(
    now: DateTime<Utc>,
    entered_at: DateTime<Utc>,
    budget_days: Option<u32>,
    alert_lead_days: u32,
) -> Option<SlaStatus> {
    let limit = budget_days?;
    let days_in_stage = (now - entered_at).num_days().max(0);
    let days_remaining = i64::from(limit) - days_in_stage;

    let status = if days_in_stage > i64::from(limit) {
        SlaState::Overdue
    } else if days_remaining <= i64::from(alert_lead_days) {
        SlaState::AtRisk
    } else {
        SlaState::OnTrack
    };

    Some(SlaStatus {
        status,
        days_in_stage,
        sla_limit: limit,
        days_remaining,
    })
}

/// Evaluate against a resolved budget, honoring its lead window.
pub fn evaluate_resolved(
    now: DateTime<Utc>,
    entered_at: DateTime<Utc>,
    budget: Option<&ResolvedBudget>,
) -> Option<SlaStatus> {
    let budget = budget?;
    evaluate_with_lead(now, entered_at, Some(budget.days), budget.alert_lead_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        now - Duration::days(days)
    }

    #[test]
    fn test_overdue_past_budget() {
        // Entered 6 days ago against a 5-day budget
        let now = Utc::now();
        let status = evaluate(now, days_ago(now, 6), Some(5)).unwrap();
        assert_eq!(status.status, SlaState::Overdue);
        assert_eq!(status.days_in_stage, 6);
        assert_eq!(status.sla_limit, 5);
        assert_eq!(status.days_remaining, -1);
    }

    #[test]
    fn test_at_risk_one_day_remaining() {
        let now = Utc::now();
        let status = evaluate(now, days_ago(now, 2), Some(3)).unwrap();
        assert_eq!(status.status, SlaState::AtRisk);
        assert_eq!(status.days_remaining, 1);
    }

    #[test]
    fn test_deadline_day_is_at_risk_not_overdue() {
        let now = Utc::now();
        let status = evaluate(now, days_ago(now, 5), Some(5)).unwrap();
        assert_eq!(status.status, SlaState::AtRisk);
        assert_eq!(status.days_remaining, 0);
    }

    #[test]
    fn test_entered_today_with_one_day_budget_is_at_risk() {
        let now = Utc::now();
        let status = evaluate(now, now, Some(1)).unwrap();
        assert_eq!(status.status, SlaState::AtRisk);
        assert_eq!(status.days_in_stage, 0);
    }

    #[test]
    fn test_partial_days_truncate() {
        // 23 hours in is still day zero
        let now = Utc::now();
        let status = evaluate(now, now - Duration::hours(23), Some(3)).unwrap();
        assert_eq!(status.days_in_stage, 0);
        assert_eq!(status.status, SlaState::OnTrack);
    }

    #[test]
    fn test_no_budget_is_unmonitored() {
        let now = Utc::now();
        assert!(evaluate(now, days_ago(now, 30), None).is_none());
    }

    #[test]
    fn test_future_entry_clamps_to_zero_days() {
        let now = Utc::now();
        let status = evaluate(now, now + Duration::days(2), Some(5)).unwrap();
        assert_eq!(status.days_in_stage, 0);
    }

    #[test]
    fn test_wider_lead_window() {
        let now = Utc::now();
        let status = evaluate_with_lead(now, days_ago(now, 4), Some(7), 3).unwrap();
        assert_eq!(status.status, SlaState::AtRisk);

        // Same inputs under the default window are on track
        let default = evaluate(now, days_ago(now, 4), Some(7)).unwrap();
        assert_eq!(default.status, SlaState::OnTrack);
    }
}
