//! SLA Budget Resolution
//!
//! A stage-level override always wins; otherwise the stage name is mapped
//! to a tenant-configured category default. Resolution is pure: identical
//! inputs always yield the identical budget.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// At-risk window applied when a budget does not carry its own lead time
pub const DEFAULT_ALERT_LEAD_DAYS: u32 = 1;

/// Normalized stage category for tenant-level SLA defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCategory {
    PhoneScreen,
    Screening,
    Interview,
    Assessment,
    BackgroundCheck,
    OfferAcceptance,
    Offer,
    Onboarding,
}

impl StageCategory {
    /// Categorize a stage by name.
    ///
    /// Case-insensitive substring match against a fixed keyword order; the
    /// first matching bucket wins. "offer" + "acceptance" is checked before
    /// plain "offer".
    pub fn from_stage_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.contains("phone") {
            return Some(Self::PhoneScreen);
        }
        if name.contains("resume") || name.contains("screen") {
            return Some(Self::Screening);
        }
        if name.contains("interview") {
            return Some(Self::Interview);
        }
        if name.contains("assessment") || name.contains("test") {
            return Some(Self::Assessment);
        }
        if name.contains("background") || name.contains("bgv") {
            return Some(Self::BackgroundCheck);
        }
        if name.contains("offer") && name.contains("acceptance") {
            return Some(Self::OfferAcceptance);
        }
        if name.contains("offer") {
            return Some(Self::Offer);
        }
        if name.contains("onboard") {
            return Some(Self::Onboarding);
        }
        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhoneScreen => "phone_screen",
            Self::Screening => "screening",
            Self::Interview => "interview",
            Self::Assessment => "assessment",
            Self::BackgroundCheck => "background_check",
            Self::OfferAcceptance => "offer_acceptance",
            Self::Offer => "offer",
            Self::Onboarding => "onboarding",
        }
    }
}

/// One category's tenant default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaBudget {
    /// Maximum days in stage
    pub days: u32,
    /// At-risk window before the deadline
    #[serde(default = "default_alert_lead")]
    pub alert_lead_days: u32,
}

fn default_alert_lead() -> u32 {
    DEFAULT_ALERT_LEAD_DAYS
}

impl SlaBudget {
    pub fn days(days: u32) -> Self {
        Self {
            days,
            alert_lead_days: DEFAULT_ALERT_LEAD_DAYS,
        }
    }
}

/// Tenant-scoped SLA defaults, keyed by stage category.
///
/// Every field is optional; absence of configuration is a valid state and
/// leaves matching stages unmonitored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlaBudgetConfig {
    pub phone_screen: Option<SlaBudget>,
    pub screening: Option<SlaBudget>,
    pub interview: Option<SlaBudget>,
    pub assessment: Option<SlaBudget>,
    pub background_check: Option<SlaBudget>,
    pub offer_acceptance: Option<SlaBudget>,
    pub offer: Option<SlaBudget>,
    pub onboarding: Option<SlaBudget>,
}

impl SlaBudgetConfig {
    pub fn budget_for(&self, category: StageCategory) -> Option<SlaBudget> {
        match category {
            StageCategory::PhoneScreen => self.phone_screen,
            StageCategory::Screening => self.screening,
            StageCategory::Interview => self.interview,
            StageCategory::Assessment => self.assessment,
            StageCategory::BackgroundCheck => self.background_check,
            StageCategory::OfferAcceptance => self.offer_acceptance,
            StageCategory::Offer => self.offer,
            StageCategory::Onboarding => self.onboarding,
        }
    }
}

/// Where a resolved budget came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetSource {
    StageOverride,
    TenantDefault(StageCategory),
}

/// A budget applicable to one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedBudget {
    pub days: u32,
    pub alert_lead_days: u32,
    pub source: BudgetSource,
}

/// Resolve the applicable SLA budget for a stage.
///
/// A positive stage-level `sla_days` wins outright. Otherwise the stage
/// name is categorized and the tenant default for that category applies.
/// `None` means the stage is unmonitored.
pub fn resolve_budget(
    stage: &Stage,
    tenant_config: Option<&SlaBudgetConfig>,
) -> Option<ResolvedBudget> {
    if let Some(days) = stage.sla_days {
        if days > 0 {
            return Some(ResolvedBudget {
                days,
                alert_lead_days: DEFAULT_ALERT_LEAD_DAYS,
                source: BudgetSource::StageOverride,
            });
        }
    }

    let category = StageCategory::from_stage_name(&stage.name)?;
    let budget = tenant_config?.budget_for(category).filter(|b| b.days > 0)?;

    Some(ResolvedBudget {
        days: budget.days,
        alert_lead_days: budget.alert_lead_days,
        source: BudgetSource::TenantDefault(category),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_interview(days: u32) -> SlaBudgetConfig {
        SlaBudgetConfig {
            interview: Some(SlaBudget::days(days)),
            ..Default::default()
        }
    }

    #[test]
    fn test_stage_override_wins() {
        let stage = Stage::new("Technical Interview", 3).with_sla_days(2);
        let config = config_with_interview(7);

        let resolved = resolve_budget(&stage, Some(&config)).unwrap();
        assert_eq!(resolved.days, 2);
        assert_eq!(resolved.source, BudgetSource::StageOverride);
    }

    #[test]
    fn test_zero_override_falls_through_to_tenant_default() {
        let mut stage = Stage::new("Technical Interview", 3);
        stage.sla_days = Some(0);
        let config = config_with_interview(7);

        let resolved = resolve_budget(&stage, Some(&config)).unwrap();
        assert_eq!(resolved.days, 7);
        assert_eq!(
            resolved.source,
            BudgetSource::TenantDefault(StageCategory::Interview)
        );
    }

    #[test]
    fn test_category_order_first_match_wins() {
        // "phone" is checked before "interview" and before "screen"
        assert_eq!(
            StageCategory::from_stage_name("Phone Interview"),
            Some(StageCategory::PhoneScreen)
        );
        assert_eq!(
            StageCategory::from_stage_name("Resume Screen"),
            Some(StageCategory::Screening)
        );
        // "offer" + "acceptance" beats plain "offer"
        assert_eq!(
            StageCategory::from_stage_name("Offer Acceptance"),
            Some(StageCategory::OfferAcceptance)
        );
        assert_eq!(
            StageCategory::from_stage_name("Offer Review"),
            Some(StageCategory::Offer)
        );
        assert_eq!(
            StageCategory::from_stage_name("BGV Check"),
            Some(StageCategory::BackgroundCheck)
        );
        assert_eq!(
            StageCategory::from_stage_name("Onboarding"),
            Some(StageCategory::Onboarding)
        );
        assert_eq!(StageCategory::from_stage_name("Team Debrief"), None);
    }

    #[test]
    fn test_unconfigured_category_is_unmonitored() {
        let stage = Stage::new("Technical Interview", 3);
        let config = SlaBudgetConfig::default();
        assert!(resolve_budget(&stage, Some(&config)).is_none());
        assert!(resolve_budget(&stage, None).is_none());
    }

    #[test]
    fn test_resolution_is_pure() {
        let stage = Stage::new("Technical Interview", 3);
        let config = config_with_interview(5);
        let first = resolve_budget(&stage, Some(&config));
        let second = resolve_budget(&stage, Some(&config));
        assert_eq!(first, second);
    }
}
