//! Service layer: tenant settings, notifications, requisitions.

pub mod notifications;
pub mod requisitions;
pub mod settings;

pub use notifications::{NotificationCenter, NotificationPreferences};
pub use requisitions::{JobRequisition, NewRequisition, RequisitionService, Urgency};
pub use settings::SettingsService;
