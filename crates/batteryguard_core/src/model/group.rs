//! Object group model.
//!
//! # Responsibility
//! - Define customer groups with billing info and lifecycle defaults.
//!
//! # Invariants
//! - Groups are a rarely-edited admin collection; whole-collection
//!   replacement is tolerated here and nowhere else.

use crate::model::EntityId;
use serde::{Deserialize, Serialize};

/// Billing identity used verbatim on generated reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingInfo {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ico: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dic: Option<String>,
}

/// Grouping of building objects under one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectGroup {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_info: Option<BillingInfo>,
    /// Battery lifetime in months applied to new batteries by clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_battery_life_months: Option<u32>,
    /// Replacement reminder lead time in weeks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_lead_time_weeks: Option<u32>,
}

impl ObjectGroup {
    /// Creates a group with a caller-provided id and no defaults.
    pub fn with_id(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: None,
            billing_info: None,
            default_battery_life_months: None,
            notification_lead_time_weeks: None,
        }
    }
}
