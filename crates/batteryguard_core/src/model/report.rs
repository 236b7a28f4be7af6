//! Inspection report model.
//!
//! # Responsibility
//! - Define the numbered report record and its measurement rows.
//!
//! # Invariants
//! - `report_number` is `<seq>/<year>`, unique and monotonic per year.
//! - Snapshot fields (supplier, customer, address, device list) are frozen
//!   at creation; later edits to the source object do not change them.

use crate::model::group::BillingInfo;
use crate::model::EntityId;
use serde::{Deserialize, Serialize};

/// Default passing verdict on freshly seeded measurement rows.
pub const VERDICT_PASS: &str = "Vyhovuje";

/// Report lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Draft,
    Final,
}

/// One measured value on a report. `value` is filled in by the technician;
/// `label`/`unit`/`verdict` are seeded at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMeasurement {
    pub label: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub verdict: String,
}

/// Supplier identity snapshot taken from company settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierInfo {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ico: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dic: Option<String>,
}

/// Customer identity snapshot, either group billing info or synthesized
/// from the object itself.
pub type CustomerInfo = BillingInfo;

/// Numbered inspection/service report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: EntityId,
    pub object_id: EntityId,
    /// Report kind tag, e.g. `REVIZE_EZS`.
    #[serde(rename = "type")]
    pub report_type: String,
    pub report_number: String,
    pub seq: i64,
    pub year: i32,
    pub status: ReportStatus,
    pub supplier: SupplierInfo,
    pub customer: CustomerInfo,
    pub object_address: String,
    /// One human-readable line per technology, object order.
    pub device_list: Vec<String>,
    #[serde(default)]
    pub technician_name: String,
    pub measurements: Vec<ReportMeasurement>,
    /// Epoch milliseconds.
    pub date_execution: i64,
    /// Epoch milliseconds.
    pub date_issue: i64,
    /// Epoch milliseconds; seeded to execution + 365 days.
    pub date_next: i64,
}

impl Report {
    /// Formats a report number from its parts.
    pub fn format_number(seq: i64, year: i32) -> String {
        format!("{seq}/{year}")
    }
}

#[cfg(test)]
mod tests {
    use super::Report;

    #[test]
    fn number_format_is_seq_slash_year() {
        assert_eq!(Report::format_number(7, 2025), "7/2025");
    }
}
