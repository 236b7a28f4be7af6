//! Company settings consumed by the report builder.

use serde::{Deserialize, Serialize};

/// Supplier/company identity maintained by an administrator.
///
/// Absent settings block report generation with a precondition failure; the
/// builder never invents supplier data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySettings {
    pub supplier_name: String,
    pub supplier_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_ico: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_dic: Option<String>,
    /// Default technician printed on new reports.
    #[serde(default)]
    pub technician_name: String,
}
