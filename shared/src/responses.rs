use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{StaffId, StaffRecord};

/// Acknowledgement body returned by the mutating staff and account endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiAck {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub staff_id: Option<StaffId>,
}

/// Error envelope. The API reports failures under either `message` or `error`.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Returns the first non-blank message, preferring `message` over `error`.
    pub fn into_message(self) -> Option<String> {
        [self.message, self.error]
            .into_iter()
            .flatten()
            .find(|message| !message.trim().is_empty())
    }
}

/// Account that owns the staff records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub access_token: String,
    #[serde(default)]
    pub boss_info: Option<AccountInfo>,
}

/// Head counts by category, as reported under the dashboard's `statistics` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DashboardStatistics {
    #[serde(alias = "totalStaff")]
    pub total_staff: Option<usize>,
    pub employment_status_breakdown: BTreeMap<String, u64>,
    pub immigration_status_breakdown: BTreeMap<String, u64>,
    pub gender_breakdown: BTreeMap<String, u64>,
}

/// Scalar part of a dashboard body. The staff count may sit at the top level or under
/// `statistics`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DashboardHeader {
    pub company_name: Option<String>,
    #[serde(alias = "totalStaff")]
    pub total_staff: Option<usize>,
    pub statistics: DashboardStatistics,
}

/// Account overview: company, head count, breakdowns and the staff list that came with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardSummary {
    pub company_name: Option<String>,
    pub total_staff: usize,
    pub statistics: DashboardStatistics,
    pub staff: Vec<StaffRecord>,
}
