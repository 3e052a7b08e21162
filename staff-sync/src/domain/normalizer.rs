use serde::Deserialize;
use serde_json::Value;
use shared::responses::{DashboardHeader, DashboardSummary};
use shared::types::StaffRecord;

/// Response layouts the staff API has been observed to use for record listings.
#[derive(Debug, PartialEq)]
pub enum ResponseShape {
    Bare(Vec<Value>),
    DataWrapped(Vec<Value>),
    StaffWrapped(Vec<Value>),
    StaffListWrapped(Vec<Value>),
    Unknown(Value),
}

/// Wrapper keys checked in order when the body is an object.
const WRAPPER_KEYS: [&str; 3] = ["data", "staff", "staffList"];

impl ResponseShape {
    pub fn classify(body: Value) -> Self {
        let mut object = match body {
            Value::Array(items) => return Self::Bare(items),
            Value::Object(object) => object,
            other => return Self::Unknown(other),
        };

        for key in WRAPPER_KEYS {
            if matches!(object.get(key), Some(Value::Array(_)))
                && let Some(Value::Array(items)) = object.remove(key)
            {
                return match key {
                    "data" => Self::DataWrapped(items),
                    "staff" => Self::StaffWrapped(items),
                    _ => Self::StaffListWrapped(items),
                };
            }
        }

        Self::Unknown(Value::Object(object))
    }

    fn into_items(self) -> Option<Vec<Value>> {
        match self {
            Self::Bare(items)
            | Self::DataWrapped(items)
            | Self::StaffWrapped(items)
            | Self::StaffListWrapped(items) => Some(items),
            Self::Unknown(_) => None,
        }
    }
}

/// Coerces a decoded listing body into records, in the order the server sent them.
///
/// Never fails: an unrecognised layout yields an empty list, and elements that do not
/// decode as a record are skipped. Both cases are logged.
pub fn normalize_list(body: Value) -> Vec<StaffRecord> {
    let shape = ResponseShape::classify(body);
    if let ResponseShape::Unknown(body) = &shape {
        tracing::warn!(body = %truncate(body), "Unexpected staff list response format");
    }
    shape.into_items().map(decode_records).unwrap_or_default()
}

/// Coerces a dashboard body into a summary.
///
/// The staff list is read from `recent_staff` or from any listing layout; a body
/// without one yields an empty list. A missing or zero count falls back to the length
/// of that list.
pub fn normalize_dashboard(body: Value) -> DashboardSummary {
    let (header, staff) = match body {
        Value::Object(mut object) => {
            let recent = object.remove("recent_staff");
            let body = Value::Object(object);
            let header = DashboardHeader::deserialize(&body).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Unexpected dashboard response format");
                DashboardHeader::default()
            });
            let staff = match recent {
                Some(Value::Array(items)) => decode_records(items),
                _ => ResponseShape::classify(body)
                    .into_items()
                    .map(decode_records)
                    .unwrap_or_default(),
            };
            (header, staff)
        }
        other => (DashboardHeader::default(), normalize_list(other)),
    };

    let total_staff = header
        .total_staff
        .or(header.statistics.total_staff)
        .filter(|&total| total > 0)
        .unwrap_or(staff.len());

    DashboardSummary {
        company_name: header.company_name,
        total_staff,
        statistics: header.statistics,
        staff,
    }
}

fn decode_records(items: Vec<Value>) -> Vec<StaffRecord> {
    let total = items.len();
    let records: Vec<StaffRecord> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping undecodable staff record");
                None
            }
        })
        .collect();

    if records.len() != total {
        tracing::warn!(
            decoded = records.len(),
            total,
            "Staff list contained undecodable records"
        );
    }

    records
}

/// Coerces a single-record body: either the record itself, or one wrapped in `staff`
/// or `data`.
pub fn normalize_one(body: Value) -> Option<StaffRecord> {
    let candidate = match body {
        Value::Object(mut object) if !object.contains_key("id") => {
            ["staff", "data"].iter().find_map(|key| object.remove(*key))?
        }
        other => other,
    };

    match serde_json::from_value(candidate) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(error = %e, "Unexpected staff record response format");
            None
        }
    }
}

fn truncate(body: &Value) -> String {
    let mut text = body.to_string();
    if text.len() > 200 {
        let mut end = 200;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push_str("...");
    }
    text
}
