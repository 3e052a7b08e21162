use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

// region: Staff Types

/// Identifier assigned by the staff API.
///
/// The API currently emits integers, but the client never interprets the value, so both
/// JSON numbers and non-empty strings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StaffId(String);

impl StaffId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for StaffId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for StaffId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl<'de> Deserialize<'de> for StaffId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Number(id) => Ok(Self::from(id)),
            RawId::Text(id) if !id.trim().is_empty() => Ok(Self(id)),
            RawId::Text(_) => Err(serde::de::Error::custom("staff id must not be empty")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmploymentStatus {
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Contract,
    Temporary,
    Intern,
}

impl EmploymentStatus {
    pub const ALL: [Self; 5] = [
        Self::FullTime,
        Self::PartTime,
        Self::Contract,
        Self::Temporary,
        Self::Intern,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullTime => "Full-time",
            Self::PartTime => "Part-time",
            Self::Contract => "Contract",
            Self::Temporary => "Temporary",
            Self::Intern => "Intern",
        }
    }
}

impl fmt::Display for EmploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmploymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("employment status", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    pub const ALL: [Self; 3] = [Self::Male, Self::Female, Self::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sex| sex.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("sex", s))
    }
}

/// Returned when a closed-set field receives a value outside the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// One employee as returned by the staff API.
///
/// Decoding is tolerant: missing text fields become empty strings, and closed-set or
/// date fields the client cannot interpret become `None`. Only `id` is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRecord {
    pub id: StaffId,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub firstname: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub lastname: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub national_insurance_number: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub home_address: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub telephone_number: String,
    #[serde(default, deserialize_with = "lenient")]
    pub employment_status: Option<EmploymentStatus>,
    #[serde(default)]
    pub immigration_status: Option<String>,
    #[serde(default)]
    pub visa_type: Option<String>,
    #[serde(default)]
    pub visa_sharecode: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub sex: Option<Sex>,
    #[serde(default, deserialize_with = "lenient")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub proof_of_id: Option<String>,
}

impl StaffRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
            .trim()
            .to_owned()
    }

    /// Builds an editable draft from this record.
    ///
    /// Returns `None` if a closed-set field or the date of birth is missing.
    pub fn to_draft(&self) -> Option<StaffDraft> {
        Some(StaffDraft {
            firstname: self.firstname.clone(),
            lastname: self.lastname.clone(),
            national_insurance_number: self.national_insurance_number.clone(),
            home_address: self.home_address.clone(),
            telephone_number: self.telephone_number.clone(),
            employment_status: self.employment_status?,
            immigration_status: self.immigration_status.clone(),
            visa_type: self.visa_type.clone(),
            visa_sharecode: self.visa_sharecode.clone(),
            sex: self.sex?,
            date_of_birth: self.date_of_birth?,
        })
    }
}

/// Writable staff fields sent on create and update. Never carries the `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffDraft {
    pub firstname: String,
    pub lastname: String,
    pub national_insurance_number: String,
    pub home_address: String,
    pub telephone_number: String,
    pub employment_status: EmploymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immigration_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visa_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visa_sharecode: Option<String>,
    pub sex: Sex,
    pub date_of_birth: NaiveDate,
}

impl StaffDraft {
    /// Scalar fields as form values in declaration order, skipping empty ones.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let optional = |value: &Option<String>| value.clone().unwrap_or_default();

        [
            ("firstname", self.firstname.clone()),
            ("lastname", self.lastname.clone()),
            (
                "national_insurance_number",
                self.national_insurance_number.clone(),
            ),
            ("home_address", self.home_address.clone()),
            ("telephone_number", self.telephone_number.clone()),
            ("employment_status", self.employment_status.to_string()),
            ("immigration_status", optional(&self.immigration_status)),
            ("visa_type", optional(&self.visa_type)),
            ("visa_sharecode", optional(&self.visa_sharecode)),
            ("sex", self.sex.to_string()),
            (
                "date_of_birth",
                self.date_of_birth.format("%Y-%m-%d").to_string(),
            ),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect()
    }
}

// endregion: Staff Types

// region: Serde helpers

fn string_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.trim().parse().ok()))
}

// endregion: Serde helpers
