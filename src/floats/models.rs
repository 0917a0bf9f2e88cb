//! ARGO float records as shown on the float map.
use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

/// Operational status of a float. Anything that isn't a known status
/// is kept as `Unknown` rather than rejected.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum FloatStatus {
    Active,
    Maintenance,
    Inactive,
    Unknown,
}

impl FloatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FloatStatus::Active => "active",
            FloatStatus::Maintenance => "maintenance",
            FloatStatus::Inactive => "inactive",
            FloatStatus::Unknown => "unknown",
        }
    }
}

impl From<&str> for FloatStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => FloatStatus::Active,
            "maintenance" => FloatStatus::Maintenance,
            "inactive" => FloatStatus::Inactive,
            _ => FloatStatus::Unknown,
        }
    }
}

impl From<String> for FloatStatus {
    fn from(value: String) -> Self {
        FloatStatus::from(value.as_str())
    }
}

impl From<FloatStatus> for String {
    fn from(status: FloatStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for FloatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl ToSql for FloatStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for FloatStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(FloatStatus::from(value.as_str()?))
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct OceanFloat {
    pub id: String,
    /// WMO identifier of the float, e.g. "5906512"
    pub float_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters
    pub depth: f64,
    /// Degrees Celsius
    pub temperature: f64,
    /// Practical salinity units
    pub salinity: f64,
    pub status: FloatStatus,
    pub last_updated: DateTime<Utc>,
}

/// Counts of floats by status.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct FleetSummary {
    pub total: usize,
    pub active: usize,
    pub maintenance: usize,
    pub inactive: usize,
    pub unknown: usize,
}

impl FleetSummary {
    pub fn from_floats(floats: &[OceanFloat]) -> Self {
        floats.iter().fold(Self::default(), |mut acc, f| {
            acc.total += 1;
            match f.status {
                FloatStatus::Active => acc.active += 1,
                FloatStatus::Maintenance => acc.maintenance += 1,
                FloatStatus::Inactive => acc.inactive += 1,
                FloatStatus::Unknown => acc.unknown += 1,
            }
            acc
        })
    }
}
