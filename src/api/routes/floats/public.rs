//! Public types for the floats API
use serde::{Deserialize, Serialize};

use crate::floats::{FleetSummary, OceanFloat};

#[derive(Deserialize)]
pub struct FloatsQuery {
    /// Only floats with this status, e.g. "?status=active"
    pub status: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct FloatsResponse {
    pub floats: Vec<OceanFloat>,
}

#[derive(Serialize, Deserialize)]
pub struct FloatSummaryResponse {
    pub summary: FleetSummary,
}
