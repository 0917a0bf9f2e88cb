//! ARGO float positions and readings.
pub mod db;
pub mod models;

pub use db::{get_float, insert_float, list_floats, seed_demo_fleet};
pub use models::{FleetSummary, FloatStatus, OceanFloat};
