use anyhow::{Error, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params};
use uuid::Uuid;

use super::models::{FloatStatus, OceanFloat};

const FLOAT_COLUMNS: &str =
    "id, float_id, latitude, longitude, depth, temperature, salinity, status, last_updated";

fn float_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OceanFloat> {
    let last_updated: String = row.get(8)?;
    let last_updated = DateTime::parse_from_rfc3339(&last_updated)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(OceanFloat {
        id: row.get(0)?,
        float_id: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        depth: row.get(4)?,
        temperature: row.get(5)?,
        salinity: row.get(6)?,
        status: row.get(7)?,
        last_updated,
    })
}

/// List floats, most recently added first. Optionally only those
/// with `status`.
pub async fn list_floats(
    db: &Connection,
    status: Option<FloatStatus>,
) -> Result<Vec<OceanFloat>, Error> {
    let floats = db
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                r#"
                SELECT {FLOAT_COLUMNS}
                FROM ocean_float
                WHERE ?1 IS NULL OR status = ?1
                ORDER BY created_at DESC, rowid DESC
                "#
            ))?;
            let rows = stmt
                .query_map(params![status], float_from_row)?
                .collect::<rusqlite::Result<Vec<OceanFloat>>>()?;
            Ok(rows)
        })
        .await?;

    Ok(floats)
}

pub async fn get_float(db: &Connection, id: &str) -> Result<Option<OceanFloat>, Error> {
    let id = id.to_owned();
    let float = db
        .call(move |conn| {
            let result = conn
                .query_row(
                    &format!("SELECT {FLOAT_COLUMNS} FROM ocean_float WHERE id = ?"),
                    [id],
                    float_from_row,
                )
                .optional()?;
            Ok(result)
        })
        .await?;

    Ok(float)
}

pub async fn insert_float(db: &Connection, float: &OceanFloat) -> Result<(), Error> {
    let float = float.clone();
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    db.call(move |conn| {
        conn.execute(
            &format!(
                "INSERT INTO ocean_float ({FLOAT_COLUMNS}, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                float.id,
                float.float_id,
                float.latitude,
                float.longitude,
                float.depth,
                float.temperature,
                float.salinity,
                float.status,
                float.last_updated.to_rfc3339_opts(SecondsFormat::Micros, true),
                created_at,
            ],
        )?;
        Ok(())
    })
    .await?;

    Ok(())
}

/// A handful of floats across the major ocean basins for trying
/// things out locally.
pub fn demo_fleet() -> Vec<OceanFloat> {
    let now = Utc::now();
    let fleet = [
        ("5906512", 35.6762, 139.6503, 1000.0, 18.4, 34.6, FloatStatus::Active, 2),
        ("4903218", -33.8688, 151.2093, 1500.0, 21.1, 35.4, FloatStatus::Active, 5),
        ("6902746", 60.1699, -20.9384, 2000.0, 7.2, 35.1, FloatStatus::Maintenance, 30),
        ("3901875", -45.0, -30.5, 1800.0, 9.8, 34.3, FloatStatus::Active, 12),
        ("2902114", 12.5, 65.2, 900.0, 27.6, 36.2, FloatStatus::Inactive, 240),
        ("7900433", -62.3, 45.1, 1200.0, -0.8, 33.9, FloatStatus::Active, 8),
    ];

    fleet
        .into_iter()
        .map(
            |(float_id, latitude, longitude, depth, temperature, salinity, status, hours_ago)| {
                OceanFloat {
                    id: Uuid::new_v4().to_string(),
                    float_id: float_id.to_string(),
                    latitude,
                    longitude,
                    depth,
                    temperature,
                    salinity,
                    status,
                    last_updated: now - Duration::hours(hours_ago),
                }
            },
        )
        .collect()
}

/// Insert the demo fleet, returning how many floats were added.
pub async fn seed_demo_fleet(db: &Connection) -> Result<usize, Error> {
    let fleet = demo_fleet();
    for float in fleet.iter() {
        insert_float(db, float).await?;
    }
    Ok(fleet.len())
}
