use anyhow::{Result, anyhow};

use crate::core::db::connect_and_initialize;
use crate::floats::{FleetSummary, OceanFloat, get_float, list_floats};

fn float_line(float: &OceanFloat) -> String {
    format!(
        "{:<10} {:<12} Lat: {:.4}° Lon: {:.4}° Temp: {}°C Depth: {}m",
        float.float_id, float.status, float.latitude, float.longitude, float.temperature, float.depth
    )
}

fn float_details(float: &OceanFloat) -> String {
    format!(
        "Float Details: {}\nStatus: {}\nPosition: {:.6}°, {:.6}°\nTemperature: {}°C\nSalinity: {} psu\nDepth: {}m\nLast updated: {}",
        float.float_id,
        float.status,
        float.latitude,
        float.longitude,
        float.temperature,
        float.salinity,
        float.depth,
        float.last_updated.to_rfc2822()
    )
}

pub async fn run(id: Option<String>, db_path: &str) -> Result<()> {
    let db = connect_and_initialize(db_path).await?;

    if let Some(id) = id {
        let float = get_float(&db, &id)
            .await?
            .ok_or(anyhow!("Float {} not found", id))?;
        println!("{}", float_details(&float));
        return Ok(());
    }

    let floats = list_floats(&db, None).await?;
    if floats.is_empty() {
        println!("No float data available");
        return Ok(());
    }

    let summary = FleetSummary::from_floats(&floats);
    println!(
        "Floats ({}): {} active, {} maintenance, {} inactive",
        summary.total, summary.active, summary.maintenance, summary.inactive
    );
    for float in floats.iter() {
        println!("{}", float_line(float));
    }

    Ok(())
}
