use anyhow::{Result, anyhow};

use crate::core::db::connect_and_initialize;
use crate::floats::seed_demo_fleet;

pub async fn run(db: bool, seed: bool, db_path: &str) -> Result<()> {
    if !db && !seed {
        return Err(anyhow!("Missing value for init \"--db\" and/or \"--seed\""));
    }

    // Seeding needs the schema so it always initializes the db
    println!("Initializing db...");
    let conn = connect_and_initialize(db_path).await?;
    println!("Finished initializing db");

    if seed {
        println!("Seeding demo floats...");
        let count = seed_demo_fleet(&conn).await?;
        println!("Finished seeding {} floats", count);
    }

    Ok(())
}
