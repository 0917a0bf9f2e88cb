use std::fs;
use std::path::Path;

use anyhow::{Context, Error, Result};
use rusqlite::Connection as SyncConnection;
use tokio_rusqlite::Connection;

const DB_FILE_NAME: &str = "floatchat.sqlite3";

/// Open the async database stored in the directory `db_path`,
/// creating the directory if it doesn't exist yet.
pub async fn async_db(db_path: &str) -> Result<Connection, Error> {
    fs::create_dir_all(db_path)
        .with_context(|| format!("Failed to create db directory {}", db_path))?;
    let path = Path::new(db_path).join(DB_FILE_NAME);
    let db = Connection::open(path).await?;
    Ok(db)
}

/// Open the database and make sure the schema exists.
pub async fn connect_and_initialize(db_path: &str) -> Result<Connection, Error> {
    let db = async_db(db_path).await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;
    Ok(db)
}

pub fn initialize_db(conn: &SyncConnection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS conversation (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS message (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversation(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_message_conversation
            ON message(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS ocean_float (
            id TEXT PRIMARY KEY,
            float_id TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            depth REAL NOT NULL,
            temperature REAL NOT NULL,
            salinity REAL NOT NULL,
            status TEXT NOT NULL,
            last_updated TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
}

/// Every statement in the schema is idempotent so migrating is the
/// same as initializing against an existing database.
pub fn migrate_db(conn: &SyncConnection) -> rusqlite::Result<()> {
    initialize_db(conn)
}
