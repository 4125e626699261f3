use anyhow::Result;
use libsql::Connection;

use super::models::{PingerConfig, unix_now};

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 2;

/// Run database migrations
///
/// `seed` is written to `pinger_config` only when that table is created.
pub async fn run_migrations(conn: &Connection, seed: &PingerConfig) -> Result<()> {
    // Create schema_migrations table first (tracks applied migrations)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Hosts, folders, users and phones").await?;
    }

    if current_version < 2 {
        run_migration_v2(conn, seed).await?;
        record_migration(conn, 2, "Pinger configuration row").await?;
    }

    tracing::info!(
        "Database migrations completed successfully (now at version {})",
        SCHEMA_VERSION
    );
    Ok(())
}

/// Get current schema version from database
async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

/// Record that a migration was applied
async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, unix_now(), description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: domain tables
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS folders (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )",
        (),
    )
    .await?;

    // `rowid` keeps insertion order, which is the order sweeps visit hosts in.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS hosts (
            ip TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            folder_id INTEGER NOT NULL,
            state TEXT NOT NULL,
            last_change_time INTEGER NOT NULL,
            info TEXT NOT NULL DEFAULT '',
            sms TEXT
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            login TEXT NOT NULL PRIMARY KEY,
            password TEXT NOT NULL,
            access TEXT NOT NULL,
            last_online INTEGER
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS phones (
            number TEXT NOT NULL PRIMARY KEY,
            info TEXT NOT NULL DEFAULT ''
        )",
        (),
    )
    .await?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_hosts_folder_id ON hosts(folder_id)", ()).await?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_hosts_state ON hosts(state)", ()).await?;

    Ok(())
}

/// Migration v2: singleton pinger configuration
async fn run_migration_v2(conn: &Connection, seed: &PingerConfig) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pinger_config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            auto_ping_interval_s INTEGER NOT NULL,
            icmp_count INTEGER NOT NULL,
            icmp_interval_s REAL NOT NULL,
            hosts_per_second INTEGER NOT NULL,
            icmp_timeout_s REAL NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute(
        "INSERT OR IGNORE INTO pinger_config (id, auto_ping_interval_s, icmp_count,
            icmp_interval_s, hosts_per_second, icmp_timeout_s)
         VALUES (1, ?, ?, ?, ?, ?)",
        libsql::params![
            seed.auto_ping_interval_s as i64,
            i64::from(seed.icmp_count),
            seed.icmp_interval_s,
            i64::from(seed.hosts_per_second),
            seed.icmp_timeout_s
        ],
    )
    .await?;

    Ok(())
}
