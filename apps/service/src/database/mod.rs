/// Database abstraction layer
///
/// Hosts, folders, users, phones and the pinger configuration all live in a
/// single LibSQL (SQLite) file behind the [`Database`] trait.

pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{Database, DatabaseImpl, HostUpdate, StoreError, StoreResult};

use anyhow::Result;

use models::PingerConfig;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection, seed: &PingerConfig) -> Result<()> {
    migrations::run_migrations(conn, seed).await
}
