//! Record store for maintenance requests.
//!
//! Uses SeaORM over a pooled `DatabaseConnection`, so any backend sqlx
//! supports (PostgreSQL, SQLite) works from the connection URL alone.
//! Cloning the connection is cheap and every clone shares the pool.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

pub mod case_repo;
pub mod entities;
pub mod error;
pub mod migrations;

pub use case_repo::CaseRepository;
pub use error::DatabaseError;
pub use migrations::Migrator;

/// How long to wait for a free pooled connection before failing a call.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens a connection pool and applies pending migrations.
pub async fn connect(
    url: &str,
    min_connections: u32,
    max_connections: u32,
) -> Result<DatabaseConnection, DatabaseError> {
    let mut options = ConnectOptions::new(url.to_owned());
    options
        .min_connections(min_connections)
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    Migrator::up(&db, None).await?;

    log::info!(
        "Database pool ready ({}..{} connections)",
        min_connections,
        max_connections
    );

    Ok(db)
}
