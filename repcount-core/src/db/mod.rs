pub mod models;
pub mod operations;
pub mod schema;

use anyhow::{Context, Result, anyhow};
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::{debug, info};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug, Clone, Copy)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(
            "PRAGMA busy_timeout = 5000;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Opens a pooled connection to the SQLite file at `db_path`, creating it if
/// needed, and brings the schema up to date.
pub fn connect(db_path: &str) -> Result<DbPool> {
    debug!("Opening database at {}", db_path);
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)
        .with_context(|| format!("Failed to create DB pool for {}", db_path))?;

    let mut conn = pool.get().context("Failed to get a DB connection")?;
    init_database(&mut conn)?;
    Ok(pool)
}

pub fn init_database(conn: &mut SqliteConnection) -> Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("Failed to run migrations: {}", e))?;

    if applied.is_empty() {
        debug!("Database schema is up to date");
    }
    for migration in applied {
        info!("Applied migration: {}", migration);
    }
    Ok(())
}

pub fn drop_all_rows(conn: &mut SqliteConnection) -> Result<()> {
    conn.batch_execute("DELETE FROM rep_events; DELETE FROM workout_sessions;")?;
    Ok(())
}
