//! Connection pooling and migrations.

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use herald_error::{DatabaseError, DatabaseErrorKind, DatabaseResult};
use tracing::{info, instrument};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Pooled PostgreSQL connections.
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Build a connection pool and check that a connection can be made.
#[instrument(skip(database_url))]
pub fn connect(database_url: &str, pool_size: u32) -> DatabaseResult<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(pool_size)
        .build(manager)
        .map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Connection(format!(
                "Failed to create connection pool: {e}"
            )))
        })?;

    // Warm up the pool so a bad URL fails here rather than mid-cycle
    pool.get().map_err(|e| {
        DatabaseError::new(DatabaseErrorKind::Connection(format!(
            "Failed to warm up connection pool: {e}"
        )))
    })?;

    info!(pool_size, "Database pool ready");
    Ok(pool)
}

/// Run pending migrations.
#[instrument(skip(pool))]
pub fn run_migrations(pool: &PgPool) -> DatabaseResult<()> {
    let mut conn = pool
        .get()
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Connection(e.to_string())))?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Migration(e.to_string())))?;
    info!(count = applied.len(), "Migrations applied");
    Ok(())
}

/// Run `f` with a pooled connection on the blocking thread pool.
pub(super) async fn with_conn<T, F>(pool: &PgPool, f: F) -> DatabaseResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> DatabaseResult<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Connection(format!(
                "Failed to get connection from pool: {e}"
            )))
        })?;
        f(&mut conn)
    })
    .await
    .map_err(|e| DatabaseError::new(DatabaseErrorKind::Query(format!("Task join error: {e}"))))?
}
