//! Storage backends for Herald.
//!
//! - [`InMemoryAnalyticsStore`] / [`InMemoryDependencyStateStore`]: always
//!   available, used by tests and single-process runs without a database.
//! - `PostgresAnalyticsStore` / `PostgresDependencyStateStore`: diesel over
//!   an r2d2 pool, enabled by the `postgres` feature. Several workers can
//!   share one database; dependency state is updated with a version check.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald_database::{connect, run_migrations, PostgresAnalyticsStore};
//!
//! let pool = connect("postgres://localhost/herald", 10)?;
//! run_migrations(&pool)?;
//! let store = PostgresAnalyticsStore::new(pool);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::{InMemoryAnalyticsStore, InMemoryDependencyStateStore};
#[cfg(feature = "postgres")]
pub use postgres::{
    PgPool, PostgresAnalyticsStore, PostgresDependencyStateStore, connect, run_migrations,
};

use herald_core::ContentItem;
use herald_error::{DatabaseError, DatabaseErrorKind, DatabaseResult};

/// Decide whether `incoming` may overwrite `existing`.
///
/// Returns `Ok(false)` when the write is a no-op re-save of a terminal
/// item, and an error when it would change one.
pub(crate) fn check_overwrite(existing: &ContentItem, incoming: &ContentItem) -> DatabaseResult<bool> {
    if !existing.is_terminal() {
        return Ok(true);
    }
    let unchanged = existing.status() == incoming.status()
        && existing.text() == incoming.text()
        && existing.platform_post_id() == incoming.platform_post_id();
    if unchanged {
        Ok(false)
    } else {
        Err(DatabaseError::new(DatabaseErrorKind::Immutable(format!(
            "content item {} is {}",
            existing.id(),
            existing.status()
        ))))
    }
}
