//! PostgreSQL dependency-state store with optimistic concurrency.

use super::connection::{PgPool, with_conn};
use super::models::DependencyStateRow;
use super::schema::dependency_states;
use async_trait::async_trait;
use diesel::prelude::*;
use herald_core::Dependency;
use herald_error::DatabaseResult;
use herald_interface::DependencyStateStore;
use herald_rate_limit::DependencyState;
use tracing::{debug, instrument};

/// Dependency state shared by every worker pointed at the same database.
///
/// Writes only succeed when the stored `version` still matches the version
/// the caller read, so two workers never spend the same budget slot.
#[derive(Debug, Clone)]
pub struct PostgresDependencyStateStore {
    pool: PgPool,
}

impl PostgresDependencyStateStore {
    /// Wrap a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyStateStore for PostgresDependencyStateStore {
    async fn load(&self, dependency: Dependency) -> DatabaseResult<Option<DependencyState>> {
        with_conn(&self.pool, move |conn| {
            dependency_states::table
                .find(dependency.to_string())
                .select(DependencyStateRow::as_select())
                .first(conn)
                .optional()?
                .map(DependencyState::try_from)
                .transpose()
        })
        .await
    }

    #[instrument(skip(self, state), fields(dependency = %state.dependency(), version = state.version()))]
    async fn compare_and_swap(
        &self,
        state: &DependencyState,
    ) -> DatabaseResult<Option<DependencyState>> {
        let expected = *state.version();
        let next = expected + 1;
        let row = DependencyStateRow::from_state(state, next)?;
        let expected_column = row.version - 1;
        let written = state.clone().with_version(next);

        let updated = with_conn(&self.pool, move |conn| {
            let affected = if expected == 0 {
                diesel::insert_into(dependency_states::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(conn)?
            } else {
                diesel::update(
                    dependency_states::table
                        .filter(dependency_states::dependency.eq(&row.dependency))
                        .filter(dependency_states::version.eq(expected_column)),
                )
                .set(&row)
                .execute(conn)?
            };
            Ok(affected == 1)
        })
        .await?;

        if updated {
            Ok(Some(written))
        } else {
            debug!("Version conflict");
            Ok(None)
        }
    }

    async fn load_all(&self) -> DatabaseResult<Vec<DependencyState>> {
        with_conn(&self.pool, move |conn| {
            dependency_states::table
                .order(dependency_states::dependency.asc())
                .select(DependencyStateRow::as_select())
                .load(conn)?
                .into_iter()
                .map(DependencyState::try_from)
                .collect()
        })
        .await
    }
}
