//! PostgreSQL storage over diesel.

mod analytics;
mod connection;
mod models;
mod schema;
mod state;

pub use analytics::PostgresAnalyticsStore;
pub use connection::{PgPool, connect, run_migrations};
pub use state::PostgresDependencyStateStore;
