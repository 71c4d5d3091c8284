//! Builds the orchestrator from configuration and credentials.

use herald_bot::{Credentials, HeraldConfig, HeraldMetrics, Orchestrator};
use herald_error::{ConfigError, HeraldResult};
use herald_interface::{AnalyticsStore, DependencyStateStore, SocialPlatform};
use herald_models::{GrokClient, ModalImageClient, SerpApiTrends};
use herald_social::{DryRunPlatform, X_MAX_TEXT_LENGTH, XClient};
use std::sync::Arc;
use tracing::{info, warn};

/// Analytics and dependency-state storage.
pub struct Stores {
    pub analytics: Arc<dyn AnalyticsStore>,
    pub states: Arc<dyn DependencyStateStore>,
}

/// Open PostgreSQL stores when a URL is configured and the `postgres`
/// feature is built in; otherwise keep everything in memory.
pub fn open_stores(config: &HeraldConfig, credentials: &Credentials) -> HeraldResult<Stores> {
    let url = credentials
        .database_url()
        .clone()
        .or_else(|| config.database().url().clone());

    #[cfg(feature = "postgres")]
    {
        use herald_database::{
            PostgresAnalyticsStore, PostgresDependencyStateStore, connect, run_migrations,
        };

        if let Some(url) = url {
            let pool = connect(&url, *config.database().pool_size())?;
            run_migrations(&pool)?;
            info!("Using PostgreSQL storage");
            return Ok(Stores {
                analytics: Arc::new(PostgresAnalyticsStore::new(pool.clone())),
                states: Arc::new(PostgresDependencyStateStore::new(pool)),
            });
        }
    }

    #[cfg(not(feature = "postgres"))]
    {
        if url.is_some() {
            warn!("A database URL is set but herald was built without the postgres feature");
        }
    }

    info!("Using in-memory storage; state is lost on exit");
    Ok(Stores {
        analytics: Arc::new(herald_database::InMemoryAnalyticsStore::new()),
        states: Arc::new(herald_database::InMemoryDependencyStateStore::new()),
    })
}

fn require(value: &Option<String>, name: &str) -> HeraldResult<String> {
    value
        .clone()
        .ok_or_else(|| ConfigError::new(format!("{name} is not set")).into())
}

/// Wire the real clients into an orchestrator.
///
/// With `dry_run` the platform only logs what it would post.
pub fn build_orchestrator(
    config: &HeraldConfig,
    credentials: &Credentials,
    stores: &Stores,
    metrics: HeraldMetrics,
    dry_run: bool,
) -> HeraldResult<Orchestrator> {
    let missing = credentials.missing(config, dry_run);
    if !missing.is_empty() {
        return Err(ConfigError::new(missing.join("; ")).into());
    }
    for warning in config.validate() {
        warn!(%warning, "Configuration warning");
    }

    let generator = GrokClient::new(require(credentials.grok_api_key(), "GROK_API_KEY")?)
        .with_model(config.content().model().clone());

    let platform: Arc<dyn SocialPlatform> = if dry_run {
        info!("Dry run: posts are logged, not published");
        Arc::new(DryRunPlatform::new(X_MAX_TEXT_LENGTH))
    } else {
        let token = require(credentials.x_user_access_token(), "X_USER_ACCESS_TOKEN")?;
        Arc::new(XClient::new(token))
    };

    let mut builder = Orchestrator::builder()
        .config(config.clone())
        .generator(Arc::new(generator))
        .platform(platform)
        .analytics(Arc::clone(&stores.analytics))
        .state_store(Arc::clone(&stores.states))
        .metrics(metrics);

    if *config.image().enabled() {
        let endpoint = config
            .image()
            .endpoint()
            .clone()
            .ok_or_else(|| ConfigError::new("image.enabled is set but image.endpoint is missing"))?;
        let key = require(credentials.modal_api_key(), "MODAL_API_KEY")?;
        builder = builder.image_generator(Arc::new(ModalImageClient::new(key, endpoint)));
    }

    if *config.trends().enabled() {
        let key = require(credentials.serpapi_api_key(), "SERPAPI_API_KEY")?;
        let trends = SerpApiTrends::new(key, config.content().fallback_topics().clone());
        builder = builder.trend_source(Arc::new(trends));
    }

    builder.build()
}
