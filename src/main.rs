use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use petmatch_api::config::Config;
use petmatch_api::db::{
    self, AccountStore, CatalogStore, MessageCache, PgAccountStore, PgCatalogStore, PgRuleStore,
    RedisMessageCache, RuleStore,
};
use petmatch_api::routes::{create_router, AppState};
use petmatch_api::services::browse::BrowseService;
use petmatch_api::services::compare::CompareService;
use petmatch_api::services::generator::OpenAiGenerator;
use petmatch_api::services::refresh::{BackgroundScheduler, RefreshService};
use petmatch_api::services::scoring::{MatchScorer, ScoringConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    sqlx::migrate!().run(&pool).await?;

    let redis_client = db::create_redis_client(&config.redis_url)?;

    let accounts: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(pool.clone()));
    let catalog: Arc<dyn CatalogStore> = Arc::new(PgCatalogStore::new(pool.clone()));
    let rules: Arc<dyn RuleStore> = Arc::new(PgRuleStore::new(pool));
    let cache: Arc<dyn MessageCache> = Arc::new(RedisMessageCache::new(redis_client));

    let scorer = Arc::new(MatchScorer::new(rules, ScoringConfig::default()));
    let generator = Arc::new(OpenAiGenerator::new(
        config.openai_api_key.clone(),
        config.openai_api_url.clone(),
        config.openai_model.clone(),
        Duration::from_secs(config.generation_timeout_secs),
    )?);

    let refresh = Arc::new(RefreshService::new(
        accounts.clone(),
        catalog.clone(),
        cache.clone(),
        scorer.clone(),
        generator,
    ));

    let state = Arc::new(AppState {
        accounts: accounts.clone(),
        browse: Arc::new(BrowseService::new(
            accounts.clone(),
            catalog.clone(),
            cache,
            scorer,
        )),
        compare: Arc::new(CompareService::new(accounts, catalog)),
        scheduler: Arc::new(BackgroundScheduler::new(refresh)),
    });

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
