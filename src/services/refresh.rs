use std::sync::Arc;

use chrono::Utc;

use crate::db::{AccountStore, CatalogStore, MessageCache};
use crate::error::AppResult;
use crate::models::{Item, RecommendationMessage, SurveyProfile};
use crate::services::generator::MessageGenerator;
use crate::services::scoring::MatchScorer;

/// How a refresh cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    /// Item loop ran to the end (individual items may still have failed)
    Completed,
    /// Survey incomplete: cache invalidated and left empty
    SkippedIncompleteSurvey,
    /// Blank username or no stored profile: nothing touched
    NoProfile,
}

/// Batch outcome of one refresh cycle
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    pub status: RefreshStatus,
    pub succeeded: usize,
    /// Item ids left unwritten this cycle
    pub failed: Vec<String>,
}

impl RefreshOutcome {
    fn empty(status: RefreshStatus) -> Self {
        Self {
            status,
            succeeded: 0,
            failed: Vec::new(),
        }
    }
}

/// Invalidate-then-regenerate pipeline for one user's message cache
///
/// Runs after a profile write has committed and re-reads the profile from
/// the durable store, so a rolled-back value is never cached. Invalidation
/// always precedes the first upsert of a cycle: a concurrent reader sees a
/// transient gap at worst, never entries from two profile versions.
pub struct RefreshService {
    accounts: Arc<dyn AccountStore>,
    catalog: Arc<dyn CatalogStore>,
    cache: Arc<dyn MessageCache>,
    scorer: Arc<MatchScorer>,
    generator: Arc<dyn MessageGenerator>,
}

impl RefreshService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        catalog: Arc<dyn CatalogStore>,
        cache: Arc<dyn MessageCache>,
        scorer: Arc<MatchScorer>,
        generator: Arc<dyn MessageGenerator>,
    ) -> Self {
        Self {
            accounts,
            catalog,
            cache,
            scorer,
            generator,
        }
    }

    /// One full refresh cycle for the user
    ///
    /// A generator or cache failure for a single item leaves that item
    /// unwritten and the loop moves on; a later cycle will retry it.
    pub async fn refresh_user(&self, username: &str) -> AppResult<RefreshOutcome> {
        if username.trim().is_empty() {
            tracing::warn!("Refresh requested without a username");
            return Ok(RefreshOutcome::empty(RefreshStatus::NoProfile));
        }

        let Some(profile) = self.accounts.get_profile(username).await? else {
            tracing::warn!(username = %username, "No stored profile, skipping refresh");
            return Ok(RefreshOutcome::empty(RefreshStatus::NoProfile));
        };

        self.cache.invalidate_user(username).await?;

        if !profile.is_complete() {
            tracing::info!(
                username = %username,
                "Survey incomplete, leaving recommendations empty"
            );
            return Ok(RefreshOutcome::empty(RefreshStatus::SkippedIncompleteSurvey));
        }

        let items = self.catalog.list_all_items().await?;
        tracing::info!(
            username = %username,
            item_count = items.len(),
            "Regenerating recommendation messages"
        );

        let mut succeeded = 0;
        let mut failed = Vec::new();

        for item in &items {
            match self.refresh_item(&profile, item).await {
                Ok(()) => {
                    succeeded += 1;
                    if succeeded % 10 == 0 {
                        tracing::debug!(
                            username = %username,
                            processed = succeeded,
                            total = items.len(),
                            "Refresh progress"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        username = %username,
                        item_id = %item.item_id,
                        error = %e,
                        "Item left unwritten after refresh failure"
                    );
                    failed.push(item.item_id.clone());
                }
            }
        }

        tracing::info!(
            username = %username,
            succeeded = succeeded,
            failed = failed.len(),
            "Recommendation refresh complete"
        );

        Ok(RefreshOutcome {
            status: RefreshStatus::Completed,
            succeeded,
            failed,
        })
    }

    async fn refresh_item(&self, profile: &SurveyProfile, item: &Item) -> AppResult<()> {
        let outcome = self.scorer.evaluate(profile, &item.item_id).await;

        let message = self
            .generator
            .generate(profile, item, outcome.recommended, outcome.explanation_fields())
            .await?;

        self.cache
            .upsert(&RecommendationMessage {
                username: profile.username.clone(),
                item_id: item.item_id.clone(),
                recommended: outcome.recommended,
                message,
                last_updated: Utc::now(),
            })
            .await
    }
}

/// Post-commit refresh trigger
///
/// Callers schedule strictly after the triggering profile write has been
/// committed; the refresh then re-reads the committed profile itself.
#[async_trait::async_trait]
pub trait RefreshScheduler: Send + Sync {
    async fn schedule(&self, username: &str);
}

/// Runs refreshes as background tasks; scheduling returns immediately
pub struct BackgroundScheduler {
    refresh: Arc<RefreshService>,
}

impl BackgroundScheduler {
    pub fn new(refresh: Arc<RefreshService>) -> Self {
        Self { refresh }
    }
}

#[async_trait::async_trait]
impl RefreshScheduler for BackgroundScheduler {
    async fn schedule(&self, username: &str) {
        let refresh = self.refresh.clone();
        let username = username.to_string();

        tokio::spawn(async move {
            if let Err(e) = refresh.refresh_user(&username).await {
                tracing::error!(username = %username, error = %e, "Background refresh failed");
            }
        });
    }
}

/// Runs refreshes inline, completing before control returns
///
/// For flows that need the cache populated before responding, and for tests.
pub struct BlockingScheduler {
    refresh: Arc<RefreshService>,
}

impl BlockingScheduler {
    pub fn new(refresh: Arc<RefreshService>) -> Self {
        Self { refresh }
    }
}

#[async_trait::async_trait]
impl RefreshScheduler for BlockingScheduler {
    async fn schedule(&self, username: &str) {
        if let Err(e) = self.refresh.refresh_user(username).await {
            tracing::error!(username = %username, error = %e, "Inline refresh failed");
        }
    }
}
