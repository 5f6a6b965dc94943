use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::{AccountStore, CatalogStore, MessageCache};
use crate::error::{AppError, AppResult};
use crate::models::{Item, RecommendationMessage, SurveyProfile};
use crate::services::scoring::MatchScorer;

/// Read-only view of one catalog item for one viewer
///
/// Assembled per request; `recommended`/`message` stay `None` for anonymous
/// viewers and viewers with incomplete surveys. A cache miss for a complete
/// survey yields a live decision with no message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRecommendation {
    pub item: Item,
    pub recommended: Option<bool>,
    pub message: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ItemRecommendation {
    fn anonymous(item: Item) -> Self {
        Self {
            item,
            recommended: None,
            message: None,
            last_updated: None,
        }
    }

    fn from_cache(item: Item, entry: RecommendationMessage) -> Self {
        Self {
            item,
            recommended: Some(entry.recommended),
            message: Some(entry.message),
            last_updated: Some(entry.last_updated),
        }
    }

    fn live(item: Item, recommended: bool) -> Self {
        Self {
            item,
            recommended: Some(recommended),
            message: None,
            last_updated: None,
        }
    }
}

/// Cache-backed catalog browsing
///
/// Serves decisions and messages from the cache; on a miss the decision is
/// recomputed synchronously but the text generator is never called here —
/// freshening messages is the refresh pipeline's job.
pub struct BrowseService {
    accounts: Arc<dyn AccountStore>,
    catalog: Arc<dyn CatalogStore>,
    cache: Arc<dyn MessageCache>,
    scorer: Arc<MatchScorer>,
}

impl BrowseService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        catalog: Arc<dyn CatalogStore>,
        cache: Arc<dyn MessageCache>,
        scorer: Arc<MatchScorer>,
    ) -> Self {
        Self {
            accounts,
            catalog,
            cache,
            scorer,
        }
    }

    /// The viewer's profile, when one exists with a completed survey
    async fn viewer_profile(&self, username: Option<&str>) -> AppResult<Option<SurveyProfile>> {
        let Some(username) = username.filter(|name| !name.trim().is_empty()) else {
            return Ok(None);
        };

        let profile = self.accounts.get_profile(username).await?;
        Ok(profile.filter(SurveyProfile::is_complete))
    }

    /// Category listing with per-item recommendation views
    pub async fn category_view(
        &self,
        username: Option<&str>,
        category_id: &str,
    ) -> AppResult<Vec<ItemRecommendation>> {
        if self.catalog.get_category(category_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Category {} not found",
                category_id
            )));
        }

        let items = self.catalog.list_items_by_category(category_id).await?;

        let Some(profile) = self.viewer_profile(username).await? else {
            return Ok(items.into_iter().map(ItemRecommendation::anonymous).collect());
        };

        // One bulk cache read covers the whole listing.
        let mut cached = self.cache.get_all(&profile.username).await?;

        let mut views = Vec::with_capacity(items.len());
        for item in items {
            let view = match cached.remove(&item.item_id) {
                Some(entry) => ItemRecommendation::from_cache(item, entry),
                None => {
                    let outcome = self.scorer.evaluate(&profile, &item.item_id).await;
                    ItemRecommendation::live(item, outcome.recommended)
                }
            };
            views.push(view);
        }

        tracing::debug!(
            category_id = %category_id,
            item_count = views.len(),
            "Category view assembled"
        );

        Ok(views)
    }

    /// Single-item view
    pub async fn item_view(
        &self,
        username: Option<&str>,
        item_id: &str,
    ) -> AppResult<ItemRecommendation> {
        let item = self
            .catalog
            .get_item(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item_id)))?;

        let Some(profile) = self.viewer_profile(username).await? else {
            return Ok(ItemRecommendation::anonymous(item));
        };

        match self.cache.get(&profile.username, item_id).await? {
            Some(entry) => Ok(ItemRecommendation::from_cache(item, entry)),
            None => {
                let outcome = self.scorer.evaluate(&profile, item_id).await;
                Ok(ItemRecommendation::live(item, outcome.recommended))
            }
        }
    }
}
