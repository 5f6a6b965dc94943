use std::collections::HashMap;

use crate::error::AppResult;
use crate::models::{Category, Item, RecommendationMessage, SurveyProfile, SurveyRule};

pub mod postgres;
pub mod redis;

pub use postgres::{create_pool, PgAccountStore, PgCatalogStore, PgRuleStore};
pub use self::redis::{create_redis_client, RedisMessageCache};

/// Account profile storage
///
/// `save_profile` only returns once the write is durably committed, so
/// callers may schedule follow-up work (cache refreshes) that re-reads the
/// profile without ever observing a rolled-back value.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_profile(&self, username: &str) -> AppResult<Option<SurveyProfile>>;
    async fn save_profile(&self, profile: &SurveyProfile) -> AppResult<()>;
}

/// Read-only catalog reference data
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_all_items(&self) -> AppResult<Vec<Item>>;
    async fn list_items_by_category(&self, category_id: &str) -> AppResult<Vec<Item>>;
    async fn get_item(&self, item_id: &str) -> AppResult<Option<Item>>;
    async fn get_category(&self, category_id: &str) -> AppResult<Option<Category>>;
}

/// Read-only scoring rule reference data
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RuleStore: Send + Sync {
    /// All rules, in ascending `rule_id` order.
    ///
    /// The order is part of the contract: the first firing rule decides a
    /// recommendation and the first endorsing rule decides the mismatch set.
    async fn list_rules(&self) -> AppResult<Vec<SurveyRule>>;
}

/// Per-user recommendation message cache
///
/// Keyed by (username, item_id). Decision and message are a single value and
/// are always written together.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MessageCache: Send + Sync {
    /// Deletes every entry for the user. Idempotent.
    async fn invalidate_user(&self, username: &str) -> AppResult<()>;

    /// Writes or overwrites a single entry
    async fn upsert(&self, entry: &RecommendationMessage) -> AppResult<()>;

    /// All entries for the user, keyed by item id; empty map if none
    async fn get_all(&self, username: &str) -> AppResult<HashMap<String, RecommendationMessage>>;

    /// Point lookup for one (user, item) pair
    async fn get(&self, username: &str, item_id: &str) -> AppResult<Option<RecommendationMessage>>;
}
