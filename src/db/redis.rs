use std::collections::HashMap;

use redis::{AsyncCommands, Client};

use crate::db::MessageCache;
use crate::error::AppResult;
use crate::models::RecommendationMessage;

/// Creates a Redis client for the recommendation message cache
///
/// Uses connection pooling via the connection-manager feature.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Hash key holding all cached entries for one user
///
/// One hash per user keeps the per-user operations single round trips:
/// invalidation is a DEL, the full fan-out read a HGETALL.
fn user_key(username: &str) -> String {
    format!("recs:{}", username)
}

/// Redis-backed recommendation message cache
///
/// Entries are serialized as JSON hash values, field = item id.
#[derive(Clone)]
pub struct RedisMessageCache {
    redis_client: Client,
}

impl RedisMessageCache {
    pub fn new(redis_client: Client) -> Self {
        Self { redis_client }
    }

    fn decode(&self, raw: &str) -> Option<RecommendationMessage> {
        match serde_json::from_str(raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                // Tolerate entries written by an older format: skip, don't fail
                tracing::warn!(error = %e, "Skipping undecodable cache entry");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl MessageCache for RedisMessageCache {
    async fn invalidate_user(&self, username: &str) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(user_key(username)).await?;

        tracing::debug!(username = %username, "Invalidated cached recommendations");

        Ok(())
    }

    async fn upsert(&self, entry: &RecommendationMessage) -> AppResult<()> {
        let json = serde_json::to_string(entry).map_err(|e| {
            crate::error::AppError::Internal(format!("Cache serialization error: {}", e))
        })?;

        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn
            .hset(user_key(&entry.username), &entry.item_id, json)
            .await?;

        Ok(())
    }

    async fn get_all(&self, username: &str) -> AppResult<HashMap<String, RecommendationMessage>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let raw: HashMap<String, String> = conn.hgetall(user_key(username)).await?;

        let entries = raw
            .into_iter()
            .filter_map(|(item_id, json)| self.decode(&json).map(|entry| (item_id, entry)))
            .collect();

        Ok(entries)
    }

    async fn get(&self, username: &str, item_id: &str) -> AppResult<Option<RecommendationMessage>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.hget(user_key(username), item_id).await?;

        Ok(raw.and_then(|json| self.decode(&json)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_user_key_layout() {
        assert_eq!(user_key("j2ee"), "recs:j2ee");
        assert_eq!(user_key("ACID"), "recs:ACID");
    }

    #[test]
    fn test_decode_valid_entry() {
        let cache = RedisMessageCache::new(Client::open("redis://127.0.0.1").unwrap());
        let entry = RecommendationMessage {
            username: "j2ee".to_string(),
            item_id: "EST-1".to_string(),
            recommended: false,
            message: "May not suit your home.".to_string(),
            last_updated: Utc::now(),
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(cache.decode(&json), Some(entry));
    }

    #[test]
    fn test_decode_skips_garbage() {
        let cache = RedisMessageCache::new(Client::open("redis://127.0.0.1").unwrap());
        assert_eq!(cache.decode("{not json"), None);
    }
}
