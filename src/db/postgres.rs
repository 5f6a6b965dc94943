use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::db::{AccountStore, CatalogStore, RuleStore};
use crate::error::AppResult;
use crate::models::{Category, Item, SurveyProfile, SurveyRule};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Postgres-backed account profile store
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AccountStore for PgAccountStore {
    async fn get_profile(&self, username: &str) -> AppResult<Option<SurveyProfile>> {
        let profile = sqlx::query_as::<_, SurveyProfile>(
            r#"
            SELECT username, residence_env, care_period, pet_color_pref,
                   pet_size_pref, activity_time, diet_management
            FROM survey_profiles
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn save_profile(&self, profile: &SurveyProfile) -> AppResult<()> {
        // Explicit transaction: the commit below is the point after which a
        // refresh may safely re-read this profile.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO survey_profiles
                (username, residence_env, care_period, pet_color_pref,
                 pet_size_pref, activity_time, diet_management)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (username) DO UPDATE SET
                residence_env = EXCLUDED.residence_env,
                care_period = EXCLUDED.care_period,
                pet_color_pref = EXCLUDED.pet_color_pref,
                pet_size_pref = EXCLUDED.pet_size_pref,
                activity_time = EXCLUDED.activity_time,
                diet_management = EXCLUDED.diet_management
            "#,
        )
        .bind(&profile.username)
        .bind(&profile.residence_env)
        .bind(&profile.care_period)
        .bind(&profile.pet_color_pref)
        .bind(&profile.pet_size_pref)
        .bind(&profile.activity_time)
        .bind(&profile.diet_management)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(username = %profile.username, "Survey profile committed");

        Ok(())
    }
}

/// Postgres-backed catalog reference data
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ITEM_COLUMNS: &str =
    "item_id, product_id, category_id, name, description, list_price";

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn list_all_items(&self) -> AppResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY item_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn list_items_by_category(&self, category_id: &str) -> AppResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE category_id = $1 ORDER BY item_id"
        ))
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn get_item(&self, item_id: &str) -> AppResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE item_id = $1"
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn get_category(&self, category_id: &str) -> AppResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT category_id, name FROM categories WHERE category_id = $1",
        )
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }
}

/// Postgres-backed scoring rule store
#[derive(Clone)]
pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RuleStore for PgRuleStore {
    async fn list_rules(&self) -> AppResult<Vec<SurveyRule>> {
        // rule_id order is load-bearing: first-rule-wins tie-breaks depend
        // on it being stable across evaluations.
        let rules = sqlx::query_as::<_, SurveyRule>(
            r#"
            SELECT rule_id, residence_env, care_period, pet_color_pref,
                   pet_size_pref, activity_time, diet_management, recommended_items
            FROM survey_rules
            ORDER BY rule_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }
}
