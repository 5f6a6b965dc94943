use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;

use crate::db::{AccountStore, CatalogStore};
use crate::error::{AppError, AppResult};
use crate::models::{Item, SurveyField, SurveyProfile};

/// Side-by-side comparison of two items for one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareResult {
    pub first: Item,
    pub second: Item,
    pub feedback: String,
}

/// Rule-based two-item comparison
///
/// Produces a deterministic feedback paragraph from the viewer's profile
/// summary, a list-price comparison and an activity-time care hint. No
/// external calls.
pub struct CompareService {
    accounts: Arc<dyn AccountStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl CompareService {
    pub fn new(accounts: Arc<dyn AccountStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { accounts, catalog }
    }

    pub async fn compare(
        &self,
        username: &str,
        first_id: &str,
        second_id: &str,
    ) -> AppResult<CompareResult> {
        let profile = self
            .accounts
            .get_profile(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", username)))?;

        let first = self.fetch_item(first_id).await?;
        let second = self.fetch_item(second_id).await?;

        let feedback = build_feedback(&profile, &first, &second);

        Ok(CompareResult {
            first,
            second,
            feedback,
        })
    }

    async fn fetch_item(&self, item_id: &str) -> AppResult<Item> {
        self.catalog
            .get_item(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item_id)))
    }
}

fn build_feedback(profile: &SurveyProfile, first: &Item, second: &Item) -> String {
    let mut feedback = String::from("Based on your living environment");
    if let Some(env) = answered(profile, SurveyField::ResidenceEnv) {
        feedback.push_str(&format!(" ({})", env));
    }
    feedback.push_str(", preferred pet size");
    if let Some(size) = answered(profile, SurveyField::PetSizePref) {
        feedback.push_str(&format!(" ({})", size));
    }
    feedback.push_str(", and activity time");
    if let Some(activity) = answered(profile, SurveyField::ActivityTime) {
        feedback.push_str(&format!(" ({})", activity));
    }
    feedback.push_str(", we compared the two items you selected. ");

    if let (Some(first_price), Some(second_price)) = (first.list_price, second.list_price) {
        match first_price.partial_cmp(&second_price) {
            Some(Ordering::Less) => feedback.push_str(&format!(
                "Item {} is more budget-friendly, while item {} is relatively more premium. ",
                first.item_id, second.item_id
            )),
            Some(Ordering::Greater) => feedback.push_str(&format!(
                "Item {} is more budget-friendly, while item {} is relatively more premium. ",
                second.item_id, first.item_id
            )),
            _ => feedback.push_str("Both items are in a similar price range. "),
        }
    }

    if let Some(activity) = profile.answer(SurveyField::ActivityTime) {
        let lower = activity.to_lowercase();
        if lower.contains("high") || lower.contains("long") {
            feedback.push_str(
                "Since your pet tends to be active, products with better durability and strong support are recommended. ",
            );
        } else if lower.contains("low") || lower.contains("short") {
            feedback.push_str(
                "Since your pet is relatively less active, comfort and stability may be more important than durability. ",
            );
        }
    }

    feedback.push_str(
        "Overall, please choose the item that best matches your budget and daily lifestyle with your pet.",
    );

    feedback
}

fn answered(profile: &SurveyProfile, field: SurveyField) -> Option<&str> {
    profile
        .answer(field)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
