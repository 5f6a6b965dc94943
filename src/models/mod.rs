use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The six survey answer slots, in scoring order.
///
/// Profiles and rules both expose their values through this enum so the
/// scorer can iterate slots instead of special-casing each field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SurveyField {
    ResidenceEnv,
    PetSizePref,
    CarePeriod,
    DietManagement,
    ActivityTime,
    PetColorPref,
}

impl SurveyField {
    pub const ALL: [SurveyField; 6] = [
        SurveyField::ResidenceEnv,
        SurveyField::PetSizePref,
        SurveyField::CarePeriod,
        SurveyField::DietManagement,
        SurveyField::ActivityTime,
        SurveyField::PetColorPref,
    ];

    /// Human-readable label used in generation prompts
    pub fn label(&self) -> &'static str {
        match self {
            SurveyField::ResidenceEnv => "Living Environment",
            SurveyField::PetSizePref => "Pet Size Preference",
            SurveyField::CarePeriod => "Pet Care Period",
            SurveyField::DietManagement => "Diet Management",
            SurveyField::ActivityTime => "Activity Time",
            SurveyField::PetColorPref => "Pet Color Preference",
        }
    }
}

/// A user's six-answer preference survey
///
/// All answers are optional short category strings; a profile only drives
/// scoring and cache refreshes once every answer is filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SurveyProfile {
    pub username: String,
    pub residence_env: Option<String>,
    pub care_period: Option<String>,
    pub pet_color_pref: Option<String>,
    pub pet_size_pref: Option<String>,
    pub activity_time: Option<String>,
    pub diet_management: Option<String>,
}

impl SurveyProfile {
    /// The answer stored in the given slot
    pub fn answer(&self, field: SurveyField) -> Option<&str> {
        let value = match field {
            SurveyField::ResidenceEnv => &self.residence_env,
            SurveyField::PetSizePref => &self.pet_size_pref,
            SurveyField::CarePeriod => &self.care_period,
            SurveyField::DietManagement => &self.diet_management,
            SurveyField::ActivityTime => &self.activity_time,
            SurveyField::PetColorPref => &self.pet_color_pref,
        };
        value.as_deref()
    }

    /// Whether the survey has been completed
    ///
    /// True iff all six answers are present and non-empty after trimming.
    pub fn is_complete(&self) -> bool {
        SurveyField::ALL
            .iter()
            .all(|field| self.answer(*field).is_some_and(|v| !v.trim().is_empty()))
    }
}

/// A catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub item_id: String,
    pub product_id: String,
    pub category_id: String,
    pub name: String,
    pub description: Option<String>,
    pub list_price: Option<f64>,
}

/// A catalog category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub category_id: String,
    pub name: String,
}

/// A reference scoring rule
///
/// Carries the same six slots as a profile (each optionally constrained) and
/// a JSON array of endorsed items. Rules are read-only reference data,
/// evaluated in ascending `rule_id` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SurveyRule {
    pub rule_id: i64,
    pub residence_env: Option<String>,
    pub care_period: Option<String>,
    pub pet_color_pref: Option<String>,
    pub pet_size_pref: Option<String>,
    pub activity_time: Option<String>,
    pub diet_management: Option<String>,
    /// JSON array of `{"itemId": "...", "name": "..."}` objects
    pub recommended_items: Option<String>,
}

/// One entry of a rule's endorsed item list
#[derive(Debug, Clone, Deserialize)]
pub struct EndorsedItem {
    #[serde(rename = "itemId")]
    pub item_id: String,
}

impl SurveyRule {
    /// The pattern value stored in the given slot
    pub fn pattern(&self, field: SurveyField) -> Option<&str> {
        let value = match field {
            SurveyField::ResidenceEnv => &self.residence_env,
            SurveyField::PetSizePref => &self.pet_size_pref,
            SurveyField::CarePeriod => &self.care_period,
            SurveyField::DietManagement => &self.diet_management,
            SurveyField::ActivityTime => &self.activity_time,
            SurveyField::PetColorPref => &self.pet_color_pref,
        };
        value.as_deref()
    }

    /// Parses the endorsed item ids out of the JSON payload
    ///
    /// Missing payload parses as an empty list; malformed payload is an error
    /// the caller decides how to tolerate.
    pub fn endorsed_item_ids(&self) -> Result<Vec<String>, serde_json::Error> {
        match self.recommended_items.as_deref() {
            Some(json) => {
                let items: Vec<EndorsedItem> = serde_json::from_str(json)?;
                Ok(items.into_iter().map(|item| item.item_id).collect())
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Cached recommendation decision and explanation for one (user, item) pair
///
/// Written only by the refresh pipeline, always decision and message
/// together; read (never mutated) by the browse path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationMessage {
    pub username: String,
    pub item_id: String,
    pub recommended: bool,
    pub message: String,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_profile() -> SurveyProfile {
        SurveyProfile {
            username: "j2ee".to_string(),
            residence_env: Some("Dry environment".to_string()),
            care_period: Some("Short".to_string()),
            pet_color_pref: Some("Any".to_string()),
            pet_size_pref: Some("Small".to_string()),
            activity_time: Some("Low".to_string()),
            diet_management: Some("Low".to_string()),
        }
    }

    #[test]
    fn test_complete_profile() {
        assert!(complete_profile().is_complete());
    }

    #[test]
    fn test_incomplete_when_any_answer_missing() {
        for field in SurveyField::ALL {
            let mut profile = complete_profile();
            match field {
                SurveyField::ResidenceEnv => profile.residence_env = None,
                SurveyField::PetSizePref => profile.pet_size_pref = None,
                SurveyField::CarePeriod => profile.care_period = None,
                SurveyField::DietManagement => profile.diet_management = None,
                SurveyField::ActivityTime => profile.activity_time = None,
                SurveyField::PetColorPref => profile.pet_color_pref = None,
            }
            assert!(!profile.is_complete(), "{:?} missing should be incomplete", field);
        }
    }

    #[test]
    fn test_incomplete_when_answer_blank() {
        let mut profile = complete_profile();
        profile.activity_time = Some("   ".to_string());
        assert!(!profile.is_complete());
    }

    #[test]
    fn test_answer_maps_slots() {
        let profile = complete_profile();
        assert_eq!(profile.answer(SurveyField::ResidenceEnv), Some("Dry environment"));
        assert_eq!(profile.answer(SurveyField::PetSizePref), Some("Small"));
        assert_eq!(profile.answer(SurveyField::PetColorPref), Some("Any"));
    }

    #[test]
    fn test_endorsed_item_ids_parses_payload() {
        let rule = SurveyRule {
            rule_id: 1,
            residence_env: None,
            care_period: None,
            pet_color_pref: None,
            pet_size_pref: None,
            activity_time: None,
            diet_management: None,
            recommended_items: Some(
                r#"[{"itemId":"FI-FW-01","name":"Koi"},{"itemId":"FI-FW-02","name":"Goldfish"}]"#
                    .to_string(),
            ),
        };

        let ids = rule.endorsed_item_ids().unwrap();
        assert_eq!(ids, vec!["FI-FW-01".to_string(), "FI-FW-02".to_string()]);
    }

    #[test]
    fn test_endorsed_item_ids_empty_when_absent() {
        let rule = SurveyRule {
            rule_id: 1,
            residence_env: None,
            care_period: None,
            pet_color_pref: None,
            pet_size_pref: None,
            activity_time: None,
            diet_management: None,
            recommended_items: None,
        };

        assert!(rule.endorsed_item_ids().unwrap().is_empty());
    }

    #[test]
    fn test_endorsed_item_ids_malformed_payload() {
        let rule = SurveyRule {
            rule_id: 1,
            residence_env: None,
            care_period: None,
            pet_color_pref: None,
            pet_size_pref: None,
            activity_time: None,
            diet_management: None,
            recommended_items: Some("not json".to_string()),
        };

        assert!(rule.endorsed_item_ids().is_err());
    }

    #[test]
    fn test_recommendation_message_serde_round_trip() {
        let entry = RecommendationMessage {
            username: "j2ee".to_string(),
            item_id: "EST-1".to_string(),
            recommended: true,
            message: "A great match for your home.".to_string(),
            last_updated: Utc::now(),
        };

        let json = serde_json::to_string(&entry).unwrap();
        let back: RecommendationMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
