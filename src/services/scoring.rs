use std::collections::BTreeSet;
use std::sync::Arc;

use crate::db::RuleStore;
use crate::models::{SurveyField, SurveyProfile, SurveyRule};

/// Per-slot match weights
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyWeights {
    pub residence_env: f64,
    pub pet_size_pref: f64,
    pub care_period: f64,
    pub diet_management: f64,
    pub activity_time: f64,
    pub pet_color_pref: f64,
}

impl SurveyWeights {
    pub fn weight(&self, field: SurveyField) -> f64 {
        match field {
            SurveyField::ResidenceEnv => self.residence_env,
            SurveyField::PetSizePref => self.pet_size_pref,
            SurveyField::CarePeriod => self.care_period,
            SurveyField::DietManagement => self.diet_management,
            SurveyField::ActivityTime => self.activity_time,
            SurveyField::PetColorPref => self.pet_color_pref,
        }
    }

    /// Maximum achievable score
    pub fn total(&self) -> f64 {
        SurveyField::ALL.iter().map(|field| self.weight(*field)).sum()
    }
}

impl Default for SurveyWeights {
    fn default() -> Self {
        Self {
            residence_env: 3.0,
            pet_size_pref: 2.5,
            care_period: 1.5,
            diet_management: 1.0,
            activity_time: 1.0,
            pet_color_pref: 1.0,
        }
    }
}

/// Immutable scoring configuration, injected at scorer construction
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub weights: SurveyWeights,
    /// A rule fires when its weighted score reaches this value
    pub threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: SurveyWeights::default(),
            threshold: 7.5,
        }
    }
}

/// Outcome of evaluating one (profile, item) pair
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchOutcome {
    pub recommended: bool,
    /// Slots that matched the winning rule (recommended case)
    pub matched: BTreeSet<SurveyField>,
    /// Slots that differ from the first endorsing rule (rejected case)
    pub mismatched: BTreeSet<SurveyField>,
}

impl MatchOutcome {
    fn not_recommended() -> Self {
        Self::default()
    }

    /// The slot set that should drive the explanation message
    pub fn explanation_fields(&self) -> &BTreeSet<SurveyField> {
        if self.recommended {
            &self.matched
        } else {
            &self.mismatched
        }
    }
}

const EXCLUDED_ITEM_PREFIXES: [&str; 2] = ["FI-FW-", "FI-SW-"];
const EXCLUDED_RESIDENCE: &str = "Dry environment";

/// Category exclusion: fish items are never recommended to dry households
fn is_vetoed(profile: &SurveyProfile, item_id: &str) -> bool {
    let dry = profile
        .answer(SurveyField::ResidenceEnv)
        .is_some_and(|env| env.trim() == EXCLUDED_RESIDENCE);

    dry && EXCLUDED_ITEM_PREFIXES
        .iter()
        .any(|prefix| item_id.starts_with(prefix))
}

/// Weighted rule-table scorer
///
/// Decides whether an item is recommended for a profile and which survey
/// slots support that decision. Evaluation is infallible: rule-data problems
/// degrade to "not matched" and are logged, never surfaced to the caller.
pub struct MatchScorer {
    rules: Arc<dyn RuleStore>,
    config: ScoringConfig,
}

impl MatchScorer {
    pub fn new(rules: Arc<dyn RuleStore>, config: ScoringConfig) -> Self {
        Self { rules, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Evaluates one item against the profile
    ///
    /// Rules are walked in store order (ascending rule id): the first firing
    /// rule that endorses the item decides a recommendation, and for rejected
    /// items the first endorsing rule (of any score) supplies the mismatch
    /// slots for the "why not" explanation.
    pub async fn evaluate(&self, profile: &SurveyProfile, item_id: &str) -> MatchOutcome {
        if item_id.trim().is_empty() || !profile.is_complete() {
            return MatchOutcome::not_recommended();
        }

        if is_vetoed(profile, item_id) {
            tracing::debug!(
                username = %profile.username,
                item_id = %item_id,
                "Item excluded for residence environment"
            );
            return MatchOutcome::not_recommended();
        }

        let rules = match self.rules.list_rules().await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!(error = %e, "Rule load failed, treating item as not matched");
                return MatchOutcome::not_recommended();
            }
        };

        // Parse each rule's endorsement payload once; a malformed payload
        // disqualifies that rule only.
        let rules: Vec<(SurveyRule, Option<Vec<String>>)> = rules
            .into_iter()
            .map(|rule| {
                let endorsed = match rule.endorsed_item_ids() {
                    Ok(ids) => Some(ids),
                    Err(e) => {
                        tracing::warn!(
                            rule_id = rule.rule_id,
                            error = %e,
                            "Skipping rule with malformed endorsement data"
                        );
                        None
                    }
                };
                (rule, endorsed)
            })
            .collect();

        for (rule, endorsed) in &rules {
            let Some(endorsed) = endorsed else { continue };

            let (score, matched) = self.score_rule(profile, rule);
            if score < self.config.threshold {
                continue;
            }

            if endorsed.iter().any(|id| id == item_id) {
                tracing::debug!(
                    username = %profile.username,
                    item_id = %item_id,
                    rule_id = rule.rule_id,
                    score = score,
                    "Item recommended"
                );
                return MatchOutcome {
                    recommended: true,
                    matched,
                    mismatched: BTreeSet::new(),
                };
            }
        }

        // Not recommended: explain using the first rule that endorses the
        // item at all, whatever it scored.
        let mismatched = rules
            .iter()
            .find(|(_, endorsed)| {
                endorsed
                    .as_ref()
                    .is_some_and(|ids| ids.iter().any(|id| id == item_id))
            })
            .map(|(rule, _)| self.mismatch_fields(profile, rule))
            .unwrap_or_default();

        MatchOutcome {
            recommended: false,
            matched: BTreeSet::new(),
            mismatched,
        }
    }

    /// Weighted score plus the matching slots for a single rule
    fn score_rule(
        &self,
        profile: &SurveyProfile,
        rule: &SurveyRule,
    ) -> (f64, BTreeSet<SurveyField>) {
        let mut score = 0.0;
        let mut matched = BTreeSet::new();

        for field in SurveyField::ALL {
            if let (Some(answer), Some(pattern)) = (profile.answer(field), rule.pattern(field)) {
                if answer.trim() == pattern.trim() {
                    score += self.config.weights.weight(field);
                    matched.insert(field);
                }
            }
        }

        (score, matched)
    }

    /// Slots where the profile disagrees with the rule (both sides present)
    fn mismatch_fields(&self, profile: &SurveyProfile, rule: &SurveyRule) -> BTreeSet<SurveyField> {
        SurveyField::ALL
            .iter()
            .copied()
            .filter(|field| {
                matches!(
                    (profile.answer(*field), rule.pattern(*field)),
                    (Some(answer), Some(pattern)) if answer.trim() != pattern.trim()
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockRuleStore;
    use crate::error::AppError;

    fn profile() -> SurveyProfile {
        SurveyProfile {
            username: "j2ee".to_string(),
            residence_env: Some("Apartment".to_string()),
            care_period: Some("Long".to_string()),
            pet_color_pref: Some("Any".to_string()),
            pet_size_pref: Some("Small".to_string()),
            activity_time: Some("Evening".to_string()),
            diet_management: Some("Normal".to_string()),
        }
    }

    fn matching_rule(rule_id: i64, item_ids: &[&str]) -> SurveyRule {
        let endorsed: Vec<String> = item_ids
            .iter()
            .map(|id| format!(r#"{{"itemId":"{}"}}"#, id))
            .collect();

        SurveyRule {
            rule_id,
            residence_env: Some("Apartment".to_string()),
            care_period: Some("Long".to_string()),
            pet_color_pref: Some("Any".to_string()),
            pet_size_pref: Some("Small".to_string()),
            activity_time: Some("Evening".to_string()),
            diet_management: Some("Normal".to_string()),
            recommended_items: Some(format!("[{}]", endorsed.join(","))),
        }
    }

    fn scorer_with(rules: Vec<SurveyRule>) -> MatchScorer {
        scorer_with_config(rules, ScoringConfig::default())
    }

    fn scorer_with_config(rules: Vec<SurveyRule>, config: ScoringConfig) -> MatchScorer {
        let mut store = MockRuleStore::new();
        store
            .expect_list_rules()
            .returning(move || Ok(rules.clone()));
        MatchScorer::new(Arc::new(store), config)
    }

    #[test]
    fn test_default_weights_total_ten() {
        assert_eq!(SurveyWeights::default().total(), 10.0);
    }

    #[test]
    fn test_full_match_scores_total_weight() {
        let scorer = scorer_with(vec![]);
        let rule = matching_rule(1, &["EST-1"]);

        let (score, matched) = scorer.score_rule(&profile(), &rule);
        assert_eq!(score, 10.0);
        assert_eq!(matched.len(), 6);
    }

    #[test]
    fn test_no_match_scores_zero() {
        let scorer = scorer_with(vec![]);
        let mut rule = matching_rule(1, &["EST-1"]);
        rule.residence_env = Some("Farm".to_string());
        rule.care_period = Some("Short".to_string());
        rule.pet_color_pref = Some("Golden".to_string());
        rule.pet_size_pref = Some("Large".to_string());
        rule.activity_time = Some("Morning".to_string());
        rule.diet_management = Some("Strict".to_string());

        let (score, matched) = scorer.score_rule(&profile(), &rule);
        assert_eq!(score, 0.0);
        assert!(matched.is_empty());
    }

    #[test]
    fn test_residence_and_size_score_below_threshold() {
        let scorer = scorer_with(vec![]);
        let rule = SurveyRule {
            rule_id: 1,
            residence_env: Some("Apartment".to_string()),
            pet_size_pref: Some("Small".to_string()),
            care_period: None,
            pet_color_pref: None,
            activity_time: None,
            diet_management: None,
            recommended_items: Some(r#"[{"itemId":"EST-1"}]"#.to_string()),
        };

        let (score, _) = scorer.score_rule(&profile(), &rule);
        assert_eq!(score, 5.5);
        assert!(score < scorer.config().threshold);
    }

    #[tokio::test]
    async fn test_firing_endorsing_rule_recommends() {
        let scorer = scorer_with(vec![matching_rule(1, &["EST-1", "EST-2"])]);

        let outcome = scorer.evaluate(&profile(), "EST-1").await;
        assert!(outcome.recommended);
        assert_eq!(outcome.matched.len(), 6);
        assert!(outcome.mismatched.is_empty());
    }

    #[tokio::test]
    async fn test_below_threshold_rule_does_not_fire() {
        let rule = SurveyRule {
            rule_id: 1,
            residence_env: Some("Apartment".to_string()),
            pet_size_pref: Some("Small".to_string()),
            care_period: None,
            pet_color_pref: None,
            activity_time: None,
            diet_management: None,
            recommended_items: Some(r#"[{"itemId":"EST-1"}]"#.to_string()),
        };
        let scorer = scorer_with(vec![rule]);

        let outcome = scorer.evaluate(&profile(), "EST-1").await;
        assert!(!outcome.recommended);
    }

    #[tokio::test]
    async fn test_firing_rule_without_endorsement_does_not_recommend() {
        let scorer = scorer_with(vec![matching_rule(1, &["EST-9"])]);

        let outcome = scorer.evaluate(&profile(), "EST-1").await;
        assert!(!outcome.recommended);
    }

    #[tokio::test]
    async fn test_first_firing_rule_wins() {
        let mut second = matching_rule(2, &["EST-1"]);
        second.pet_color_pref = Some("Golden".to_string());

        // Both rules fire and endorse EST-1; the first one in rule_id order
        // supplies the matched slots.
        let scorer = scorer_with(vec![matching_rule(1, &["EST-1"]), second]);

        let outcome = scorer.evaluate(&profile(), "EST-1").await;
        assert!(outcome.recommended);
        assert!(outcome.matched.contains(&SurveyField::PetColorPref));
    }

    #[tokio::test]
    async fn test_mismatch_slots_come_from_first_endorsing_rule() {
        let mut rule = matching_rule(1, &["EST-1"]);
        rule.residence_env = Some("Farm".to_string());
        rule.activity_time = Some("Morning".to_string());
        let scorer = scorer_with(vec![rule]);

        let outcome = scorer.evaluate(&profile(), "EST-1").await;
        assert!(!outcome.recommended);
        assert_eq!(
            outcome.mismatched,
            BTreeSet::from([SurveyField::ResidenceEnv, SurveyField::ActivityTime])
        );
    }

    #[tokio::test]
    async fn test_mismatch_ignores_unconstrained_slots() {
        let rule = SurveyRule {
            rule_id: 1,
            residence_env: Some("Farm".to_string()),
            care_period: None,
            pet_color_pref: None,
            pet_size_pref: None,
            activity_time: None,
            diet_management: None,
            recommended_items: Some(r#"[{"itemId":"EST-1"}]"#.to_string()),
        };
        let scorer = scorer_with(vec![rule]);

        let outcome = scorer.evaluate(&profile(), "EST-1").await;
        assert_eq!(outcome.mismatched, BTreeSet::from([SurveyField::ResidenceEnv]));
    }

    #[tokio::test]
    async fn test_incomplete_profile_never_scores() {
        let mut incomplete = profile();
        incomplete.diet_management = None;
        let scorer = scorer_with(vec![matching_rule(1, &["EST-1"])]);

        let outcome = scorer.evaluate(&incomplete, "EST-1").await;
        assert!(!outcome.recommended);
        assert!(outcome.matched.is_empty());
        assert!(outcome.mismatched.is_empty());
    }

    #[tokio::test]
    async fn test_fish_vetoed_for_dry_environment() {
        let mut dry = profile();
        dry.residence_env = Some("Dry environment".to_string());

        // A perfect-score rule endorsing the fish cannot override the veto.
        let mut rule = matching_rule(1, &["FI-FW-01"]);
        rule.residence_env = Some("Dry environment".to_string());
        let scorer = scorer_with(vec![rule]);

        let outcome = scorer.evaluate(&dry, "FI-FW-01").await;
        assert!(!outcome.recommended);
        assert!(outcome.matched.is_empty());
        assert!(outcome.mismatched.is_empty());
    }

    #[tokio::test]
    async fn test_saltwater_fish_vetoed_with_untrimmed_answer() {
        let mut dry = profile();
        dry.residence_env = Some("  Dry environment  ".to_string());
        let scorer = scorer_with(vec![]);

        let outcome = scorer.evaluate(&dry, "FI-SW-02").await;
        assert!(!outcome.recommended);
    }

    #[tokio::test]
    async fn test_non_fish_item_not_vetoed_for_dry_environment() {
        let mut dry = profile();
        dry.residence_env = Some("Dry environment".to_string());

        let mut rule = matching_rule(1, &["RP-SN-01"]);
        rule.residence_env = Some("Dry environment".to_string());
        let scorer = scorer_with(vec![rule]);

        let outcome = scorer.evaluate(&dry, "RP-SN-01").await;
        assert!(outcome.recommended);
    }

    #[tokio::test]
    async fn test_malformed_rule_skipped_evaluation_continues() {
        let mut broken = matching_rule(1, &[]);
        broken.recommended_items = Some("not json".to_string());

        let scorer = scorer_with(vec![broken, matching_rule(2, &["EST-1"])]);

        let outcome = scorer.evaluate(&profile(), "EST-1").await;
        assert!(outcome.recommended);
    }

    #[tokio::test]
    async fn test_rule_store_error_degrades_to_not_matched() {
        let mut store = MockRuleStore::new();
        store
            .expect_list_rules()
            .returning(|| Err(AppError::Internal("rules unavailable".to_string())));
        let scorer = MatchScorer::new(Arc::new(store), ScoringConfig::default());

        let outcome = scorer.evaluate(&profile(), "EST-1").await;
        assert_eq!(outcome, MatchOutcome::default());
    }

    #[tokio::test]
    async fn test_blank_item_id_short_circuits() {
        let scorer = scorer_with(vec![matching_rule(1, &["EST-1"])]);

        let outcome = scorer.evaluate(&profile(), "  ").await;
        assert_eq!(outcome, MatchOutcome::default());
    }

    #[tokio::test]
    async fn test_threshold_is_configurable() {
        let mut rule = matching_rule(1, &["EST-1"]);
        rule.pet_color_pref = Some("Golden".to_string());
        rule.activity_time = Some("Morning".to_string());
        rule.diet_management = Some("Strict".to_string());

        // residence + size + care = 7.0: fires at a 7.0 threshold only
        let strict = scorer_with(vec![rule.clone()]);
        let relaxed = scorer_with_config(
            vec![rule],
            ScoringConfig {
                weights: SurveyWeights::default(),
                threshold: 7.0,
            },
        );

        assert!(!strict.evaluate(&profile(), "EST-1").await.recommended);
        assert!(relaxed.evaluate(&profile(), "EST-1").await.recommended);
    }
}
