use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{Item, SurveyField, SurveyProfile};

const MAX_COMPLETION_TOKENS: u32 = 200;
const TEMPERATURE: f64 = 0.7;

/// External text-generation collaborator
///
/// Phrases the explanation for one (profile, item, decision) triple. Callers
/// own failure handling; a failed call is never retried here.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(
        &self,
        profile: &SurveyProfile,
        item: &Item,
        recommended: bool,
        fields: &BTreeSet<SurveyField>,
    ) -> AppResult<String>;
}

// Chat completions wire types

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Chat-completions client for recommendation messages
///
/// The HTTP client carries a per-call timeout so one hung generation cannot
/// stall an entire refresh cycle.
#[derive(Clone)]
pub struct OpenAiGenerator {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(
        api_key: String,
        api_url: String,
        model: String,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url,
            model,
        })
    }

    /// Builds the generation prompt
    ///
    /// Recommended items mention only the matching preferences; rejected
    /// items explain the mismatching ones. The item description is stripped
    /// of markup before it reaches the prompt.
    fn build_prompt(
        profile: &SurveyProfile,
        item: &Item,
        recommended: bool,
        fields: &BTreeSet<SurveyField>,
    ) -> String {
        let mut prompt = String::from(
            "You are a pet recommendation assistant. Generate a brief, friendly message explaining ",
        );

        let answered: Vec<(SurveyField, &str)> = fields
            .iter()
            .filter_map(|field| profile.answer(*field).map(|answer| (*field, answer)))
            .collect();

        if recommended {
            prompt.push_str(
                "why this pet is recommended for the user based on their MATCHING preferences.\n\n",
            );
            prompt.push_str("Matching User Preferences (ONLY mention these in your message):\n");
            for (field, answer) in &answered {
                prompt.push_str(&format!("  - {}: {}\n", field.label(), answer));
            }
            if answered.is_empty() {
                prompt.push_str("  (No specific preferences matched)\n");
            }
        } else {
            prompt.push_str("why this pet may not be the best match for the user. ");
            prompt.push_str("Explain the specific reasons based on mismatching preferences.\n\n");
            prompt.push_str("Mismatching User Preferences (explain why these don't match):\n");
            for (field, answer) in &answered {
                prompt.push_str(&format!(
                    "  - {}: User prefers '{}' but this pet needs something different\n",
                    field.label(),
                    answer
                ));
            }
            if answered.is_empty() {
                prompt.push_str("  (General mismatch with user preferences)\n");
            }
        }

        prompt.push_str("\nPet Information:\n");
        prompt.push_str(&format!("  - Name: {}\n", item.name));
        prompt.push_str(&format!("  - Category: {}\n", item.category_id));
        if let Some(description) = item.description.as_deref() {
            let clean = strip_markup(description);
            if !clean.is_empty() {
                prompt.push_str(&format!("  - Description: {}\n", clean));
            }
        }

        prompt.push_str(
            "\nGenerate a concise, friendly message (maximum 150 characters) in English that explains ",
        );
        if recommended {
            prompt.push_str(
                "why this pet is a good match. ONLY mention the matching preferences listed above.\n",
            );
        } else {
            prompt.push_str(
                "why this pet may not be ideal. Include specific reasons from the mismatching preferences above. Be polite and constructive.\n",
            );
        }
        prompt.push_str("Do not include any prefix or explanation, just the message itself.");

        prompt
    }
}

/// Drops `<...>` tag spans from catalog descriptions
fn strip_markup(text: &str) -> String {
    let mut clean = String::with_capacity(text.len());
    let mut in_tag = false;

    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => clean.push(ch),
            _ => {}
        }
    }

    clean.trim().to_string()
}

#[async_trait::async_trait]
impl MessageGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        profile: &SurveyProfile,
        item: &Item,
        recommended: bool,
        fields: &BTreeSet<SurveyField>,
    ) -> AppResult<String> {
        let prompt = Self::build_prompt(profile, item, recommended, fields);
        let url = format!("{}/v1/chat/completions", self.api_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: &prompt,
                }],
                max_tokens: MAX_COMPLETION_TOKENS,
                temperature: TEMPERATURE,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                item_id = %item.item_id,
                status = %status,
                body = %body,
                "Generation request failed"
            );
            return Err(AppError::Generation(format!(
                "API returned status {}: {}",
                status, body
            )));
        }

        let completion: ChatResponse = response.json().await?;
        let message = completion
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AppError::Generation("Empty completion".to_string()))?;

        tracing::debug!(
            item_id = %item.item_id,
            username = %profile.username,
            "Generated recommendation message"
        );

        Ok(message)
    }
}
