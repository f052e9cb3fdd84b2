//! Client chat-completions pour l'évaluation de pertinence
//!
//! Le prompt impose une réponse JSON pure; certains modèles emballent tout
//! de même leur sortie dans des clôtures markdown, qui sont retirées avant
//! le parsing. Une sortie qui ne parse pas reste une erreur.

use async_trait::async_trait;
use pmomodel::{Episode, Evaluation, Preference};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config_ext::ScorerConfigExt;
use crate::error::{Result, ScorerError};
use crate::scorer::RelevanceScorer;

/// Scorer au-dessus d'un endpoint compatible chat-completions
pub struct LlmScorer {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Forme attendue de la sortie du modèle pour une évaluation
#[derive(Debug, Deserialize)]
struct RawEvaluation {
    relevance_score: f64,
    #[serde(default)]
    summary: String,
}

impl LlmScorer {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Crée un scorer en utilisant la configuration de pmoconfig
    pub fn from_config(config: &pmoconfig::Config) -> Result<Self> {
        let api_key = config
            .get_scorer_api_key()
            .map_err(|e| ScorerError::Configuration(e.to_string()))?;
        let endpoint = config.get_scorer_endpoint();
        let model = config.get_scorer_model();
        info!(model=%model, "Creating LLM scorer");
        Self::new(endpoint, api_key, model)
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ScorerError::Unauthorized(body)
                }
                StatusCode::TOO_MANY_REQUESTS => ScorerError::RateLimitExceeded,
                s if s.is_server_error() => ScorerError::Transient(format!("{}: {}", s, body)),
                s => ScorerError::ApiError {
                    status: s.as_u16(),
                    message: body,
                },
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ScorerError::InvalidResponse("empty choices".to_string()))
    }

    fn evaluation_prompt(episode: &Episode, preferences: &[Preference]) -> String {
        let preferences_json =
            serde_json::to_string_pretty(preferences).unwrap_or_else(|_| "[]".to_string());
        format!(
            "You are an assistant evaluating podcast episodes for relevance to a \
             user's preferences.\n\n\
             # EPISODE\n\
             - Title: {name}\n\
             - Description: {description}\n\n\
             # USER PREFERENCES\n\
             {preferences}\n\n\
             Evaluate how relevant this episode is to the preferences. Analyse the \
             topics the episode covers, then how well they match.\n\n\
             Output your evaluation as valid JSON only, with this exact shape:\n\
             {{\"relevance_score\": <float between 0.0 and 1.0>, \
             \"summary\": \"<one short paragraph: what the episode covers and why it \
             does or does not match>\"}}\n\n\
             Important: your entire response must be valid JSON. No text before or \
             after it.",
            name = episode.name,
            description = episode.description,
            preferences = preferences_json,
        )
    }

    fn summary_prompt(episode: &Episode) -> String {
        format!(
            "Summarize this podcast episode in two or three sentences, for a \
             listener deciding whether to play it.\n\n\
             Title: {name}\n\
             Description: {description}\n\n\
             Respond with the summary text only.",
            name = episode.name,
            description = episode.description,
        )
    }
}

/// Retire les clôtures markdown éventuelles autour d'un bloc JSON
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_prefix = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_prefix
        .strip_suffix("```")
        .unwrap_or(without_prefix)
        .trim()
}

#[async_trait]
impl RelevanceScorer for LlmScorer {
    async fn evaluate(
        &self,
        episode: &Episode,
        preferences: &[Preference],
    ) -> Result<Evaluation> {
        let prompt = Self::evaluation_prompt(episode, preferences);
        let raw = self.complete(prompt).await?;
        debug!(episode_id=%episode.id, raw_len=raw.len(), "Raw model evaluation received");

        let cleaned = strip_code_fences(&raw);
        let parsed: RawEvaluation = serde_json::from_str(cleaned).map_err(|e| {
            ScorerError::InvalidResponse(format!("{} (raw starts: {:.80})", e, cleaned))
        })?;

        Ok(Evaluation::new(
            episode.id.clone(),
            parsed.relevance_score,
            parsed.summary,
        ))
    }

    async fn summarize(&self, episode: &Episode) -> Result<String> {
        let prompt = Self::summary_prompt(episode);
        let raw = self.complete(prompt).await?;
        Ok(raw.trim().to_string())
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_stripped() {
        let fenced = "```json\n{\"relevance_score\": 0.9, \"summary\": \"ok\"}\n```";
        assert_eq!(
            strip_code_fences(fenced),
            "{\"relevance_score\": 0.9, \"summary\": \"ok\"}"
        );

        let bare = "  {\"relevance_score\": 0.2}  ";
        assert_eq!(strip_code_fences(bare), "{\"relevance_score\": 0.2}");

        let generic = "```\n{}\n```";
        assert_eq!(strip_code_fences(generic), "{}");
    }

    #[test]
    fn raw_evaluation_parses_with_and_without_summary() {
        let full: RawEvaluation =
            serde_json::from_str("{\"relevance_score\": 0.75, \"summary\": \"good\"}").unwrap();
        assert_eq!(full.relevance_score, 0.75);
        assert_eq!(full.summary, "good");

        let minimal: RawEvaluation =
            serde_json::from_str("{\"relevance_score\": 0.1}").unwrap();
        assert_eq!(minimal.summary, "");
    }

    #[test]
    fn prompt_mentions_episode_and_preferences() {
        let episode = Episode {
            id: "e1".to_string(),
            show_id: "s1".to_string(),
            name: "The State of AI".to_string(),
            description: "Agents everywhere".to_string(),
            duration_seconds: 1800,
            published_at: chrono::Utc::now(),
            uri: None,
        };
        let preferences = vec![Preference::for_topics(["artificial intelligence"])];
        let prompt = LlmScorer::evaluation_prompt(&episode, &preferences);
        assert!(prompt.contains("The State of AI"));
        assert!(prompt.contains("artificial intelligence"));
        assert!(prompt.contains("relevance_score"));
    }
}
