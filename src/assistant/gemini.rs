use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::forecast_prompt;
use super::traits::{Assistant, ChatReply, ForecastSummary, Outcome, Source};
use crate::metrics::prometheus;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_INSTRUCTION: &str = "You are AgriSure Assistant, a friendly and knowledgeable \
AI expert in agricultural commodity markets, specifically for Indian farmers. Provide clear, \
concise answers. Format your responses using markdown for better readability. For example, \
use **bold** for emphasis.";

// ── Wire types (generateContent) ─────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GroundingMetadata {
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }

    /// Web grounding sources of the first candidate, one per uri, in first-seen order.
    fn sources(&self) -> Vec<Source> {
        let Some(metadata) = self
            .candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
        else {
            return Vec::new();
        };

        let mut sources: Vec<Source> = Vec::new();
        let mut by_uri: HashMap<String, usize> = HashMap::new();
        for web in metadata.grounding_chunks.iter().filter_map(|c| c.web.as_ref()) {
            let (Some(uri), Some(title)) = (web.uri.as_deref(), web.title.as_deref()) else {
                continue;
            };
            if uri.is_empty() || title.is_empty() {
                continue;
            }
            let source = Source {
                title: title.to_string(),
                uri: uri.to_string(),
            };
            // Later chunks for the same page win, position stays.
            match by_uri.get(uri) {
                Some(&i) => sources[i] = source,
                None => {
                    by_uri.insert(uri.to_string(), sources.len());
                    sources.push(source);
                }
            }
        }
        sources
    }
}

/// Gemini `generateContent` over REST.
pub struct GeminiAssistant {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiAssistant {
    pub fn new(api_key: String, model: String) -> anyhow::Result<Self> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    async fn generate(&self, request: &GenerateRequest<'_>) -> anyhow::Result<GenerateResponse> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .context("generateContent request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("generateContent returned {status}: {body}");
        }

        response
            .json::<GenerateResponse>()
            .await
            .context("failed to decode generateContent response")
    }

    async fn try_chat(&self, prompt: &str) -> anyhow::Result<ChatReply> {
        let request = GenerateRequest {
            contents: vec![user_content(prompt)],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part { text: SYSTEM_INSTRUCTION }],
            }),
            tools: vec![Tool {
                google_search: serde_json::json!({}),
            }],
        };
        let response = self.generate(&request).await?;
        let text = response.text().context("response carried no text")?;
        let sources = response.sources();

        Ok(ChatReply {
            text,
            sources: (!sources.is_empty()).then_some(sources),
            outcome: Outcome::Answered,
        })
    }

    async fn try_summary(&self, commodity: &str, period_days: u32) -> anyhow::Result<String> {
        let prompt = forecast_prompt(commodity, period_days);
        let request = GenerateRequest {
            contents: vec![user_content(&prompt)],
            system_instruction: None,
            tools: Vec::new(),
        };
        self.generate(&request)
            .await?
            .text()
            .context("response carried no text")
    }
}

fn user_content(text: &str) -> Content<'_> {
    Content {
        role: Some("user"),
        parts: vec![Part { text }],
    }
}

#[async_trait]
impl Assistant for GeminiAssistant {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn chat(&self, prompt: &str) -> ChatReply {
        debug!(prompt, "requesting chat response");
        let started = Instant::now();
        let reply = match self.try_chat(prompt).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "chat request failed");
                ChatReply::fallback()
            }
        };
        prometheus::record_assistant_latency_ms("chat", started.elapsed().as_secs_f64() * 1_000.0);
        prometheus::record_assistant_request("chat", reply.outcome.as_str());
        reply
    }

    async fn forecast_summary(&self, commodity: &str, period_days: u32) -> ForecastSummary {
        debug!(commodity, period_days, "requesting forecast summary");
        let started = Instant::now();
        let summary = match self.try_summary(commodity, period_days).await {
            Ok(text) => ForecastSummary {
                commodity: commodity.to_string(),
                period_days,
                text,
                outcome: Outcome::Answered,
            },
            Err(err) => {
                warn!(commodity, error = %format!("{err:#}"), "forecast summary request failed");
                ForecastSummary::fallback(commodity, period_days)
            }
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        prometheus::record_assistant_latency_ms("forecast", elapsed_ms);
        prometheus::record_assistant_request("forecast", summary.outcome.as_str());
        summary
    }
}
