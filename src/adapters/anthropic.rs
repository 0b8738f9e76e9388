//! Anthropic Messages API capability.
//!
//! Sends the rubric as the system prompt and the requirement as the user
//! message, and expects a single JSON object back:
//!
//! - scoring: `{"score": 0.0-1.0, "rationale": "..."}`
//! - synthesis: `{"revision": "..."}` or `{"split": [{"text": "...", "rationale": "..."}]}`
//!
//! Calls are rate limited. Throttling (429) and server errors (5xx) are
//! retried with exponential backoff up to `max_retries` times; everything
//! else fails the call.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::domain::errors::CapabilityError;
use crate::domain::models::{CapabilityConfig, SplitChild};
use crate::domain::ports::{
    RawScore, ScoringCapability, ScoringRequest, Synthesis, SynthesisCapability, SynthesisRequest,
};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ScoreReply {
    score: f64,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize)]
struct SynthesisReply {
    #[serde(default)]
    revision: Option<String>,
    #[serde(default)]
    split: Option<Vec<SplitChild>>,
}

pub struct AnthropicCapability {
    config: CapabilityConfig,
    api_key: String,
    client: Client,
    limiter: DefaultDirectRateLimiter,
}

impl AnthropicCapability {
    pub fn new(config: CapabilityConfig) -> Result<Self, CapabilityError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CapabilityError::NotConfigured("ANTHROPIC_API_KEY not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CapabilityError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        let rate = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            config,
            api_key,
            client,
            limiter,
        })
    }

    /// Send one prompt and return the concatenated text blocks of the reply.
    async fn complete(&self, system: String, prompt: String) -> Result<String, CapabilityError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.config.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build();

        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let body = &body;
        let max_retries = self.config.max_retries;

        let response: MessagesResponse = backoff::future::retry(policy, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            let give_up = attempt >= max_retries;

            self.send(body).await.map_err(|failure| match failure {
                Failure::Transient(err) if !give_up => {
                    tracing::warn!(attempt = attempt + 1, error = %err, "Transient capability failure, retrying");
                    backoff::Error::transient(err)
                }
                Failure::Transient(err) | Failure::Permanent(err) => backoff::Error::permanent(err),
            })
        })
        .await?;

        let text = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(CapabilityError::MalformedResponse("reply has no text".to_string()));
        }
        Ok(text)
    }

    async fn send(&self, body: &MessagesRequest<'_>) -> Result<MessagesResponse, Failure> {
        self.limiter.until_ready().await;

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url.trim_end_matches('/')))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| Failure::Transient(CapabilityError::Transport(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let err = CapabilityError::Transport(format!("API error {status}: {detail}"));
            return Err(if is_retryable(status) {
                Failure::Transient(err)
            } else {
                Failure::Permanent(CapabilityError::Rejected(format!("API error {status}: {detail}")))
            });
        }

        response
            .json()
            .await
            .map_err(|e| Failure::Permanent(CapabilityError::MalformedResponse(e.to_string())))
    }
}

enum Failure {
    Transient(CapabilityError),
    Permanent(CapabilityError),
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Parse the outermost JSON object in `text`, tolerating prose or code fences around it.
fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T, CapabilityError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(CapabilityError::MalformedResponse(format!("no JSON object in reply: {text}"))),
    };
    serde_json::from_str(json).map_err(|e| CapabilityError::MalformedResponse(e.to_string()))
}

fn user_prompt(text: &str, project_context: Option<&str>) -> String {
    match project_context {
        Some(context) => format!("Project context:\n{context}\n\nRequirement:\n{text}"),
        None => format!("Requirement:\n{text}"),
    }
}

#[async_trait]
impl ScoringCapability for AnthropicCapability {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn score(&self, request: ScoringRequest<'_>) -> Result<RawScore, CapabilityError> {
        let system = format!(
            "You review software requirements for {criterion}.\n{rubric}\n\
             Reply with only a JSON object: {{\"score\": <number from 0.0 to 1.0>, \"rationale\": <one sentence>}}.",
            criterion = request.criterion,
            rubric = request.rubric,
        );
        let reply: ScoreReply = parse_reply(
            &self
                .complete(system, user_prompt(request.text, request.project_context))
                .await?,
        )?;
        tracing::debug!(criterion = %request.criterion, score = reply.score, "Scored by model");

        Ok(RawScore {
            score: reply.score,
            rationale: reply.rationale,
        })
    }
}

#[async_trait]
impl SynthesisCapability for AnthropicCapability {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<Synthesis, CapabilityError> {
        let shape = if request.criterion.may_split() {
            "{\"revision\": <revised requirement>} or {\"split\": [{\"text\": <requirement>, \"rationale\": <why>}, ...]}"
        } else {
            "{\"revision\": <revised requirement>}"
        };
        let system = format!(
            "You repair software requirements that fail the {criterion} criterion.\n{instructions}\n\
             The current score is {score:.2}: {rationale}\n\
             Keep the original intent. Reply with only a JSON object: {shape}.",
            criterion = request.criterion,
            instructions = request.instructions,
            score = request.score.score,
            rationale = request.score.rationale,
        );
        let reply: SynthesisReply = parse_reply(
            &self
                .complete(system, user_prompt(request.text, request.project_context))
                .await?,
        )?;

        match reply {
            SynthesisReply { split: Some(children), .. } => Ok(Synthesis::SplitProposal(children)),
            SynthesisReply {
                revision: Some(revision),
                ..
            } => Ok(Synthesis::Revision(revision)),
            _ => Err(CapabilityError::MalformedResponse(
                "reply has neither revision nor split".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CriterionId, CriterionScore};

    fn config(base_url: String) -> CapabilityConfig {
        CapabilityConfig {
            provider: "anthropic".into(),
            base_url,
            api_key: Some("test-key".into()),
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            requests_per_second: 1000,
            ..CapabilityConfig::default()
        }
    }

    fn reply(text: &str) -> String {
        serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "test",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1, "output_tokens": 1}
        })
        .to_string()
    }

    fn scoring(text: &str) -> ScoringRequest<'_> {
        ScoringRequest {
            criterion: CriterionId::Clarity,
            text,
            rubric: "Judge clarity.",
            project_context: None,
        }
    }

    #[tokio::test]
    async fn parses_score_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", API_VERSION)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply("Here you go: {\"score\": 0.82, \"rationale\": \"clear\"}"))
            .create_async()
            .await;

        let capability = AnthropicCapability::new(config(server.url())).unwrap();
        let raw = capability.score(scoring("The app must be fast")).await.unwrap();

        assert!((raw.score - 0.82).abs() < 1e-9);
        assert_eq!(raw.rationale, "clear");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn parses_split_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(reply(
                "{\"split\": [{\"text\": \"A shall x.\", \"rationale\": \"one\"}, {\"text\": \"B shall y.\", \"rationale\": \"two\"}]}",
            ))
            .create_async()
            .await;

        let capability = AnthropicCapability::new(config(server.url())).unwrap();
        let score = CriterionScore::new(CriterionId::Atomicity, 0.2, "compound");
        let synthesis = capability
            .synthesize(SynthesisRequest {
                criterion: CriterionId::Atomicity,
                text: "A shall x and B shall y.",
                score: &score,
                instructions: "Split it.",
                project_context: None,
            })
            .await
            .unwrap();

        assert!(matches!(synthesis, Synthesis::SplitProposal(children) if children.len() == 2));
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_fail() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .with_status(503)
            .with_body("overloaded")
            .expect(3)
            .create_async()
            .await;

        let capability = AnthropicCapability::new(config(server.url())).unwrap();
        let result = capability.score(scoring("text")).await;

        assert!(matches!(result, Err(CapabilityError::Transport(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .with_status(400)
            .with_body("bad request")
            .expect(1)
            .create_async()
            .await;

        let capability = AnthropicCapability::new(config(server.url())).unwrap();
        let result = capability.score(scoring("text")).await;

        assert!(matches!(result, Err(CapabilityError::Rejected(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_json_reply_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(reply("I cannot score this."))
            .create_async()
            .await;

        let capability = AnthropicCapability::new(config(server.url())).unwrap();
        let result = capability.score(scoring("text")).await;
        assert!(matches!(result, Err(CapabilityError::MalformedResponse(_))));
    }

    #[test]
    fn missing_api_key_is_not_configured() {
        temp_env::with_var("ANTHROPIC_API_KEY", None::<&str>, || {
            let result = AnthropicCapability::new(CapabilityConfig::default());
            assert!(matches!(result, Err(CapabilityError::NotConfigured(_))));
        });
    }
}
