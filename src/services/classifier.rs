//! External attribute classifier (Tier 2).
//!
//! The classifier sees the scene body and the opted-in characters and
//! answers with free-form attribute observations. Its output is merged, not
//! audited; anything malformed is treated as an empty answer.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Tier2Config;
use crate::extraction::tier2::ClassifierResponse;
use crate::models::registry::RegistryEntry;
use crate::BibleError;

const API_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = "You extract physical and biographical attributes of named \
characters from fiction. Reply with a single JSON object and nothing else. Keys are \
character names exactly as listed; values are objects mapping a short lower-case \
attribute name to {\"value\": string, \"quote\": string}, where quote is the sentence \
that states it. Only report attributes the text states explicitly. Omit characters \
with nothing to report.";

/// Entity description sent with a classification request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierEntity {
    pub name: String,
    pub aliases: Vec<String>,
    pub kind: String,
}

/// One classification request: a scene body and the entities to look for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierRequest {
    pub text: String,
    pub entities: Vec<ClassifierEntity>,
}

impl ClassifierRequest {
    pub fn new(text: impl Into<String>, entries: &[&RegistryEntry]) -> Self {
        Self {
            text: text.into(),
            entities: entries
                .iter()
                .map(|e| ClassifierEntity {
                    name: e.name.clone(),
                    aliases: e.aliases.clone(),
                    kind: e.kind.as_str().to_string(),
                })
                .collect(),
        }
    }

    /// User message for the Messages API.
    pub fn prompt(&self) -> String {
        let roster = self
            .entities
            .iter()
            .map(|e| {
                if e.aliases.is_empty() {
                    format!("- {} ({})", e.name, e.kind)
                } else {
                    format!("- {} ({}; also called {})", e.name, e.kind, e.aliases.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("Characters:\n{}\n\nText:\n{}", roster, self.text)
    }
}

/// Classifier seam.
#[async_trait]
pub trait AttributeClassifier: Send + Sync {
    /// Classify one scene. Transport failures are errors; malformed answers
    /// come back as [`ClassifierResponse::Empty`].
    async fn classify(&self, request: &ClassifierRequest)
        -> Result<ClassifierResponse, BibleError>;

    /// Whether this classifier can actually produce output.
    fn is_available(&self) -> bool {
        true
    }
}

/// Classifier that never reports anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopClassifier;

impl NoopClassifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AttributeClassifier for NoopClassifier {
    async fn classify(
        &self,
        _request: &ClassifierRequest,
    ) -> Result<ClassifierResponse, BibleError> {
        Ok(ClassifierResponse::Empty)
    }

    fn is_available(&self) -> bool {
        false
    }
}

// ============================================================================
// Anthropic Messages API
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'static str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ApiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl ApiResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ApiContent::Text { text } => Some(text.as_str()),
                ApiContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Classifier backed by the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicClassifier {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_tokens: u32,
}

impl std::fmt::Debug for AnthropicClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClassifier")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AnthropicClassifier {
    /// Build from configuration. Fails before any network call when no
    /// API key is configured.
    pub fn from_config(config: &Tier2Config) -> Result<Self, BibleError> {
        let api_key = config.credentials().ok_or_else(|| {
            BibleError::Config(
                "tier2 classifier requires an API key (tier2.api_key or ANTHROPIC_API_KEY)"
                    .to_string(),
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BibleError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
        })
    }

    fn headers(&self) -> Result<HeaderMap, BibleError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| BibleError::Config(format!("Invalid API key: {}", e)))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }
}

#[async_trait]
impl AttributeClassifier for AnthropicClassifier {
    async fn classify(
        &self,
        request: &ClassifierRequest,
    ) -> Result<ClassifierResponse, BibleError> {
        if request.entities.is_empty() {
            return Ok(ClassifierResponse::Empty);
        }

        let prompt = request.prompt();
        let body = ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![ApiMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/messages", self.endpoint))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| BibleError::Classifier(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(BibleError::Classifier(format!(
                "API error (status {}): {}",
                status, message
            )));
        }

        let envelope: ApiResponse = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Unreadable classifier envelope: {}", e);
                return Ok(ClassifierResponse::Empty);
            }
        };
        let text = envelope.text();
        debug!("Classifier returned {} chars", text.len());
        Ok(ClassifierResponse::parse(&text))
    }
}
