use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::enhance::{strip_code_fences, EnhanceError, EnhancementRequest, Enhancer};

/// Model used when none is given on the command line.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = "You write SpiceDB schemas for Keycloak realms. \
Reply with the schema text only, without explanations.";

/// [`Enhancer`] backed by an `OpenAI`-compatible chat-completions endpoint.
///
/// The API key is passed in explicitly; nothing is read from the environment.
pub struct OpenAiEnhancer {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    endpoint: String,
    timeout: Duration,
}

impl OpenAiEnhancer {
    /// Client for `model` authenticated with `api_key`.
    ///
    /// Requests are abandoned by the HTTP client itself after `timeout`, so a
    /// worker left behind by a timed-out call does not outlive the budget.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EnhanceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnhanceError::Transport(format!("could not build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout,
        })
    }

    /// Send requests to another compatible endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn prompt(request: &EnhancementRequest) -> String {
        format!(
            "{}\n\nDeterministic baseline schema:\n{}\n\
             Improve this SpiceDB schema for realm \"{}\". Keep every definition, \
             relation and permission of the baseline.",
            request.summary, request.baseline, request.realm
        )
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl Enhancer for OpenAiEnhancer {
    fn name(&self) -> &str {
        &self.model
    }

    fn enhance(&self, request: &EnhancementRequest) -> Result<String, EnhanceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": &self.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": Self::prompt(request)}
                ],
                "temperature": 0
            }))
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    EnhanceError::Timeout(self.timeout)
                } else {
                    EnhanceError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EnhanceError::Transport(format!("HTTP {status}: {body}")));
        }

        let reply: ChatResponse = response
            .json()
            .map_err(|e| EnhanceError::InvalidResponse(e.to_string()))?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EnhanceError::InvalidResponse("no choices in reply".to_string()))?;

        let schema = strip_code_fences(&content);
        if schema.is_empty() {
            return Err(EnhanceError::InvalidResponse("empty reply".to_string()));
        }
        Ok(schema.to_string())
    }
}
