use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use super::keys::validate_api_key_format;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const VERIFY_PROMPT: &str = "Hello, this is a test.";
const VERIFY_MAX_TOKENS: u32 = 5;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60 * 10);

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// Everything that can go wrong getting a completion. The `Display`
/// output is meant to be shown to the user as is.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompletionError {
    #[error("Prompt cannot be empty")]
    EmptyPrompt,
    #[error("Invalid API key format")]
    InvalidSecretFormat,
    #[error("Authentication error. Your API key may be invalid or expired.")]
    Unauthorized,
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error("Your prompt is too long for the current model. Please try a shorter prompt.")]
    ContextTooLong,
    #[error("Invalid request to OpenAI API. Please check your inputs.")]
    InvalidRequest,
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Network error. Please check your internet connection.")]
    NetworkFailure { cause: String },
    #[error("Invalid response from OpenAI API")]
    MalformedResponse,
}

// {"error": {"type": "...", "code": "...", "message": "..."}}
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    r#type: Option<String>,
    // Some compatible servers send numeric codes
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

fn classify_status(status: StatusCode, message: String) -> CompletionError {
    match status {
        StatusCode::UNAUTHORIZED => CompletionError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited,
        _ => CompletionError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Map a non-success response to a `CompletionError` using the error
/// body when it can be parsed and the status code otherwise.
pub fn classify_error(status: StatusCode, body: &str) -> CompletionError {
    let Ok(ApiErrorBody { error }) = serde_json::from_str::<ApiErrorBody>(body) else {
        return classify_status(status, format!("HTTP error {}", status));
    };

    if error.code.as_ref().and_then(Value::as_str) == Some("context_length_exceeded") {
        return CompletionError::ContextTooLong;
    }

    match error.r#type.as_deref() {
        _ if status == StatusCode::UNAUTHORIZED => CompletionError::Unauthorized,
        Some("authentication_error") => CompletionError::Unauthorized,
        Some("rate_limit_error") => CompletionError::RateLimited,
        Some("invalid_request_error") => CompletionError::InvalidRequest,
        _ => classify_status(
            status,
            error
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Error from OpenAI API. Please try again.".to_string()),
        ),
    }
}

/// Pull the text of the first choice out of a chat completion
/// response.
pub fn parse_completion(resp: &Value) -> Result<String, CompletionError> {
    let choice = resp["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .ok_or(CompletionError::MalformedResponse)?;
    let content = choice["message"]["content"]
        .as_str()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(CompletionError::MalformedResponse)?;
    Ok(content.to_string())
}

/// Two message exchange: a fixed system instruction and the user's
/// prompt.
pub fn request_payload(prompt: &str, options: &CompletionOptions) -> Value {
    let messages = vec![
        Message::new(Role::System, &options.system_prompt),
        Message::new(Role::User, prompt),
    ];
    json!({
        "model": options.model,
        "messages": messages,
        "temperature": options.temperature,
        "max_tokens": options.max_tokens,
        "top_p": options.top_p,
        "frequency_penalty": options.frequency_penalty,
        "presence_penalty": options.presence_penalty,
    })
}

/// Anything that can turn a prompt into a completion.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        api_key: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError>;

    /// Check that `api_key` is accepted by the remote service. Never
    /// errors, any failure is `false`.
    async fn verify(&self, api_key: &str) -> bool;
}

pub type BoxedCompleter = Arc<dyn Completer>;

/// Client for an OpenAI compatible chat completion API.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_hostname: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_hostname: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.api_hostname.trim_end_matches("/")
        )
    }

    async fn send(&self, api_key: &str, payload: &Value) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .post(self.url())
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
    }
}

#[async_trait]
impl Completer for OpenAiClient {
    async fn complete(
        &self,
        prompt: &str,
        api_key: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(CompletionError::EmptyPrompt);
        }
        validate_api_key_format(api_key).map_err(|_| CompletionError::InvalidSecretFormat)?;

        let payload = request_payload(prompt, options);
        tracing::debug!(model = %options.model, "Sending completion request");

        let network_failure = |err: reqwest::Error| {
            tracing::error!("Completion request failed: {}", err);
            CompletionError::NetworkFailure {
                cause: err.to_string(),
            }
        };
        let response = self.send(api_key, &payload).await.map_err(network_failure)?;
        let status = response.status();
        let body = response.text().await.map_err(network_failure)?;

        if !status.is_success() {
            let err = classify_error(status, &body);
            tracing::error!("Completion API returned {}: {:?}", status, err);
            return Err(err);
        }

        let resp: Value =
            serde_json::from_str(&body).map_err(|_| CompletionError::MalformedResponse)?;
        parse_completion(&resp)
    }

    async fn verify(&self, api_key: &str) -> bool {
        if validate_api_key_format(api_key).is_err() {
            return false;
        }
        let options = CompletionOptions {
            max_tokens: VERIFY_MAX_TOKENS,
            ..Default::default()
        };
        let payload = request_payload(VERIFY_PROMPT, &options);
        match self.send(api_key, &payload).await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                tracing::debug!("Key verification request failed: {}", err);
                false
            }
        }
    }
}
