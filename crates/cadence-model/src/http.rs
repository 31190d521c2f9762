//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use cadence_config::ModelEndpointConfig;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::caller::ModelCaller;
use crate::error::ModelError;
use crate::types::ModelRequest;

/// [`ModelCaller`] backed by `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct HttpModelCaller {
  client: reqwest::Client,
  endpoint: Url,
  api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
  choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
  message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
  content: Option<String>,
}

impl HttpModelCaller {
  pub fn new(config: &ModelEndpointConfig, api_key: Option<String>) -> Result<Self, ModelError> {
    let endpoint = completions_url(&config.base_url)?;
    let client = reqwest::Client::builder()
      .timeout(Duration::from_millis(config.request_timeout_ms))
      .build()
      .map_err(|e| ModelError::Config {
        message: format!("failed to build http client: {}", e),
      })?;

    Ok(Self {
      client,
      endpoint,
      api_key,
    })
  }

  /// Build a caller reading the API key from `config.api_key_env`.
  pub fn from_env(config: &ModelEndpointConfig) -> Result<Self, ModelError> {
    let api_key = std::env::var(&config.api_key_env).ok();
    if api_key.is_none() {
      warn!(
        env = %config.api_key_env,
        "no api key in environment, sending unauthenticated requests"
      );
    }
    Self::new(config, api_key)
  }

  pub fn endpoint(&self) -> &Url {
    &self.endpoint
  }
}

#[async_trait]
impl ModelCaller for HttpModelCaller {
  async fn call(&self, request: ModelRequest) -> Result<String, ModelError> {
    debug!(
      model = %request.model,
      messages = request.messages.len(),
      structured = request.structured_output,
      "model_call"
    );

    let mut builder = self
      .client
      .post(self.endpoint.clone())
      .json(&request_body(&request));
    if let Some(key) = &self.api_key {
      builder = builder.bearer_auth(key);
    }

    let response = builder.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
      return Err(ModelError::Status {
        status: status.as_u16(),
        body,
      });
    }

    parse_completion(&body)
  }
}

/// Join `chat/completions` onto a base URL, keeping any path prefix.
fn completions_url(base_url: &str) -> Result<Url, ModelError> {
  let base = format!("{}/", base_url.trim_end_matches('/'));
  Url::parse(&base)
    .and_then(|u| u.join("chat/completions"))
    .map_err(|e| ModelError::Config {
      message: format!("invalid base_url '{}': {}", base_url, e),
    })
}

fn request_body(request: &ModelRequest) -> serde_json::Value {
  let mut body = json!({
    "model": request.model,
    "messages": request.messages,
    "temperature": request.temperature,
  });
  if request.structured_output {
    body["response_format"] = json!({ "type": "json_object" });
  }
  body
}

fn parse_completion(body: &str) -> Result<String, ModelError> {
  let parsed: ChatResponse = serde_json::from_str(body)
    .map_err(|e| ModelError::invalid_response(format!("malformed completion body: {}", e)))?;

  parsed
    .choices
    .into_iter()
    .next()
    .and_then(|c| c.message.content)
    .ok_or_else(|| ModelError::invalid_response("completion has no message content"))
}
