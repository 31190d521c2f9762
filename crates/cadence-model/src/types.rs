use cadence_config::ExecutionConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  System,
  User,
  Assistant,
}

/// A role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub role: Role,
  pub content: String,
}

impl Message {
  pub fn system(content: impl Into<String>) -> Self {
    Self {
      role: Role::System,
      content: content.into(),
    }
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self {
      role: Role::User,
      content: content.into(),
    }
  }
}

/// One upstream model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
  pub messages: Vec<Message>,
  pub model: String,
  pub temperature: f32,
  pub structured_output: bool,
}

impl ModelRequest {
  /// Build a request for a single user prompt, prefixed by the config's
  /// system prompt when it has one.
  pub fn from_prompt(prompt: impl Into<String>, config: &ExecutionConfig) -> Self {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &config.system_prompt {
      messages.push(Message::system(system.clone()));
    }
    messages.push(Message::user(prompt));

    Self {
      messages,
      model: config.model.clone(),
      temperature: config.temperature,
      structured_output: config.structured_output,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_prompt_with_system() {
    let config = ExecutionConfig::new("gpt-4o")
      .with_temperature(0.1)
      .with_system_prompt("be brief")
      .structured(true);
    let request = ModelRequest::from_prompt("hello", &config);

    assert_eq!(
      request.messages,
      vec![Message::system("be brief"), Message::user("hello")]
    );
    assert_eq!(request.model, "gpt-4o");
    assert_eq!(request.temperature, 0.1);
    assert!(request.structured_output);
  }

  #[test]
  fn test_from_prompt_without_system() {
    let request = ModelRequest::from_prompt("hi", &ExecutionConfig::new("m"));
    assert_eq!(request.messages, vec![Message::user("hi")]);
  }
}
