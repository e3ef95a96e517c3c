//! LLM integration for challenge planning
//!
//! This module handles communication with the Claude API for generating
//! and remixing 30-day challenge plans.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::non_empty_var;
use crate::error::ChallengeError;
use crate::models::{ChallengeLevel, ChallengeTask};
use crate::planner::{DraftTask, PlanGenerator};

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";
const PLAN_MAX_TOKENS: u32 = 8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeConfig {
  pub api_key: String,
  pub model: String,
  pub api_url: Url,
}

impl ClaudeConfig {
  /// Load from `ANTHROPIC_API_KEY`, with optional `ZEN30_CLAUDE_MODEL`
  /// and `ANTHROPIC_API_URL` overrides
  pub fn from_env() -> Result<Self, LlmError> {
    let api_key = non_empty_var("ANTHROPIC_API_KEY").ok_or(LlmError::MissingApiKey)?;
    let model = non_empty_var("ZEN30_CLAUDE_MODEL").unwrap_or_else(|| CLAUDE_MODEL.to_string());
    let api_url = non_empty_var("ANTHROPIC_API_URL").unwrap_or_else(|| CLAUDE_API_URL.to_string());
    let api_url = Url::parse(&api_url).map_err(|e| LlmError::Config(format!("{}: {}", api_url, e)))?;

    Ok(Self {
      api_key,
      model,
      api_url,
    })
  }
}

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum LlmError {
  #[error("API key not configured")]
  MissingApiKey,

  #[error("Invalid configuration: {0}")]
  Config(String),

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),
}

impl From<LlmError> for ChallengeError {
  fn from(e: LlmError) -> Self {
    ChallengeError::Generation(e.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Claude API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ClaudeRequest {
  model: String,
  max_tokens: u32,
  system: String,
  messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
  role: String,
  content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
  content: Vec<ContentBlock>,
  #[allow(dead_code)]
  model: String,
  #[allow(dead_code)]
  stop_reason: Option<String>,
  usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
  #[serde(rename = "type")]
  content_type: String,
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
  pub input_tokens: u32,
  pub output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
  error: ClaudeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorDetail {
  message: String,
}

/// ---------------------------------------------------------------------------
/// Plan Response (from Claude)
/// ---------------------------------------------------------------------------

/// Claude is asked for `{"plan": [...]}` but sometimes answers with a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanReply {
  Wrapped { plan: Vec<DraftTask> },
  Bare(Vec<DraftTask>),
}

impl PlanReply {
  fn into_tasks(self) -> Vec<DraftTask> {
    match self {
      PlanReply::Wrapped { plan } => plan,
      PlanReply::Bare(plan) => plan,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Claude Client
/// ---------------------------------------------------------------------------

pub struct ClaudeClient {
  client: Client,
  config: ClaudeConfig,
}

impl ClaudeClient {
  pub fn new(config: ClaudeConfig) -> Self {
    Self {
      client: Client::new(),
      config,
    }
  }

  /// Create a new Claude client, loading API key from environment
  pub fn from_env() -> Result<Self, LlmError> {
    Ok(Self::new(ClaudeConfig::from_env()?))
  }

  /// Call Claude with a system prompt and user message
  pub async fn complete(
    &self,
    system_prompt: &str,
    user_message: &str,
    max_tokens: u32,
  ) -> Result<(String, Usage), LlmError> {
    let request = ClaudeRequest {
      model: self.config.model.clone(),
      max_tokens,
      system: system_prompt.to_string(),
      messages: vec![ClaudeMessage {
        role: "user".to_string(),
        content: user_message.to_string(),
      }],
    };

    let response = self
      .client
      .post(self.config.api_url.clone())
      .header("x-api-key", &self.config.api_key)
      .header("anthropic-version", API_VERSION)
      .header("content-type", "application/json")
      .json(&request)
      .send()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    if !status.is_success() {
      if let Ok(error_resp) = serde_json::from_str::<ClaudeErrorResponse>(&body) {
        return Err(LlmError::Api(error_resp.error.message));
      }
      return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
    }

    let claude_response: ClaudeResponse =
      serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

    let text = claude_response
      .content
      .iter()
      .find(|c| c.content_type == "text")
      .and_then(|c| c.text.clone())
      .ok_or_else(|| LlmError::Parse("No text content in response".to_string()))?;

    Ok((text, claude_response.usage))
  }

  /// Ask for a plan and parse whatever JSON comes back, unvalidated
  async fn request_plan(&self, user_message: &str) -> Result<Vec<DraftTask>, LlmError> {
    let system_prompt = include_str!("prompts/challenge_planner.txt");

    let (response_text, usage) = self
      .complete(system_prompt, user_message, PLAN_MAX_TOKENS)
      .await?;
    debug!(
      "Plan response used {} input / {} output tokens",
      usage.input_tokens, usage.output_tokens
    );

    let json_str = extract_json(&response_text)?;
    let reply: PlanReply =
      serde_json::from_str(&json_str).map_err(|e| LlmError::Parse(format!("{}: {}", e, json_str)))?;

    Ok(reply.into_tasks())
  }
}

#[async_trait]
impl PlanGenerator for ClaudeClient {
  async fn generate_plan(
    &self,
    goal: &str,
    level: ChallengeLevel,
  ) -> Result<Vec<DraftTask>, ChallengeError> {
    let user_message = format!(
      r#"Create a 30-day challenge plan.

GOAL: {}
FITNESS LEVEL: {}

Respond with valid JSON matching the OUTPUT FORMAT specified in your instructions."#,
      goal, level
    );

    Ok(self.request_plan(&user_message).await?)
  }

  async fn modify_plan(
    &self,
    current: &[ChallengeTask],
    instruction: &str,
  ) -> Result<Vec<DraftTask>, ChallengeError> {
    let current_json = serde_json::to_string_pretty(current)
      .map_err(|e| ChallengeError::Generation(e.to_string()))?;

    let user_message = format!(
      r#"Here is the current 30-day plan:
{}

Rewrite the full plan with this change: {}

Keep every day that the change does not affect. Respond with valid JSON matching the OUTPUT FORMAT specified in your instructions."#,
      current_json, instruction
    );

    Ok(self.request_plan(&user_message).await?)
  }
}

/// Extract JSON from Claude's response (handles markdown code blocks)
fn extract_json(text: &str) -> Result<String, LlmError> {
  let trimmed = text.trim();
  if trimmed.starts_with('{') || trimmed.starts_with('[') {
    return Ok(trimmed.to_string());
  }

  // Look for JSON in code blocks
  if let Some(start) = text.find("```json") {
    let start = start + 7;
    if let Some(end) = text[start..].find("```") {
      return Ok(text[start..start + end].trim().to_string());
    }
  }

  // Look for plain code blocks
  if let Some(start) = text.find("```") {
    let start = start + 3;
    // Skip language identifier if present
    let content_start = text[start..]
      .find('\n')
      .map(|i| start + i + 1)
      .unwrap_or(start);
    if let Some(end) = text[content_start..].find("```") {
      return Ok(text[content_start..content_start + end].trim().to_string());
    }
  }

  // Last resort: outermost object, then outermost array
  for (open, close) in [('{', '}'), ('[', ']')] {
    if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
      if start < end {
        return Ok(text[start..=end].to_string());
      }
    }
  }

  Err(LlmError::Parse("Could not extract JSON from response".to_string()))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
