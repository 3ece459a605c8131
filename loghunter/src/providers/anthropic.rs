//! Anthropic 提供方实现
//! Anthropic provider implementation
//!
//! 通过 Messages 接口执行推理
//! Runs inference through the Messages endpoint

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{AnalysisRequest, AnalysisResult, LogLine};
use crate::providers::{
  analysis_prompt, classify_provider_error, inference_client, parse_analysis_response,
  summarize_prompt, AnthropicSettings, Provider,
};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// Anthropic 提供方
/// Anthropic provider
#[derive(Debug)]
pub struct AnthropicProvider {
  settings: AnthropicSettings,
  client: reqwest::Client,
}

impl AnthropicProvider {
  /// 创建新的 Anthropic 提供方
  /// Create a new Anthropic provider
  pub fn new(settings: AnthropicSettings, timeout: Duration) -> Result<Self> {
    Ok(Self {
      settings,
      client: inference_client(timeout)?,
    })
  }

  async fn message(&self, prompt: String) -> Result<String> {
    let request = MessagesRequest {
      model: &self.settings.model,
      max_tokens: MAX_TOKENS,
      messages: vec![MessageParam {
        role: "user",
        content: prompt,
      }],
    };

    let resp = self
      .client
      .post(format!("{}/v1/messages", ANTHROPIC_BASE_URL))
      .header("x-api-key", &self.settings.api_key)
      .header("anthropic-version", ANTHROPIC_VERSION)
      .json(&request)
      .send()
      .await
      .map_err(classify_provider_error)?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::ProviderUnavailable(format!(
        "anthropic returned status {}",
        status.as_u16()
      )));
    }

    let body: MessagesResponse = resp
      .json()
      .await
      .map_err(|e| Error::InvalidResponse(format!("decoding anthropic response: {}", e)))?;
    body
      .content
      .into_iter()
      .next()
      .map(|block| block.text)
      .ok_or_else(|| Error::InvalidResponse("anthropic returned no content".to_string()))
  }
}

#[async_trait]
impl Provider for AnthropicProvider {
  fn name(&self) -> &str {
    "anthropic"
  }

  fn model(&self) -> &str {
    &self.settings.model
  }

  async fn analyze(&self, req: AnalysisRequest) -> Result<AnalysisResult> {
    let text = self.message(analysis_prompt(&req)).await?;
    let parsed = parse_analysis_response(&text)?;
    Ok(AnalysisResult {
      id: Uuid::new_v4(),
      cluster_id: req.cluster.id,
      tenant_id: req.cluster.tenant_id,
      job_id: Uuid::nil(),
      provider: self.name().to_string(),
      model: self.settings.model.clone(),
      root_cause: parsed.root_cause,
      confidence: parsed.confidence,
      summary: parsed.summary,
      suggested_action: parsed.suggested_action,
      created_at: Utc::now(),
    })
  }

  async fn summarize(&self, logs: &[LogLine]) -> Result<String> {
    self.message(summarize_prompt(logs)).await
  }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
  model: &'a str,
  max_tokens: u32,
  messages: Vec<MessageParam<'a>>,
}

#[derive(Serialize)]
struct MessageParam<'a> {
  role: &'a str,
  content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
  content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
  text: String,
}
