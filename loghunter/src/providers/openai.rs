//! OpenAI 提供方实现
//! OpenAI provider implementation
//!
//! 通过 Chat Completions 接口执行推理
//! Runs inference through the Chat Completions endpoint

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{AnalysisRequest, AnalysisResult, LogLine};
use crate::providers::{
  analysis_prompt, classify_provider_error, inference_client, parse_analysis_response,
  summarize_prompt, OpenAiSettings, Provider,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// OpenAI 提供方
/// OpenAI provider
#[derive(Debug)]
pub struct OpenAiProvider {
  settings: OpenAiSettings,
  client: reqwest::Client,
}

impl OpenAiProvider {
  /// 创建新的 OpenAI 提供方
  /// Create a new OpenAI provider
  pub fn new(settings: OpenAiSettings, timeout: Duration) -> Result<Self> {
    Ok(Self {
      settings,
      client: inference_client(timeout)?,
    })
  }

  async fn chat(&self, prompt: String) -> Result<String> {
    let request = ChatRequest {
      model: &self.settings.model,
      messages: vec![ChatMessage {
        role: "user",
        content: prompt,
      }],
    };

    let resp = self
      .client
      .post(format!("{}/v1/chat/completions", OPENAI_BASE_URL))
      .bearer_auth(&self.settings.api_key)
      .json(&request)
      .send()
      .await
      .map_err(classify_provider_error)?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::ProviderUnavailable(format!(
        "openai returned status {}",
        status.as_u16()
      )));
    }

    let body: ChatResponse = resp
      .json()
      .await
      .map_err(|e| Error::InvalidResponse(format!("decoding openai response: {}", e)))?;
    body
      .choices
      .into_iter()
      .next()
      .map(|c| c.message.content)
      .ok_or_else(|| Error::InvalidResponse("openai returned no choices".to_string()))
  }
}

#[async_trait]
impl Provider for OpenAiProvider {
  fn name(&self) -> &str {
    "openai"
  }

  fn model(&self) -> &str {
    &self.settings.model
  }

  async fn analyze(&self, req: AnalysisRequest) -> Result<AnalysisResult> {
    let text = self.chat(analysis_prompt(&req)).await?;
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
    self.chat(summarize_prompt(logs)).await
  }
}

#[derive(Serialize)]
pub(crate) struct ChatRequest<'a> {
  pub model: &'a str,
  pub messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
pub(crate) struct ChatMessage<'a> {
  pub role: &'a str,
  pub content: String,
}

#[derive(Deserialize)]
pub(crate) struct ChatResponse {
  pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
  pub message: ChatChoiceMessage,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoiceMessage {
  pub content: String,
}
