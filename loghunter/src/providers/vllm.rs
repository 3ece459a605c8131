//! vLLM 提供方实现
//! vLLM provider implementation
//!
//! vLLM 暴露 OpenAI 兼容接口，复用 Chat Completions 的请求/响应类型
//! vLLM exposes an OpenAI-compatible API; reuses the Chat Completions
//! request/response types

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{AnalysisRequest, AnalysisResult, LogLine};
use crate::providers::openai::{ChatMessage, ChatRequest, ChatResponse};
use crate::providers::{
  analysis_prompt, classify_provider_error, inference_client, parse_analysis_response,
  summarize_prompt, Provider, VllmSettings,
};

/// vLLM 提供方
/// vLLM provider
#[derive(Debug)]
pub struct VllmProvider {
  settings: VllmSettings,
  client: reqwest::Client,
}

impl VllmProvider {
  /// 创建新的 vLLM 提供方
  /// Create a new vLLM provider
  pub fn new(settings: VllmSettings, timeout: Duration) -> Result<Self> {
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
      .post(format!("{}/v1/chat/completions", self.settings.base_url))
      .json(&request)
      .send()
      .await
      .map_err(classify_provider_error)?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::ProviderUnavailable(format!(
        "vllm returned status {}",
        status.as_u16()
      )));
    }

    let body: ChatResponse = resp
      .json()
      .await
      .map_err(|e| Error::InvalidResponse(format!("decoding vllm response: {}", e)))?;
    body
      .choices
      .into_iter()
      .next()
      .map(|c| c.message.content)
      .ok_or_else(|| Error::InvalidResponse("vllm returned no choices".to_string()))
  }
}

#[async_trait]
impl Provider for VllmProvider {
  fn name(&self) -> &str {
    "vllm"
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
