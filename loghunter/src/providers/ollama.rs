//! Ollama 提供方实现
//! Ollama provider implementation
//!
//! 通过 Ollama 的 /api/generate 接口执行推理
//! Runs inference through Ollama's /api/generate endpoint

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{AnalysisRequest, AnalysisResult, LogLine};
use crate::providers::{
  analysis_prompt, classify_provider_error, inference_client, parse_analysis_response,
  summarize_prompt, OllamaSettings, Provider,
};

/// Ollama 提供方
/// Ollama provider
#[derive(Debug)]
pub struct OllamaProvider {
  settings: OllamaSettings,
  client: reqwest::Client,
}

impl OllamaProvider {
  /// 创建新的 Ollama 提供方
  /// Create a new Ollama provider
  pub fn new(settings: OllamaSettings, timeout: Duration) -> Result<Self> {
    Ok(Self {
      settings,
      client: inference_client(timeout)?,
    })
  }

  async fn generate(&self, prompt: String, json_format: bool) -> Result<String> {
    let request = GenerateRequest {
      model: &self.settings.model,
      prompt,
      stream: false,
      format: json_format.then_some("json"),
    };

    let resp = self
      .client
      .post(format!("{}/api/generate", self.settings.base_url))
      .json(&request)
      .send()
      .await
      .map_err(classify_provider_error)?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::ProviderUnavailable(format!(
        "ollama returned status {}",
        status.as_u16()
      )));
    }

    let body: GenerateResponse = resp
      .json()
      .await
      .map_err(|e| Error::InvalidResponse(format!("decoding ollama response: {}", e)))?;
    Ok(body.response)
  }
}

#[async_trait]
impl Provider for OllamaProvider {
  fn name(&self) -> &str {
    "ollama"
  }

  fn model(&self) -> &str {
    &self.settings.model
  }

  async fn analyze(&self, req: AnalysisRequest) -> Result<AnalysisResult> {
    let text = self.generate(analysis_prompt(&req), true).await?;
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
    self.generate(summarize_prompt(logs), false).await
  }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
  model: &'a str,
  prompt: String,
  stream: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  format: Option<&'a str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
  response: String,
}
