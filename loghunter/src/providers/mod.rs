//! AI 提供方抽象模块
//! AI provider abstraction module
//!
//! 定义了在可互换的推理后端之上的统一 analyze / summarize 契约。
//! 提供方在启动时根据配置选择一次，之后始终通过抽象接口调用，
//! 不允许热切换，也绝不向下转型。
//! Defines the uniform analyze / summarize contract over interchangeable
//! inference backends. The provider is selected once at startup from
//! configuration and is always invoked through the abstract interface;
//! implementations may not be hot-swapped and calls never downcast.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{AnalysisRequest, AnalysisResult, LogLine};

mod anthropic;
mod mock;
mod ollama;
mod openai;
mod vllm;

pub use anthropic::AnthropicProvider;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use vllm::VllmProvider;

/// AI 提供方接口
/// AI provider trait
///
/// 取消通过丢弃返回的 future 传递；编排器负责施加推理截止时间，
/// 超时与取消都以 inference_timeout 错误浮出
/// Cancellation propagates by dropping the returned future; the
/// orchestrator imposes the inference deadline, and both timeout and
/// cancellation surface as the inference-timeout error
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
  /// 稳定的提供方标识符（如 "ollama"、"openai"）
  /// Stable provider identifier (e.g. "ollama", "openai")
  fn name(&self) -> &str;

  /// 配置的模型名
  /// Configured model name
  fn model(&self) -> &str;

  /// 对错误聚类执行根因分析
  /// Perform root cause analysis on an error cluster
  async fn analyze(&self, req: AnalysisRequest) -> Result<AnalysisResult>;

  /// 将日志行浓缩为通俗摘要
  /// Condense log lines into a plain-language summary
  async fn summarize(&self, logs: &[LogLine]) -> Result<String>;
}

/// Ollama 提供方设置
/// Ollama provider settings
#[derive(Debug, Clone)]
pub struct OllamaSettings {
  pub base_url: String,
  pub model: String,
}

/// vLLM 提供方设置
/// vLLM provider settings
#[derive(Debug, Clone)]
pub struct VllmSettings {
  pub base_url: String,
  pub model: String,
}

/// OpenAI 提供方设置
/// OpenAI provider settings
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
  pub api_key: String,
  pub model: String,
}

/// Anthropic 提供方设置
/// Anthropic provider settings
#[derive(Debug, Clone)]
pub struct AnthropicSettings {
  pub api_key: String,
  pub model: String,
}

/// 提供方选择与各后端参数
/// Provider selection plus per-backend parameters
#[derive(Debug, Clone)]
pub struct ProviderSettings {
  /// 选定的提供方名称
  /// Selected provider name
  pub provider: String,
  /// 单次推理的截止时间
  /// Per-inference deadline
  pub inference_timeout: Duration,
  pub ollama: OllamaSettings,
  pub vllm: VllmSettings,
  pub openai: OpenAiSettings,
  pub anthropic: AnthropicSettings,
}

/// 根据配置构造提供方，进程启动时调用一次
/// Construct the provider from configuration; called once at startup
pub fn new_provider(settings: &ProviderSettings) -> Result<Arc<dyn Provider>> {
  match settings.provider.as_str() {
    "ollama" => Ok(Arc::new(OllamaProvider::new(
      settings.ollama.clone(),
      settings.inference_timeout,
    )?)),
    "vllm" => Ok(Arc::new(VllmProvider::new(
      settings.vllm.clone(),
      settings.inference_timeout,
    )?)),
    "openai" => Ok(Arc::new(OpenAiProvider::new(
      settings.openai.clone(),
      settings.inference_timeout,
    )?)),
    "anthropic" => Ok(Arc::new(AnthropicProvider::new(
      settings.anthropic.clone(),
      settings.inference_timeout,
    )?)),
    "mock" => Ok(Arc::new(MockProvider::new())),
    other => Err(Error::config(format!(
      "unknown AI provider \"{}\": must be one of ollama, vllm, openai, anthropic",
      other
    ))),
  }
}

/// 构建根因分析提示词
/// Build the root cause analysis prompt
pub(crate) fn analysis_prompt(req: &AnalysisRequest) -> String {
  let mut prompt = String::new();
  prompt.push_str(
    "You are a site reliability engineer. Analyze the following error \
     cluster and its surrounding log context, then answer with a single \
     JSON object with the fields \"root_cause\" (string), \"confidence\" \
     (number between 0 and 1), \"summary\" (string) and \
     \"suggested_action\" (string, optional). Respond with JSON only.\n\n",
  );
  prompt.push_str(&format!(
    "Service: {}\nNamespace: {}\nLevel: {}\nOccurrences: {}\nSample message: {}\n",
    req.cluster.service,
    req.cluster.namespace,
    req.cluster.level,
    req.cluster.count,
    req.cluster.sample_message,
  ));
  if !req.context_logs.is_empty() {
    prompt.push_str("\nContext logs:\n");
    for line in &req.context_logs {
      prompt.push_str(&format!(
        "{} [{}] {}\n",
        line.timestamp.to_rfc3339(),
        line.level,
        line.message
      ));
    }
  }
  prompt
}

/// 构建日志总结提示词
/// Build the log summarization prompt
pub(crate) fn summarize_prompt(logs: &[LogLine]) -> String {
  let mut prompt = String::new();
  prompt.push_str(
    "You are a site reliability engineer. Summarize the notable events, \
     errors and patterns in the following log lines in plain language. \
     Keep the summary short.\n\n",
  );
  for line in logs {
    prompt.push_str(&format!(
      "{} [{}] {}\n",
      line.timestamp.to_rfc3339(),
      line.level,
      line.message
    ));
  }
  prompt
}

/// 模型返回的分析负载
/// Analysis payload returned by the model
#[derive(Debug, Deserialize)]
pub(crate) struct ParsedAnalysis {
  pub root_cause: String,
  pub confidence: f64,
  pub summary: String,
  #[serde(default)]
  pub suggested_action: Option<String>,
}

/// 从模型输出文本中解析分析 JSON
/// Parse the analysis JSON out of the model's output text
///
/// 容忍 Markdown 代码围栏和 JSON 前后的杂散文本
/// Tolerates markdown code fences and stray text around the JSON
pub(crate) fn parse_analysis_response(text: &str) -> Result<ParsedAnalysis> {
  let start = text.find('{');
  let end = text.rfind('}');
  let json = match (start, end) {
    (Some(start), Some(end)) if start < end => &text[start..=end],
    _ => {
      return Err(Error::InvalidResponse(format!(
        "no JSON object in provider output: {}",
        crate::cluster::truncate_utf8(text, 200)
      )))
    }
  };
  serde_json::from_str(json)
    .map_err(|e| Error::InvalidResponse(format!("malformed analysis JSON: {}", e)))
}

/// 将传输层错误归并为提供方错误类别
/// Collapse transport-level errors into provider error kinds
pub(crate) fn classify_provider_error(err: reqwest::Error) -> Error {
  if err.is_timeout() {
    Error::InferenceTimeout
  } else {
    Error::ProviderUnavailable(err.to_string())
  }
}

/// 构建带超时的推理 HTTP 客户端
/// Build the inference HTTP client with a timeout
pub(crate) fn inference_client(timeout: Duration) -> Result<reqwest::Client> {
  reqwest::Client::builder()
    .timeout(timeout)
    .build()
    .map_err(|e| Error::config(format!("building inference http client: {}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;
  use std::collections::HashMap;
  use uuid::Uuid;

  fn sample_request() -> AnalysisRequest {
    let now = Utc::now();
    AnalysisRequest {
      cluster: crate::models::ErrorCluster {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        service: "api".to_string(),
        namespace: "prod".to_string(),
        fingerprint: "abc".to_string(),
        level: "error".to_string(),
        first_seen_at: now,
        last_seen_at: now,
        count: 12,
        sample_message: "connection refused".to_string(),
        created_at: now,
        updated_at: now,
      },
      context_logs: vec![LogLine {
        timestamp: now,
        message: "dial tcp 10.0.0.1:5432: connection refused".to_string(),
        labels: HashMap::new(),
        level: "error".to_string(),
      }],
    }
  }

  #[test]
  fn test_analysis_prompt_contains_cluster_fields() {
    let prompt = analysis_prompt(&sample_request());
    assert!(prompt.contains("Service: api"));
    assert!(prompt.contains("Namespace: prod"));
    assert!(prompt.contains("connection refused"));
    assert!(prompt.contains("Context logs:"));
  }

  #[test]
  fn test_parse_analysis_response_plain_json() {
    let parsed = parse_analysis_response(
      r#"{"root_cause":"OOM","confidence":0.85,"summary":"Out of memory"}"#,
    )
    .unwrap();
    assert_eq!(parsed.root_cause, "OOM");
    assert_eq!(parsed.confidence, 0.85);
    assert_eq!(parsed.summary, "Out of memory");
    assert!(parsed.suggested_action.is_none());
  }

  #[test]
  fn test_parse_analysis_response_with_fences() {
    let text = "Here is my analysis:\n```json\n{\"root_cause\":\"disk full\",\
                \"confidence\":0.6,\"summary\":\"s\",\"suggested_action\":\"clean up\"}\n```";
    let parsed = parse_analysis_response(text).unwrap();
    assert_eq!(parsed.root_cause, "disk full");
    assert_eq!(parsed.suggested_action.as_deref(), Some("clean up"));
  }

  #[test]
  fn test_parse_analysis_response_invalid() {
    let err = parse_analysis_response("the model refused to answer").unwrap_err();
    assert!(matches!(err, Error::InvalidResponse(_)));

    let err = parse_analysis_response(r#"{"root_cause": 42}"#).unwrap_err();
    assert!(matches!(err, Error::InvalidResponse(_)));
  }

  #[test]
  fn test_factory_rejects_unknown_provider() {
    let settings = ProviderSettings {
      provider: "skynet".to_string(),
      inference_timeout: Duration::from_secs(60),
      ollama: OllamaSettings {
        base_url: "http://localhost:11434".to_string(),
        model: "llama3".to_string(),
      },
      vllm: VllmSettings {
        base_url: "http://localhost:8000".to_string(),
        model: String::new(),
      },
      openai: OpenAiSettings {
        api_key: String::new(),
        model: "gpt-4".to_string(),
      },
      anthropic: AnthropicSettings {
        api_key: String::new(),
        model: "claude-sonnet-4-5".to_string(),
      },
    };
    let err = new_provider(&settings).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
  }

  #[test]
  fn test_factory_builds_each_provider() {
    let mut settings = ProviderSettings {
      provider: "ollama".to_string(),
      inference_timeout: Duration::from_secs(60),
      ollama: OllamaSettings {
        base_url: "http://localhost:11434".to_string(),
        model: "llama3".to_string(),
      },
      vllm: VllmSettings {
        base_url: "http://localhost:8000".to_string(),
        model: "qwen".to_string(),
      },
      openai: OpenAiSettings {
        api_key: "sk-test".to_string(),
        model: "gpt-4".to_string(),
      },
      anthropic: AnthropicSettings {
        api_key: "sk-ant-test".to_string(),
        model: "claude-sonnet-4-5".to_string(),
      },
    };

    for (name, expected_model) in [
      ("ollama", "llama3"),
      ("vllm", "qwen"),
      ("openai", "gpt-4"),
      ("anthropic", "claude-sonnet-4-5"),
      ("mock", "mock-v1"),
    ] {
      settings.provider = name.to_string();
      let provider = new_provider(&settings).unwrap();
      assert_eq!(provider.name(), name);
      assert_eq!(provider.model(), expected_model);
    }
  }
}
