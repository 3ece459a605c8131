//! Loki HTTP 客户端实现
//! Loki HTTP client implementation
//!
//! 通过 Loki 的 HTTP API 执行查询，并在边界处将传输错误归并为三类：
//! unreachable、timeout、query error。
//! Executes queries against Loki's HTTP API and collapses transport
//! errors into three kinds at the boundary: unreachable, timeout, and
//! query error.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::loki::{LokiClient, QueryRangeRequest};
use crate::models::LogLine;

/// Loki HTTP 客户端
/// Loki HTTP client
pub struct HttpLokiClient {
  base_url: String,
  username: Option<String>,
  password: Option<String>,
  org_id: Option<String>,
  client: reqwest::Client,
}

impl HttpLokiClient {
  /// 创建新的 Loki HTTP 客户端
  /// Create a new Loki HTTP client
  pub fn new(
    base_url: impl Into<String>,
    username: Option<String>,
    password: Option<String>,
    org_id: Option<String>,
    timeout: Duration,
  ) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| Error::config(format!("building loki http client: {}", e)))?;
    Ok(Self {
      base_url: base_url.into().trim_end_matches('/').to_string(),
      username,
      password,
      org_id,
      client,
    })
  }

  /// 附加可选的 Basic 认证和 X-Scope-OrgID 头
  /// Attach optional basic auth and the X-Scope-OrgID header
  fn with_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    let req = match (&self.username, &self.password) {
      (Some(user), Some(pass)) => req.basic_auth(user, Some(pass)),
      _ => req,
    };
    match &self.org_id {
      Some(org_id) => req.header("X-Scope-OrgID", org_id),
      None => req,
    }
  }

  async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
    let resp = self
      .with_headers(self.client.get(url))
      .send()
      .await
      .map_err(classify_error)?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::LokiQueryError {
        status: status.as_u16(),
      });
    }

    resp
      .json::<T>()
      .await
      .map_err(|e| Error::other(format!("decoding loki response: {}", e)))
  }
}

#[async_trait]
impl LokiClient for HttpLokiClient {
  async fn query_range(&self, req: QueryRangeRequest) -> Result<Vec<LogLine>> {
    let start = req.start.timestamp_nanos_opt().unwrap_or_default();
    let end = req.end.timestamp_nanos_opt().unwrap_or_default();

    let mut params = vec![
      ("query", req.query.clone()),
      ("start", start.to_string()),
      ("end", end.to_string()),
      ("direction", req.direction.as_str().to_string()),
    ];
    if req.limit > 0 {
      params.push(("limit", req.limit.to_string()));
    }

    let url = format!("{}/loki/api/v1/query_range", self.base_url);
    let resp = self
      .with_headers(self.client.get(&url).query(&params))
      .send()
      .await
      .map_err(classify_error)?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::LokiQueryError {
        status: status.as_u16(),
      });
    }

    let body: LokiQueryResponse = resp
      .json()
      .await
      .map_err(|e| Error::other(format!("decoding loki response: {}", e)))?;

    Ok(parse_streams(body.data.result))
  }

  async fn labels(&self) -> Result<Vec<String>> {
    let url = format!("{}/loki/api/v1/labels", self.base_url);
    let resp: LokiLabelsResponse = self.get_json(&url).await?;
    Ok(resp.data)
  }

  async fn label_values(&self, label: &str) -> Result<Vec<String>> {
    let url = format!("{}/loki/api/v1/label/{}/values", self.base_url, label);
    let resp: LokiLabelsResponse = self.get_json(&url).await?;
    Ok(resp.data)
  }

  async fn ready(&self) -> Result<()> {
    let url = format!("{}/ready", self.base_url);
    let resp = self
      .with_headers(self.client.get(&url))
      .send()
      .await
      .map_err(|e| Error::LokiUnreachable(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::LokiUnreachable(format!(
        "loki not ready (status {})",
        status.as_u16()
      )));
    }
    Ok(())
  }
}

/// 将传输层错误归并为哨兵错误类别
/// Collapse transport-level errors into sentinel error kinds
fn classify_error(err: reqwest::Error) -> Error {
  if err.is_timeout() {
    Error::LokiTimeout(err.to_string())
  } else {
    Error::LokiUnreachable(err.to_string())
  }
}

/// 将 Loki 流结果转换为扁平的日志行序列
/// Convert Loki stream results into a flat sequence of log lines
fn parse_streams(streams: Vec<LokiStream>) -> Vec<LogLine> {
  let mut lines = Vec::new();
  for stream in streams {
    let level = stream.stream.get("level").cloned().unwrap_or_default();
    for (ts, message) in stream.values {
      let nanos: i64 = ts.parse().unwrap_or_default();
      lines.push(LogLine {
        timestamp: chrono::DateTime::from_timestamp_nanos(nanos),
        message,
        labels: stream.stream.clone(),
        level: level.clone(),
      });
    }
  }
  lines
}

// --- Loki 响应类型 / Loki response types ---

#[derive(Debug, Deserialize)]
struct LokiQueryResponse {
  data: LokiData,
}

#[derive(Debug, Deserialize)]
struct LokiData {
  result: Vec<LokiStream>,
}

#[derive(Debug, Deserialize)]
struct LokiStream {
  stream: HashMap<String, String>,
  values: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct LokiLabelsResponse {
  data: Vec<String>,
}
