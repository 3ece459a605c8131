//! 错误聚类引擎
//! Error clustering engine
//!
//! 将时间上无序的日志行转换为稳定、紧凑的分组集合，对时间戳、地址、UUID
//! 等表面差异保持不变。
//! Turns a chronologically unordered list of log lines into a stable,
//! compact set of groups that survives cosmetic variability such as
//! timestamps, addresses and UUIDs.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{ErrorCluster, LogLine};

/// 归一化后消息的最大字节数
/// Maximum byte length of a normalized message
const MAX_NORMALIZED_BYTES: usize = 500;

/// 样本消息的最大字节数
/// Maximum byte length of a sample message
const MAX_SAMPLE_BYTES: usize = 2000;

// Normalization regexes compiled once at first use.
static RE_DATETIME: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?\s*").unwrap()
});
static RE_HEX_ADDR: Lazy<Regex> = Lazy::new(|| Regex::new(r"0x[0-9a-fA-F]+").unwrap());
static RE_UUID: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});
static RE_BRACKET_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").unwrap());
static RE_PAREN_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\d+\)").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// 对日志消息应用全部归一化规则
/// Apply all normalization rules to a log message
///
/// 规则按固定顺序执行：去掉前导 ISO-8601 时间戳、替换十六进制地址为
/// 0xADDR、替换 UUID、替换方括号/圆括号内的数字、折叠空白、转小写、
/// 去首尾空白、按 UTF-8 边界截断到 500 字节。归一化是幂等的。
/// Rules run in a fixed order: strip a leading ISO-8601 datetime, replace
/// hex addresses with 0xADDR, replace UUIDs, replace bracketed and
/// parenthesized integers, collapse whitespace, lowercase, trim, and
/// truncate to 500 bytes at a UTF-8 boundary. Normalization is
/// idempotent.
pub fn normalize_message(msg: &str) -> String {
  let msg = RE_DATETIME.replace(msg, "");
  let msg = RE_HEX_ADDR.replace_all(&msg, "0xADDR");
  let msg = RE_UUID.replace_all(&msg, "UUID");
  let msg = RE_BRACKET_NUM.replace_all(&msg, "[N]");
  let msg = RE_PAREN_NUM.replace_all(&msg, "(N)");
  let msg = RE_WHITESPACE.replace_all(&msg, " ");
  let msg = msg.to_lowercase();
  let msg = msg.trim();
  truncate_utf8(msg, MAX_NORMALIZED_BYTES).to_string()
}

/// 计算日志消息的稳定 SHA-256 指纹（小写十六进制）
/// Compute a stable SHA-256 fingerprint (lowercase hex) for a log message
pub fn fingerprint(message: &str) -> String {
  let normalized = normalize_message(message);
  format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

/// 将日志级别映射为数值严重度
/// Map a log level string to a numeric severity
///
/// FATAL > CRITICAL > ERROR > WARN = WARNING > 其他
/// FATAL > CRITICAL > ERROR > WARN = WARNING > everything else
pub fn level_severity(level: &str) -> u8 {
  match level.to_uppercase().as_str() {
    "FATAL" => 4,
    "CRITICAL" => 3,
    "ERROR" => 2,
    "WARN" | "WARNING" => 1,
    _ => 0,
  }
}

/// 在不切断 UTF-8 字符的前提下将字符串截断到 max_bytes 字节
/// Truncate a string to at most max_bytes bytes without splitting a
/// UTF-8 character
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
  if s.len() <= max_bytes {
    return s;
  }
  let mut end = max_bytes;
  while end > 0 && !s.is_char_boundary(end) {
    end -= 1;
  }
  &s[..end]
}

/// 按指纹将日志行分组为去重的错误聚类
/// Group log lines into deduplicated error clusters by fingerprint
///
/// 返回的序列按 (count 降序, 严重度降序) 排序；空输入返回空序列。
/// The returned sequence is sorted by (count descending, severity
/// descending); empty input yields an empty sequence.
pub fn cluster_lines(
  lines: &[LogLine],
  tenant_id: Uuid,
  service: &str,
  namespace: &str,
) -> Vec<ErrorCluster> {
  if lines.is_empty() {
    return Vec::new();
  }

  struct ClusterState {
    level: String,
    count: i64,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    sample_message: String,
  }

  let mut groups: HashMap<String, ClusterState> = HashMap::new();

  for line in lines {
    let fp = fingerprint(&line.message);
    let state = groups.entry(fp).or_insert_with(|| ClusterState {
      level: line.level.clone(),
      count: 0,
      first_seen: line.timestamp,
      last_seen: line.timestamp,
      sample_message: truncate_utf8(&line.message, MAX_SAMPLE_BYTES).to_string(),
    });

    state.count += 1;
    if line.timestamp < state.first_seen {
      state.first_seen = line.timestamp;
    }
    if line.timestamp > state.last_seen {
      state.last_seen = line.timestamp;
    }
    if level_severity(&line.level) > level_severity(&state.level) {
      state.level = line.level.clone();
    }
  }

  let now = Utc::now();
  let mut clusters: Vec<ErrorCluster> = groups
    .into_iter()
    .map(|(fp, state)| ErrorCluster {
      id: Uuid::new_v4(),
      tenant_id,
      service: service.to_string(),
      namespace: namespace.to_string(),
      fingerprint: fp,
      level: state.level,
      first_seen_at: state.first_seen,
      last_seen_at: state.last_seen,
      count: state.count,
      sample_message: state.sample_message,
      created_at: now,
      updated_at: now,
    })
    .collect();

  clusters.sort_by(|a, b| {
    b.count
      .cmp(&a.count)
      .then_with(|| level_severity(&b.level).cmp(&level_severity(&a.level)))
  });

  clusters
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use std::collections::HashMap;

  fn line(ts_secs: i64, message: &str, level: &str) -> LogLine {
    LogLine {
      timestamp: Utc.timestamp_opt(ts_secs, 0).unwrap(),
      message: message.to_string(),
      labels: HashMap::new(),
      level: level.to_string(),
    }
  }

  #[test]
  fn test_normalize_strips_leading_datetime() {
    assert_eq!(
      normalize_message("2024-02-17T01:47:32.123Z connection refused"),
      "connection refused"
    );
    assert_eq!(
      normalize_message("2024-02-17 01:47:32 connection refused"),
      "connection refused"
    );
    assert_eq!(
      normalize_message("2024-02-17T01:47:32+05:30 connection refused"),
      "connection refused"
    );
  }

  #[test]
  fn test_normalize_replaces_variable_parts() {
    assert_eq!(
      normalize_message("segfault at 0x7fff5fc00000 in main"),
      "segfault at 0xaddr in main"
    );
    assert_eq!(
      normalize_message("request 550e8400-e29b-41d4-a716-446655440000 failed"),
      "request uuid failed"
    );
    assert_eq!(normalize_message("goroutine [42] panic"), "goroutine [n] panic");
    assert_eq!(
      normalize_message("error code (500) at line (42)"),
      "error code (n) at line (n)"
    );
  }

  #[test]
  fn test_normalize_whitespace_and_case() {
    assert_eq!(normalize_message("too   many    spaces"), "too many spaces");
    assert_eq!(normalize_message("Connection REFUSED"), "connection refused");
  }

  #[test]
  fn test_normalize_combined() {
    let input = "2024-02-17T01:47:32.123Z ERROR at 0xFF addr \
                 550e8400-e29b-41d4-a716-446655440000 goroutine [42]  panic (500)";
    assert_eq!(
      normalize_message(input),
      "error at 0xaddr addr uuid goroutine [n] panic (n)"
    );
  }

  #[test]
  fn test_normalize_truncates_to_500_bytes() {
    let long = "a".repeat(600);
    assert_eq!(normalize_message(&long).len(), 500);
  }

  #[test]
  fn test_normalize_is_idempotent() {
    let inputs = [
      "2024-02-17T01:47:32Z request 550e8400-e29b-41d4-a716-446655440000 at 0xFF [12]",
      "Connection   REFUSED",
      "plain message",
    ];
    for input in inputs {
      let once = normalize_message(input);
      assert_eq!(normalize_message(&once), once);
    }
  }

  #[test]
  fn test_fingerprint_stable_across_timestamps() {
    let fp1 = fingerprint("2024-02-17T01:47:32.123Z connection refused");
    let fp2 = fingerprint("2024-02-17T02:30:00Z connection refused");
    assert_eq!(fp1, fp2);
    assert_eq!(fp1, fingerprint("connection refused"));
  }

  #[test]
  fn test_fingerprint_stable_across_uuids() {
    let fp1 = fingerprint("request 550e8400-e29b-41d4-a716-446655440000 failed");
    let fp2 = fingerprint("request 123e4567-e89b-12d3-a456-426614174000 failed");
    assert_eq!(fp1, fp2);
  }

  #[test]
  fn test_fingerprint_differs_for_different_messages() {
    assert_ne!(
      fingerprint("connection refused to database"),
      fingerprint("timeout waiting for response")
    );
  }

  #[test]
  fn test_fingerprint_is_lowercase_hex() {
    let fp = fingerprint("test message");
    assert_eq!(fp.len(), 64);
    assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
  }

  #[test]
  fn test_level_severity_ordering() {
    assert!(level_severity("FATAL") > level_severity("CRITICAL"));
    assert!(level_severity("CRITICAL") > level_severity("error"));
    assert!(level_severity("error") > level_severity("warn"));
    assert_eq!(level_severity("warn"), level_severity("WARNING"));
    assert_eq!(level_severity("info"), 0);
    assert_eq!(level_severity(""), 0);
  }

  #[test]
  fn test_truncate_utf8_respects_boundaries() {
    // 每个字符占 3 字节
    // Each character is 3 bytes
    let s = "日本語テスト";
    let truncated = truncate_utf8(s, 7);
    assert_eq!(truncated, "日本");
    assert!(truncated.len() <= 7);

    assert_eq!(truncate_utf8("short", 100), "short");
  }

  #[test]
  fn test_cluster_empty_input() {
    let clusters = cluster_lines(&[], Uuid::new_v4(), "api", "prod");
    assert!(clusters.is_empty());
  }

  #[test]
  fn test_cluster_ordering_by_count_then_severity() {
    let lines = vec![
      line(100, "warn msg", "warn"),
      line(101, "warn msg", "warn"),
      line(102, "error msg", "error"),
      line(103, "error msg", "error"),
      line(104, "fatal msg", "fatal"),
    ];
    let clusters = cluster_lines(&lines, Uuid::new_v4(), "api", "prod");

    assert_eq!(clusters.len(), 3);
    assert_eq!((clusters[0].count, clusters[0].level.as_str()), (2, "error"));
    assert_eq!((clusters[1].count, clusters[1].level.as_str()), (2, "warn"));
    assert_eq!((clusters[2].count, clusters[2].level.as_str()), (1, "fatal"));
  }

  #[test]
  fn test_cluster_merges_by_fingerprint() {
    let tenant_id = Uuid::new_v4();
    let lines = vec![
      line(100, "2024-02-17T01:00:00Z oom killed", "error"),
      line(200, "2024-02-17T02:00:00Z oom killed", "fatal"),
      line(150, "2024-02-17T01:30:00Z oom killed", "warn"),
    ];
    let clusters = cluster_lines(&lines, tenant_id, "api", "prod");

    assert_eq!(clusters.len(), 1);
    let c = &clusters[0];
    assert_eq!(c.count, 3);
    assert_eq!(c.tenant_id, tenant_id);
    // 级别取观测到的最高严重度
    // Level is the highest observed severity
    assert_eq!(c.level, "fatal");
    assert_eq!(c.first_seen_at, Utc.timestamp_opt(100, 0).unwrap());
    assert_eq!(c.last_seen_at, Utc.timestamp_opt(200, 0).unwrap());
    // 样本消息保留第一条原始消息
    // The sample keeps the first raw message
    assert_eq!(c.sample_message, "2024-02-17T01:00:00Z oom killed");
  }
}
