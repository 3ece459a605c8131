//! LogQL 查询构建模块
//! LogQL query builder module
//!
//! 从结构化参数组装 LogQL 查询字符串。所有方法都是无副作用的纯函数。
//! Assembles LogQL query strings from structured parameters. All methods
//! are pure functions with no side effects.

/// 错误/警告检测查询的输入参数
/// Inputs for error/warning detection queries
#[derive(Debug, Clone, Default)]
pub struct DetectionParams {
  pub service: String,
  pub namespace: String,
  pub levels: Vec<String>,
}

/// 日志搜索查询的输入参数
/// Inputs for log search queries
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
  pub service: String,
  pub namespace: String,
  pub levels: Vec<String>,
  pub keyword: String,
}

/// LogQL 查询构建器，零值即可使用
/// LogQL query builder; the zero value is ready to use
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder;

impl QueryBuilder {
  /// 构建错误/警告检测查询
  /// Build a LogQL query for error/warning detection
  pub fn detection_query(&self, p: &DetectionParams) -> String {
    let mut parts = vec![self.selector(&p.service, &p.namespace)];

    if let Some(lf) = self.level_filter(&p.levels) {
      parts.push(lf);
    }

    parts.join(" ")
  }

  /// 构建日志搜索查询
  /// Build a LogQL query for smart search
  ///
  /// 各部分按 选择器、关键字、级别 的固定顺序以单个空格连接
  /// Parts are joined by single spaces in selector, keyword, level order
  pub fn search_query(&self, p: &SearchParams) -> String {
    let mut parts = vec![self.selector(&p.service, &p.namespace)];

    if let Some(kf) = self.keyword_filter(&p.keyword) {
      parts.push(kf);
    }
    if let Some(lf) = self.level_filter(&p.levels) {
      parts.push(lf);
    }

    parts.join(" ")
  }

  fn selector(&self, service: &str, namespace: &str) -> String {
    if namespace.is_empty() {
      format!(r#"{{service="{}"}}"#, service)
    } else {
      format!(r#"{{service="{}", namespace="{}"}}"#, service, namespace)
    }
  }

  fn level_filter(&self, levels: &[String]) -> Option<String> {
    if levels.is_empty() {
      return None;
    }
    let lower: Vec<String> = levels.iter().map(|l| l.to_lowercase()).collect();
    Some(format!(r#"| level =~ "(?i)({})""#, lower.join("|")))
  }

  /// 关键字作为精确子串过滤器追加，使用反引号分隔符。
  /// 关键字原样流向后端，由调用方负责输入校验。
  /// The keyword is appended as an exact-substring filter with back-tick
  /// delimiters. It flows to the backend verbatim; callers are
  /// responsible for input validation.
  fn keyword_filter(&self, keyword: &str) -> Option<String> {
    if keyword.is_empty() {
      return None;
    }
    Some(format!("|= `{}`", keyword))
  }
}
