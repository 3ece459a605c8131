//! Shared application state
//!
//! The dependency record built once at startup and passed explicitly to
//! handlers and middleware. No global mutable state exists beyond the
//! pooled clients it holds.

use loghunter::cache::Cache;
use loghunter::service::AnalysisService;
use loghunter::store::Store;
use std::sync::Arc;

/// Dependency record shared across handlers
#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn Store>,
  pub cache: Arc<dyn Cache>,
  pub service: Arc<AnalysisService>,
  pub rate_limit_per_minute: i64,
}
