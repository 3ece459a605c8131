//! # LogHunter
//!
//! LogHunter 接收操作者意图（“在时间窗口 W 内分析服务 X”），从 Loki
//! 拉取日志，按内容稳定指纹聚类错误，将异步 AI 推理作业路由到可插拔的
//! 提供方，并在多租户隔离下持久化诊断结果。
//!
//! LogHunter ingests operator intent ("analyze service X over time
//! window W"), pulls logs from Loki, clusters errors by content-stable
//! fingerprint, routes asynchronous AI inference jobs to a pluggable
//! provider, and persists diagnoses under multi-tenant isolation.
//!
//! ## 组件 / Components
//!
//! - [`logql`]: 查询构建 / query construction
//! - [`loki`]: 日志后端客户端 / log backend client
//! - [`cluster`]: 指纹与聚类 / fingerprinting and clustering
//! - [`store`]: 租户分区的持久化 / tenant-partitioned persistence
//! - [`cache`]: 带 TTL 的临时缓存 / ephemeral cache with TTL
//! - [`providers`]: 推理后端抽象 / inference backend abstraction
//! - [`service`]: 分析编排器 / the analysis orchestrator

pub mod cache;
pub mod cluster;
pub mod error;
pub mod logql;
pub mod loki;
pub mod models;
pub mod providers;
pub mod service;
pub mod store;

pub use error::{Error, Result};
