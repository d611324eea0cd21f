//! 日志初始化、入网计数器与会话 ID。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 入网计数器快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub poll_attempts: u64,
    pub poll_failures: u64,
    pub messages_received: u64,
    pub status_announced: u64,
    pub status_failures: u64,
}

/// 入网计数器（进程级）。
pub struct TelemetryMetrics {
    poll_attempts: AtomicU64,
    poll_failures: AtomicU64,
    messages_received: AtomicU64,
    status_announced: AtomicU64,
    status_failures: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            poll_attempts: AtomicU64::new(0),
            poll_failures: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            status_announced: AtomicU64::new(0),
            status_failures: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            poll_attempts: self.poll_attempts.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            status_announced: self.status_announced.load(Ordering::Relaxed),
            status_failures: self.status_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，输出到 stderr）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// 生成新的会话 ID（用于日志关联与 MQTT client_id）。
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录轮询请求次数。
pub fn record_poll_attempt() {
    metrics().poll_attempts.fetch_add(1, Ordering::Relaxed);
}

/// 记录轮询失败（将重试）次数。
pub fn record_poll_failure() {
    metrics().poll_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录订阅主题上收到的消息数。
pub fn record_message_received() {
    metrics().messages_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录在线状态上报成功次数。
pub fn record_status_announced() {
    metrics().status_announced.fetch_add(1, Ordering::Relaxed);
}

/// 记录在线状态上报失败次数。
pub fn record_status_failure() {
    metrics().status_failures.fetch_add(1, Ordering::Relaxed);
}
