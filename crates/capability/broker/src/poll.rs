//! HTTP 轮询策略
//!
//! `Idle → Requesting → {Succeeded | Failed → (interval) → Requesting}`
//!
//! 传输错误按固定间隔重试（默认无上限、无退避）；拿到语法合法的响应后交给
//! [`ResponsePipeline`]，报文结构错误直接失败，不再轮询。

use crate::api::PadiApi;
use crate::error::BrokerError;
use crate::pipeline::ResponsePipeline;
use cns_telemetry::{record_poll_attempt, record_poll_failure};
use domain::{Context, OnboardingPayload};
use std::time::Duration;
use tracing::{info, warn};

/// 默认轮询间隔（毫秒）。
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// 重试策略。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 两次请求之间的固定间隔。
    pub interval: Duration,
    /// 连续传输失败的次数上限，`None` 表示不限。
    pub max_attempts: Option<u32>,
    /// 获取阶段的截止时间（不含在线状态上报），`None` 表示不限。
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }
}

impl RetryPolicy {
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            deadline: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn exhausted(&self, attempt: u32) -> bool {
        matches!(self.max_attempts, Some(max) if attempt >= max)
    }
}

/// HTTP 轮询策略。
pub struct PollingStrategy {
    api: PadiApi,
    pipeline: ResponsePipeline,
    policy: RetryPolicy,
}

impl PollingStrategy {
    pub fn new(api: PadiApi, pipeline: ResponsePipeline, policy: RetryPolicy) -> Self {
        Self {
            api,
            pipeline,
            policy,
        }
    }

    pub async fn get_context(&self, code: &str) -> Result<Context, BrokerError> {
        let body = match self.policy.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.poll(code))
                .await
                .map_err(|_| BrokerError::DeadlineElapsed(deadline))??,
            None => self.poll(code).await?,
        };
        let payload = OnboardingPayload::from_value(body)?;
        self.pipeline.process(payload).await
    }

    /// 顺序轮询，直到拿到语法合法的响应体。
    async fn poll(&self, code: &str) -> Result<serde_json::Value, BrokerError> {
        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            record_poll_attempt();
            info!(target: "cns.broker", code = %code, attempt = attempt, "onboarding_poll");

            match self.api.fetch_onboarding(code).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_transient() => {
                    record_poll_failure();
                    if self.policy.exhausted(attempt) {
                        warn!(
                            target: "cns.broker",
                            code = %code,
                            attempt = attempt,
                            error = %err,
                            "onboarding_poll_exhausted"
                        );
                        return Err(BrokerError::RetriesExhausted {
                            attempts: attempt,
                            last_error: err.to_string(),
                        });
                    }
                    info!(
                        target: "cns.broker",
                        code = %code,
                        attempt = attempt,
                        error = %err,
                        retry_in_ms = self.policy.interval.as_millis() as u64,
                        "onboarding_poll_retry"
                    );
                    tokio::time::sleep(self.policy.interval).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_unbounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.interval, Duration::from_millis(5000));
        assert!(policy.max_attempts.is_none());
        assert!(policy.deadline.is_none());
        assert!(!policy.exhausted(u32::MAX));
    }

    #[test]
    fn max_attempts_bounds_retries() {
        let policy = RetryPolicy::unbounded(Duration::from_millis(10)).with_max_attempts(3);
        assert!(!policy.exhausted(2));
        assert!(policy.exhausted(3));
    }

    #[test]
    fn zero_max_attempts_still_polls_once() {
        let policy = RetryPolicy::unbounded(Duration::from_millis(10)).with_max_attempts(0);
        assert_eq!(policy.max_attempts, Some(1));
    }
}
