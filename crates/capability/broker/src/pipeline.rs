//! 响应校验与在线状态上报（轮询与订阅共用）。

use crate::api::PadiApi;
use crate::error::BrokerError;
use async_trait::async_trait;
use cns_telemetry::{record_status_announced, record_status_failure};
use domain::{Context, OnboardingPayload};
use std::sync::Arc;
use tracing::{info, warn};

/// 在线状态上报抽象。
#[async_trait]
pub trait StatusAnnouncer: Send + Sync {
    async fn announce_online(&self, token: &str) -> Result<(), BrokerError>;
}

#[async_trait]
impl StatusAnnouncer for PadiApi {
    async fn announce_online(&self, token: &str) -> Result<(), BrokerError> {
        self.post_status_online(token).await
    }
}

/// 响应处理流水线：提取字段 → 上报在线 → 产出 Context。
#[derive(Clone)]
pub struct ResponsePipeline {
    announcer: Arc<dyn StatusAnnouncer>,
}

impl ResponsePipeline {
    pub fn new(announcer: Arc<dyn StatusAnnouncer>) -> Self {
        Self { announcer }
    }

    /// 处理一份报文。
    ///
    /// 字段缺失直接返回 [`BrokerError::InvalidResponse`]，不做上报；
    /// 上报只尝试一次，失败时不返回任何凭据。
    pub async fn process(&self, payload: OnboardingPayload) -> Result<Context, BrokerError> {
        let credentials = payload.extract().map_err(|err| {
            warn!(target: "cns.broker", error = %err, "response_invalid");
            BrokerError::from(err)
        })?;

        info!(
            target: "cns.broker",
            thing_id = %credentials.thing_id,
            "status_announce_requested"
        );
        match self.announcer.announce_online(&credentials.token).await {
            Ok(()) => {
                record_status_announced();
                info!(
                    target: "cns.broker",
                    thing_id = %credentials.thing_id,
                    "status_announced"
                );
                Ok(credentials.into_context())
            }
            Err(err) => {
                record_status_failure();
                warn!(
                    target: "cns.broker",
                    thing_id = %credentials.thing_id,
                    error = %err,
                    "status_announce_failed"
                );
                Err(match err {
                    BrokerError::StatusAnnouncementFailed(_) => err,
                    other => BrokerError::StatusAnnouncementFailed(other.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::PayloadError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAnnouncer {
        tokens: Mutex<Vec<String>>,
        fail_with: Option<fn() -> BrokerError>,
    }

    #[async_trait]
    impl StatusAnnouncer for RecordingAnnouncer {
        async fn announce_online(&self, token: &str) -> Result<(), BrokerError> {
            self.tokens.lock().unwrap().push(token.to_string());
            match self.fail_with {
                Some(make_err) => Err(make_err()),
                None => Ok(()),
            }
        }
    }

    fn payload(thing: Option<&str>, token: Option<&str>) -> OnboardingPayload {
        OnboardingPayload {
            thing_id: thing.map(str::to_string),
            token: token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn valid_payload_announces_then_resolves() {
        let announcer = Arc::new(RecordingAnnouncer::default());
        let pipeline = ResponsePipeline::new(announcer.clone());

        let context = pipeline
            .process(payload(Some("thing-1"), Some("tok-1")))
            .await
            .expect("context");

        assert_eq!(context, Context::new("thing-1", "tok-1"));
        assert_eq!(*announcer.tokens.lock().unwrap(), vec!["tok-1".to_string()]);
    }

    #[tokio::test]
    async fn missing_thing_skips_announcement() {
        let announcer = Arc::new(RecordingAnnouncer::default());
        let pipeline = ResponsePipeline::new(announcer.clone());

        let err = pipeline
            .process(payload(None, Some("tok-1")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BrokerError::InvalidResponse(PayloadError::MissingField("padiThing"))
        ));
        assert!(announcer.tokens.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn announcement_failure_withholds_context() {
        let announcer = Arc::new(RecordingAnnouncer {
            fail_with: Some(|| BrokerError::Transport("connection refused".to_string())),
            ..Default::default()
        });
        let pipeline = ResponsePipeline::new(announcer.clone());

        let err = pipeline
            .process(payload(Some("thing-1"), Some("tok-1")))
            .await
            .unwrap_err();

        match err {
            BrokerError::StatusAnnouncementFailed(message) => {
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(announcer.tokens.lock().unwrap().len(), 1);
    }
}
