//! Padi broker：按配置的传输方式分发到轮询或订阅策略。

use crate::api::PadiApi;
use crate::error::BrokerError;
use crate::pipeline::ResponsePipeline;
use crate::poll::{PollingStrategy, RetryPolicy};
use crate::subscribe::{MqttConnector, SubscriptionStrategy, TransportConnector};
use crate::ContextBroker;
use async_trait::async_trait;
use domain::Context;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 传输方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Http,
    Mqtt,
}

impl FromStr for TransportMode {
    type Err = BrokerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "http" => Ok(Self::Http),
            "mqtt" => Ok(Self::Mqtt),
            other => Err(BrokerError::InvalidMode(other.to_string())),
        }
    }
}

/// broker 配置（构造时传入，调用期间只读）。
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub api_url: String,
    pub mqtt_url: String,
    /// 原始配置值，未知值在 `get_context` 时以 `InvalidMode` 失败。
    pub mode: String,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub mqtt_qos: u8,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.padi.io".to_string(),
            mqtt_url: "wss://cns.padi.io:1881".to_string(),
            mode: "http".to_string(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            mqtt_qos: 1,
        }
    }
}

/// Padi 入网 broker。
pub struct PadiBroker {
    config: BrokerConfig,
    connector: Option<Arc<dyn TransportConnector>>,
}

impl PadiBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            connector: None,
        }
    }

    /// 替换订阅模式下的连接器（默认按 `mqtt_url` 建立 rumqttc 连接）。
    pub fn with_connector(mut self, connector: Arc<dyn TransportConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    fn connector(&self) -> Result<Arc<dyn TransportConnector>, BrokerError> {
        match &self.connector {
            Some(connector) => Ok(connector.clone()),
            None => Ok(Arc::new(MqttConnector::new(
                &self.config.mqtt_url,
                self.config.mqtt_qos,
            )?)),
        }
    }
}

#[async_trait]
impl ContextBroker for PadiBroker {
    fn name(&self) -> &'static str {
        "padi"
    }

    async fn get_context(&self, code: &str) -> Result<Context, BrokerError> {
        let mode: TransportMode = self.config.mode.parse()?;
        info!(target: "cns.broker", broker = "padi", mode = ?mode, code = %code, "context_requested");

        let api = PadiApi::new(&self.config.api_url, self.config.request_timeout)?;
        let pipeline = ResponsePipeline::new(Arc::new(api.clone()));
        match mode {
            TransportMode::Http => {
                PollingStrategy::new(api, pipeline, self.config.retry.clone())
                    .get_context(code)
                    .await
            }
            TransportMode::Mqtt => {
                SubscriptionStrategy::new(self.connector()?, pipeline, self.config.retry.deadline)
                    .get_context(code)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_modes_parse() {
        assert_eq!("http".parse::<TransportMode>().unwrap(), TransportMode::Http);
        assert_eq!("mqtt".parse::<TransportMode>().unwrap(), TransportMode::Mqtt);
    }

    #[test]
    fn unknown_mode_is_invalid() {
        let err = "carrier-pigeon".parse::<TransportMode>().unwrap_err();
        assert!(matches!(err, BrokerError::InvalidMode(ref mode) if mode == "carrier-pigeon"));
        // 大小写敏感
        assert!("HTTP".parse::<TransportMode>().is_err());
    }

    #[tokio::test]
    async fn mqtt_mode_without_server_fails_before_connecting() {
        let broker = PadiBroker::new(BrokerConfig {
            mode: "mqtt".to_string(),
            mqtt_url: String::new(),
            ..Default::default()
        });
        let err = broker.get_context("XYZ").await.unwrap_err();
        assert!(matches!(err, BrokerError::MissingEndpoint("mqtt")));
    }
}
