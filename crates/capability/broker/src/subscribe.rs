//! MQTT 订阅策略
//!
//! 连接状态机：
//!
//! ```text
//! Disconnected → Connecting → Connected → Subscribed → Waiting → {Delivered | Error}
//! ```
//!
//! - 收到 ConnAck 后订阅 `onboarding/<code>`
//! - 等待阶段唯一的前进条件是该主题上的消息
//! - 任何连接错误直接进入 `Error`（本层不重连）
//! - 第一条消息即终态：关闭连接后交给 [`ResponsePipeline`]，后续消息不再处理

use crate::error::BrokerError;
use crate::pipeline::ResponsePipeline;
use async_trait::async_trait;
use cns_telemetry::{new_session_id, record_message_received};
use domain::{Context, OnboardingPayload};
use reqwest::Url;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 断开连接时等待 Disconnect 报文发出的上限。
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// 入网主题。
pub fn onboarding_topic(code: &str) -> String {
    format!("onboarding/{}", code)
}

/// 订阅连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
    Waiting,
    Delivered,
    Error,
}

/// 传输层事件（只保留状态机关心的部分）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    ConnAck,
    SubAck,
    Publish { topic: String, payload: Vec<u8> },
    /// Ping、出站确认等。
    Idle,
}

/// 订阅传输抽象。
#[async_trait]
pub trait SubscriptionTransport: Send {
    async fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    async fn next_event(&mut self) -> Result<TransportEvent, BrokerError>;

    async fn close(&mut self);
}

/// 每次获取上下文建立一条新连接。
pub trait TransportConnector: Send + Sync {
    fn connect(&self, session_id: &str) -> Result<Box<dyn SubscriptionTransport>, BrokerError>;
}

/// MQTT 订阅策略。
pub struct SubscriptionStrategy {
    connector: Arc<dyn TransportConnector>,
    pipeline: ResponsePipeline,
    deadline: Option<Duration>,
}

impl SubscriptionStrategy {
    pub fn new(
        connector: Arc<dyn TransportConnector>,
        pipeline: ResponsePipeline,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            connector,
            pipeline,
            deadline,
        }
    }

    pub async fn get_context(&self, code: &str) -> Result<Context, BrokerError> {
        let topic = onboarding_topic(code);
        let session_id = new_session_id();
        info!(
            target: "cns.broker",
            code = %code,
            topic = %topic,
            session_id = %session_id,
            "onboarding_subscribe"
        );
        debug!(target: "cns.broker", state = ?SubscriptionState::Disconnected, "mqtt_state");
        let mut transport = self.connector.connect(&session_id)?;
        debug!(target: "cns.broker", state = ?SubscriptionState::Connecting, "mqtt_state");

        let received = match self.deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, wait_for_payload(transport.as_mut(), &topic))
                    .await
                {
                    Ok(received) => received,
                    Err(_) => Err(BrokerError::DeadlineElapsed(deadline)),
                }
            }
            None => wait_for_payload(transport.as_mut(), &topic).await,
        };
        transport.close().await;

        let payload = received?;
        self.pipeline.process(payload).await
    }
}

/// 驱动状态机直到第一条入网消息或连接错误。
async fn wait_for_payload(
    transport: &mut dyn SubscriptionTransport,
    topic: &str,
) -> Result<OnboardingPayload, BrokerError> {
    let mut state = SubscriptionState::Connecting;
    loop {
        let event = match transport.next_event().await {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    target: "cns.broker",
                    state = ?state,
                    error = %err,
                    "mqtt_connection_error"
                );
                debug!(target: "cns.broker", state = ?SubscriptionState::Error, "mqtt_state");
                return Err(err);
            }
        };

        let next = match (state, event) {
            (SubscriptionState::Connecting, TransportEvent::ConnAck) => {
                debug!(target: "cns.broker", state = ?SubscriptionState::Connected, "mqtt_state");
                transport.subscribe(topic).await?;
                SubscriptionState::Subscribed
            }
            (SubscriptionState::Subscribed, TransportEvent::SubAck) => SubscriptionState::Waiting,
            (
                SubscriptionState::Subscribed | SubscriptionState::Waiting,
                TransportEvent::Publish {
                    topic: message_topic,
                    payload,
                },
            ) if message_topic == topic => {
                record_message_received();
                debug!(
                    target: "cns.broker",
                    topic = %message_topic,
                    payload_size = payload.len(),
                    state = ?SubscriptionState::Delivered,
                    "mqtt_message"
                );
                return OnboardingPayload::from_slice(&payload).map_err(|err| {
                    warn!(target: "cns.broker", error = %err, "mqtt_message_invalid");
                    BrokerError::from(err)
                });
            }
            (current, TransportEvent::Publish { topic: other, .. }) => {
                debug!(target: "cns.broker", topic = %other, "mqtt_topic_skipped");
                current
            }
            (current, _) => current,
        };
        if next != state {
            debug!(target: "cns.broker", state = ?next, "mqtt_state");
            state = next;
        }
    }
}

/// MQTT 端点协议。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttScheme {
    Tcp,
    Tls,
    Ws,
    Wss,
}

impl MqttScheme {
    fn default_port(self) -> u16 {
        match self {
            Self::Tcp => 1883,
            Self::Tls => 8883,
            Self::Ws => 80,
            Self::Wss => 443,
        }
    }
}

/// 解析后的 MQTT 端点。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttEndpoint {
    pub scheme: MqttScheme,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl MqttEndpoint {
    /// 支持 `mqtt://` `tcp://` `mqtts://` `ssl://` `ws://` `wss://`。
    pub fn parse(url: &str) -> Result<Self, BrokerError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(BrokerError::MissingEndpoint("mqtt"));
        }
        let invalid = |reason: String| BrokerError::InvalidEndpoint(url.to_string(), reason);
        let parsed = Url::parse(url).map_err(|err| invalid(err.to_string()))?;
        let scheme = match parsed.scheme() {
            "mqtt" | "tcp" => MqttScheme::Tcp,
            "mqtts" | "ssl" => MqttScheme::Tls,
            "ws" => MqttScheme::Ws,
            "wss" => MqttScheme::Wss,
            other => return Err(invalid(format!("unsupported scheme {}", other))),
        };
        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?
            .to_string();
        let port = parsed.port().unwrap_or(scheme.default_port());
        Ok(Self {
            scheme,
            host,
            port,
            path: parsed.path().to_string(),
        })
    }

    /// rumqttc 的 broker 地址：websocket 需要完整 URL。
    fn broker_addr(&self) -> String {
        match self.scheme {
            MqttScheme::Tcp | MqttScheme::Tls => self.host.clone(),
            MqttScheme::Ws => format!("ws://{}:{}{}", self.host, self.port, self.path),
            MqttScheme::Wss => format!("wss://{}:{}{}", self.host, self.port, self.path),
        }
    }

    fn transport(&self) -> Transport {
        match self.scheme {
            MqttScheme::Tcp => Transport::Tcp,
            MqttScheme::Tls => Transport::tls_with_default_config(),
            MqttScheme::Ws => Transport::Ws,
            MqttScheme::Wss => Transport::wss_with_default_config(),
        }
    }
}

/// 基于 rumqttc 的连接器。
#[derive(Debug, Clone)]
pub struct MqttConnector {
    endpoint: MqttEndpoint,
    qos: QoS,
}

impl MqttConnector {
    pub fn new(url: &str, qos: u8) -> Result<Self, BrokerError> {
        Ok(Self {
            endpoint: MqttEndpoint::parse(url)?,
            qos: qos_from_u8(qos),
        })
    }

    pub fn endpoint(&self) -> &MqttEndpoint {
        &self.endpoint
    }
}

impl TransportConnector for MqttConnector {
    fn connect(&self, session_id: &str) -> Result<Box<dyn SubscriptionTransport>, BrokerError> {
        let client_id = format!("cns-onboard-{}", session_id);
        let mut options =
            MqttOptions::new(client_id, self.endpoint.broker_addr(), self.endpoint.port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_session(true);
        options.set_transport(self.endpoint.transport());
        let (client, eventloop) = AsyncClient::new(options, 10);
        Ok(Box::new(MqttTransport {
            client,
            eventloop,
            qos: self.qos,
        }))
    }
}

/// rumqttc 连接。
pub struct MqttTransport {
    client: AsyncClient,
    eventloop: EventLoop,
    qos: QoS,
}

#[async_trait]
impl SubscriptionTransport for MqttTransport {
    async fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.client
            .subscribe(topic, self.qos)
            .await
            .map_err(|err| BrokerError::Transport(err.to_string()))
    }

    async fn next_event(&mut self) -> Result<TransportEvent, BrokerError> {
        match self.eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => Ok(TransportEvent::ConnAck),
            Ok(Event::Incoming(Packet::SubAck(_))) => Ok(TransportEvent::SubAck),
            Ok(Event::Incoming(Packet::Publish(publish))) => Ok(TransportEvent::Publish {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            }),
            Ok(_) => Ok(TransportEvent::Idle),
            Err(err) => Err(BrokerError::Transport(err.to_string())),
        }
    }

    async fn close(&mut self) {
        if self.client.disconnect().await.is_err() {
            return;
        }
        // 驱动一次事件循环，把 Disconnect 报文发出去。
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, self.eventloop.poll()).await;
    }
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_is_scoped_by_code() {
        assert_eq!(onboarding_topic("XYZ"), "onboarding/XYZ");
    }

    #[test]
    fn default_endpoint_uses_secure_websocket() {
        let endpoint = MqttEndpoint::parse("wss://cns.padi.io:1881").expect("endpoint");
        assert_eq!(endpoint.scheme, MqttScheme::Wss);
        assert_eq!(endpoint.host, "cns.padi.io");
        assert_eq!(endpoint.port, 1881);
        assert_eq!(endpoint.broker_addr(), "wss://cns.padi.io:1881/");
    }

    #[test]
    fn tcp_endpoint_falls_back_to_default_port() {
        let endpoint = MqttEndpoint::parse("mqtt://127.0.0.1").expect("endpoint");
        assert_eq!(endpoint.scheme, MqttScheme::Tcp);
        assert_eq!(endpoint.port, 1883);
        assert_eq!(endpoint.broker_addr(), "127.0.0.1");
    }

    #[test]
    fn empty_endpoint_is_missing() {
        assert!(matches!(
            MqttEndpoint::parse(""),
            Err(BrokerError::MissingEndpoint("mqtt"))
        ));
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        assert!(matches!(
            MqttEndpoint::parse("carrier-pigeon://loft"),
            Err(BrokerError::InvalidEndpoint(_, _))
        ));
    }

    #[test]
    fn qos_defaults_to_at_least_once() {
        assert_eq!(qos_from_u8(0), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(2), QoS::ExactlyOnce);
        assert_eq!(qos_from_u8(9), QoS::AtLeastOnce);
    }
}
