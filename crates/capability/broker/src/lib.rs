//! # 入网上下文获取
//!
//! 以入网码（onboarding code）向 Padi 后端换取设备上下文（thing 标识 + 令牌），
//! 同一契约支持两种传输：
//! - **HTTP 轮询**：固定间隔 `GET /onboarding/<code>`，传输错误无限重试
//! - **MQTT 订阅**：订阅 `onboarding/<code>`，等待第一条消息
//!
//! ## 架构设计
//!
//! ```text
//! BrokerRegistry ("padi")
//!       │
//!       ▼
//! PadiBroker::get_context(code)
//!       │
//!       ├── PollingStrategy      (http)
//!       └── SubscriptionStrategy (mqtt)
//!       │
//!       ▼
//! ResponsePipeline: 提取 padiThing/padiToken → POST status "online"
//!       │
//!       ▼
//! Context { context, token }
//! ```
//!
//! 报文结构错误永远不重试；只有在线状态上报成功后才产出 [`Context`]。

mod api;
mod error;
mod padi;
mod pipeline;
mod poll;
mod registry;
mod subscribe;

pub use api::{PadiApi, STATUS_CLIENT};
pub use domain::Context;
pub use error::BrokerError;
pub use padi::{BrokerConfig, PadiBroker, TransportMode};
pub use pipeline::{ResponsePipeline, StatusAnnouncer};
pub use poll::{DEFAULT_POLL_INTERVAL_MS, PollingStrategy, RetryPolicy};
pub use registry::{BrokerConstructor, BrokerRegistry};
pub use subscribe::{
    MqttConnector, MqttEndpoint, MqttScheme, MqttTransport, SubscriptionState,
    SubscriptionStrategy, SubscriptionTransport, TransportConnector, TransportEvent,
    onboarding_topic,
};

use async_trait::async_trait;

/// 上下文获取能力。
#[async_trait]
pub trait ContextBroker: Send + Sync {
    /// 注册表中的名称。
    fn name(&self) -> &'static str;

    /// 以入网码获取上下文：成功一次或失败一次。
    async fn get_context(&self, code: &str) -> Result<Context, BrokerError>;
}
