//! broker 错误类型定义

use domain::PayloadError;
use std::time::Duration;

/// 上下文获取错误
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// 传输方式无法识别（配置错误，不重试）
    #[error("mode not valid: {0}")]
    InvalidMode(String),

    /// 注册表中不存在该 broker
    #[error("unknown broker: {0}")]
    UnknownBroker(String),

    /// 未配置服务器地址
    #[error("no padi {0} server specified")]
    MissingEndpoint(&'static str),

    /// 服务器地址无法解析
    #[error("invalid endpoint {0}: {1}")]
    InvalidEndpoint(String, String),

    /// 入网码无法作为 URL 路径段（空串、`.`、`..`）
    #[error("onboarding code not usable in a url path: {0:?}")]
    InvalidCode(String),

    /// 网络错误、超时、非 2xx、响应体不是 JSON、MQTT 连接错误
    #[error("transport error: {0}")]
    Transport(String),

    /// 报文缺少必需字段或无法解码
    #[error("response packet not valid: {0}")]
    InvalidResponse(#[from] PayloadError),

    /// 在线状态上报失败
    #[error("status announcement failed: {0}")]
    StatusAnnouncementFailed(String),

    /// 达到轮询次数上限
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// 截止时间内未获取到上下文
    #[error("no onboarding context within {0:?}")]
    DeadlineElapsed(Duration),
}

impl BrokerError {
    /// 轮询策略只对传输错误重试。
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
