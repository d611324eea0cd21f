use crate::Context;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 设备标识字段名（后端约定）。
pub const THING_FIELD: &str = "padiThing";
/// 令牌字段名（后端约定）。
pub const TOKEN_FIELD: &str = "padiToken";

/// 报文解析/校验错误。
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// 入网响应报文（HTTP 轮询响应与 MQTT 消息体共用）。
///
/// 两个字段都是可选的：报文是否可用由 [`OnboardingPayload::extract`] 决定。
/// `null` 与缺失同等对待；数字、布尔值按 JSON 文本转为字符串。
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct OnboardingPayload {
    #[serde(rename = "padiThing", default, deserialize_with = "scalar_field")]
    pub thing_id: Option<String>,
    #[serde(rename = "padiToken", default, deserialize_with = "scalar_field")]
    pub token: Option<String>,
}

fn scalar_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(value @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(value.to_string())),
        Some(_) => Err(serde::de::Error::custom(
            "expected a string, number or boolean",
        )),
    }
}

impl OnboardingPayload {
    /// 从原始字节解析（MQTT 消息体）。
    pub fn from_slice(payload: &[u8]) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|err| PayloadError::Malformed(err.to_string()))?;
        Self::from_value(value)
    }

    /// 从已解析的 JSON 值解码（HTTP 响应体）。
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        if !value.is_object() {
            return Err(PayloadError::Malformed("expected a JSON object".to_string()));
        }
        serde_json::from_value(value).map_err(|err| PayloadError::Malformed(err.to_string()))
    }

    /// 提取设备标识与令牌，任一缺失即失败。
    pub fn extract(self) -> Result<Credentials, PayloadError> {
        let thing_id = self.thing_id.ok_or(PayloadError::MissingField(THING_FIELD))?;
        let token = self.token.ok_or(PayloadError::MissingField(TOKEN_FIELD))?;
        Ok(Credentials { thing_id, token })
    }
}

/// 校验通过、尚未确认在线的凭据。
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub thing_id: String,
    pub token: String,
}

impl Credentials {
    /// 在线状态上报成功后转换为最终上下文。
    pub fn into_context(self) -> Context {
        Context {
            context: self.thing_id,
            token: self.token,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("thing_id", &self.thing_id)
            .field("token", &"<redacted>")
            .finish()
    }
}
