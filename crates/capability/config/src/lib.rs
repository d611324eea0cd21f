//! 入网工具运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// broker 名称（注册表键），默认 `padi`。
    pub broker: String,
    /// 入网码；为空时由命令行入口拒绝。
    pub code: String,
    /// 已有上下文（与 `token` 同时存在时直接退出）。
    pub context: Option<String>,
    pub token: Option<String>,
    pub padi: PadiConfig,
    pub env_file: String,
    pub persist: bool,
}

/// Padi broker 配置。
#[derive(Debug, Clone)]
pub struct PadiConfig {
    pub api_url: String,
    pub mqtt_url: String,
    /// 传输方式原始值（`http` / `mqtt`），未知值在调用时报错。
    pub mode: String,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: Option<u32>,
    pub deadline_ms: Option<u64>,
    pub request_timeout_ms: u64,
    pub mqtt_qos: u8,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let broker = read_with_default("CNS_BROKER", "padi");
        let code = env::var("CNS_CODE").unwrap_or_default();
        let context = read_optional("CNS_CONTEXT");
        let token = read_optional("CNS_TOKEN");
        let env_file = read_with_default("CNS_ENV_FILE", ".env");
        let persist = read_bool_with_default("CNS_PERSIST", false);

        Ok(Self {
            broker,
            code,
            context,
            token,
            padi: PadiConfig::from_env()?,
            env_file,
            persist,
        })
    }

    /// 是否已经持有完整的入网上下文。
    pub fn existing_context(&self) -> Option<(&str, &str)> {
        match (self.context.as_deref(), self.token.as_deref()) {
            (Some(context), Some(token)) => Some((context, token)),
            _ => None,
        }
    }
}

impl PadiConfig {
    /// 从环境变量读取 Padi broker 配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        // API/MQTT 地址允许显式置空，由 broker 报告缺少服务器。
        let api_url = env::var("CNS_PADI_API").unwrap_or_else(|_| "https://api.padi.io".to_string());
        let mqtt_url =
            env::var("CNS_PADI_MQTT").unwrap_or_else(|_| "wss://cns.padi.io:1881".to_string());
        let mode = read_with_default("CNS_PADI_MODE", "http");
        let poll_interval_ms = read_u64_with_default("CNS_PADI_POLL", 5000)?;
        let poll_max_attempts = read_optional_u32("CNS_PADI_POLL_MAX_ATTEMPTS")?;
        let deadline_ms = read_optional_u64("CNS_PADI_DEADLINE_MS")?.filter(|value| *value > 0);
        let request_timeout_ms = read_u64_with_default("CNS_PADI_TIMEOUT_MS", 30_000)?;
        let mqtt_qos = read_u8_with_default("CNS_PADI_MQTT_QOS", 1)?;

        Ok(Self {
            api_url,
            mqtt_url,
            mode,
            poll_interval_ms,
            poll_max_attempts,
            deadline_ms,
            request_timeout_ms,
            mqtt_qos,
        })
    }
}

fn read_with_default(key: &str, default: &str) -> String {
    read_optional(key).unwrap_or_else(|| default.to_string())
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    Ok(read_optional_u64(key)?.unwrap_or(default))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let Some(value) = read_optional(key) else {
        return Ok(default);
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

fn read_optional_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    match read_optional(key) {
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        None => Ok(None),
    }
}

fn read_optional_u32(key: &str) -> Result<Option<u32>, ConfigError> {
    match read_optional(key) {
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        None => Ok(None),
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
