//! Padi 后端 HTTP 接口
//!
//! - `GET <base>/onboarding/<code>`：查询入网上下文
//! - `POST <base>/thing/client/padi.node/status`：以设备令牌上报 `"online"`

use crate::error::BrokerError;
use reqwest::{Client, Url, header};
use std::time::Duration;
use tracing::{debug, field, warn};

/// 上报在线状态使用的固定客户端名。
pub const STATUS_CLIENT: &str = "padi.node";

/// 在线状态报文（JSON 字符串字面量）。
const ONLINE_BODY: &str = "\"online\"";

/// Padi HTTP 客户端。
#[derive(Debug, Clone)]
pub struct PadiApi {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl PadiApi {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, BrokerError> {
        let api_url = api_url.trim();
        if api_url.is_empty() {
            return Err(BrokerError::MissingEndpoint("api"));
        }
        let base = Url::parse(api_url)
            .map_err(|err| BrokerError::InvalidEndpoint(api_url.to_string(), err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(BrokerError::InvalidEndpoint(
                api_url.to_string(),
                "not a base url".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            base,
            timeout,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// 在基础地址后追加路径段（入网码会被转义）。
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// 查询入网上下文，返回语法合法的 JSON 响应体。
    ///
    /// 任何网络错误、非 2xx 状态或无法解析的响应体都归为 [`BrokerError::Transport`]。
    pub async fn fetch_onboarding(&self, code: &str) -> Result<serde_json::Value, BrokerError> {
        // url 会丢弃 `.` / `..` 路径段，请求会落到错误的路径上
        if matches!(code, "" | "." | "..") {
            return Err(BrokerError::InvalidCode(code.to_string()));
        }
        let url = self.endpoint(&["onboarding", code]);
        debug!(target: "cns.broker", url = %url, "onboarding_get");
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| BrokerError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrokerError::Transport(format!(
                "onboarding request returned {status}"
            )));
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|err| BrokerError::Transport(format!("onboarding body not valid: {err}")))
    }

    /// 以 Bearer 令牌上报设备在线，响应体忽略。
    pub async fn post_status_online(&self, token: &str) -> Result<(), BrokerError> {
        let url = self.endpoint(&["thing", "client", STATUS_CLIENT, "status"]);
        debug!(target: "cns.broker", url = %url, "status_post");
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(ONLINE_BODY)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| BrokerError::StatusAnnouncementFailed(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                target: "cns.broker",
                response = field::display(status),
                "status_post_rejected"
            );
            return Err(BrokerError::StatusAnnouncementFailed(format!(
                "status endpoint returned {status}"
            )));
        }
        Ok(())
    }
}
