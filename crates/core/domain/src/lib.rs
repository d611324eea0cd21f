pub mod data;

pub use data::{Credentials, OnboardingPayload, PayloadError};

/// 入网上下文：设备（thing）标识 + 访问令牌。
///
/// 只有在响应报文校验通过且在线状态上报成功之后才会构造，
/// 构造后由调用方持有，broker 不保留引用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub context: String,
    pub token: String,
}

impl Context {
    pub fn new(context: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            token: token.into(),
        }
    }
}
