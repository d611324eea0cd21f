//! CNS 入网命令行入口：读取配置 → 获取入网上下文 → 输出（可选写回 .env）。

mod env_file;

use cns_broker::{BrokerConfig, BrokerRegistry, ContextBroker, RetryPolicy};
use cns_config::{AppConfig, PadiConfig};
use cns_telemetry::{init_tracing, metrics, new_session_id};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, warn};

/// Ctrl-C 中断时的退出码（128 + SIGINT）。
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", error_line(&err));
            return ExitCode::FAILURE;
        }
    };
    // 初始化结构化日志
    init_tracing();

    // 已经持有上下文则无需再次入网
    if let Some((context, _)) = config.existing_context() {
        println!("Onboarding context: {}", context);
        return ExitCode::SUCCESS;
    }

    let code = config.code.trim();
    if code.is_empty() {
        eprintln!("{}", error_line(&"No onboarding code"));
        return ExitCode::FAILURE;
    }

    let broker = match BrokerRegistry::builtin().create(&config.broker, broker_config(&config.padi)) {
        Ok(broker) => broker,
        Err(err) => {
            eprintln!("{}", error_line(&err));
            return ExitCode::FAILURE;
        }
    };

    println!("Onboarding code: {}", code);
    println!("Looking for context...");

    let span = tracing::info_span!(
        "onboarding",
        session_id = %new_session_id(),
        broker = %broker.name(),
        mode = %config.padi.mode
    );
    // 轮询可能无限等待，Ctrl-C 是预期的退出方式
    let result = tokio::select! {
        result = broker.get_context(code).instrument(span) => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!(target: "cns.onboard", "onboarding_interrupted");
            return ExitCode::from(EXIT_INTERRUPTED);
        }
    };
    debug!(target: "cns.onboard", metrics = ?metrics().snapshot(), "onboarding_metrics");

    let context = match result {
        Ok(context) => context,
        Err(err) => {
            error!(target: "cns.onboard", error = %err, "onboarding_failed");
            eprintln!("{}", error_line(&err));
            return ExitCode::FAILURE;
        }
    };
    println!("Onboarding context: {}", context.context);

    if config.persist {
        if let Err(err) = env_file::persist_context(Path::new(&config.env_file), &context) {
            eprintln!("{}", error_line(&err));
            return ExitCode::FAILURE;
        }
        info!(target: "cns.onboard", path = %config.env_file, "context_persisted");
    }
    ExitCode::SUCCESS
}

/// 面向操作者的失败输出（Display 而非 Debug）。
fn error_line(err: &dyn std::fmt::Display) -> String {
    format!("Error: {}", err)
}

/// 将环境配置映射为 broker 配置。
fn broker_config(padi: &PadiConfig) -> BrokerConfig {
    let mut retry = RetryPolicy::unbounded(Duration::from_millis(padi.poll_interval_ms));
    if let Some(max_attempts) = padi.poll_max_attempts {
        retry = retry.with_max_attempts(max_attempts);
    }
    if let Some(deadline_ms) = padi.deadline_ms {
        retry = retry.with_deadline(Duration::from_millis(deadline_ms));
    }
    BrokerConfig {
        api_url: padi.api_url.clone(),
        mqtt_url: padi.mqtt_url.clone(),
        mode: padi.mode.clone(),
        retry,
        request_timeout: Duration::from_millis(padi.request_timeout_ms),
        mqtt_qos: padi.mqtt_qos,
    }
}
