//! 日志初始化
//!
//! 库内部统一使用 `tracing`，目标为 `"upscaler"`。

use crate::config::{LogLevel, LoggingConfig};

/// 初始化日志系统
///
/// 配置tracing日志框架。`RUST_LOG` 环境变量优先于配置中的级别。
/// 重复调用是安全的，已有全局订阅者时直接返回。
pub fn init_logging(config: &LoggingConfig) {
    let default_directive = match config.level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(true)
        .try_init();
    tracing::info!(target: "upscaler", "logging initialized (level: {})", default_directive);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
