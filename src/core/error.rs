//! 统一错误处理模块
//!
//! 所有输入校验错误都在逐像素工作开始之前同步检测并返回给调用方。
//! 纹素级的数值问题（NaN/Inf）不属于错误，由各阶段静默修正。

use crate::config::ConfigError;
use std::sync::Arc;
use thiserror::Error;

/// 超分辨率错误类型
#[derive(Error, Debug, Clone)]
pub enum UpscalerError {
    /// 在 `initialize` 之前调用了 `execute`
    #[error("上下文未初始化: 必须先调用 initialize")]
    NotInitialized,

    /// 分辨率非法（为零或渲染分辨率大于显示分辨率）
    #[error("分辨率非法 (渲染 {render:?}, 显示 {display:?}): {reason}")]
    InvalidResolution {
        render: (u32, u32),
        display: (u32, u32),
        reason: String,
    },

    /// 互斥的配置项被同时请求
    #[error("不支持的配置: {reason}")]
    UnsupportedConfiguration { reason: String },

    /// 历史/中间缓冲区分配失败
    #[error("资源分配失败 ({resource}): 需要 {bytes} 字节")]
    ResourceAllocationFailure { resource: String, bytes: usize },

    /// 帧输入与声明不一致（尺寸不符、缺少必需缓冲区等）
    #[error("输入非法 ({input}): {reason}")]
    InvalidInput { input: String, reason: String },

    /// 配置文件读取或解析失败
    #[error("配置错误: {0}")]
    Config(#[source] Arc<ConfigError>),
}

impl From<ConfigError> for UpscalerError {
    fn from(err: ConfigError) -> Self {
        UpscalerError::Config(Arc::new(err))
    }
}

/// 超分辨率结果类型
pub type UpscalerResult<T> = Result<T, UpscalerError>;

/// 错误恢复策略
///
/// 上下文本身从不重试，策略仅作为调用方的建议。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// 先初始化或以更低分辨率重新初始化
    Reinitialize,
    /// 降级为直通（禁用超分辨率）
    PassThrough,
    /// 修正本帧输入后重新提交
    FixInput,
    /// 无法自动恢复
    Fail,
}

impl UpscalerError {
    /// 根据错误类型给出恢复策略
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            UpscalerError::NotInitialized => RecoveryStrategy::Reinitialize,
            UpscalerError::InvalidResolution { .. } => RecoveryStrategy::FixInput,
            UpscalerError::UnsupportedConfiguration { .. } => RecoveryStrategy::Fail,
            UpscalerError::ResourceAllocationFailure { .. } => RecoveryStrategy::PassThrough,
            UpscalerError::InvalidInput { .. } => RecoveryStrategy::FixInput,
            UpscalerError::Config(_) => RecoveryStrategy::Fail,
        }
    }

    /// 该错误是否使当前上下文失效
    pub fn is_fatal_for_context(&self) -> bool {
        matches!(self, UpscalerError::ResourceAllocationFailure { .. })
    }

    /// 带建议信息的恢复策略
    pub fn suggestion(&self) -> (RecoveryStrategy, String) {
        let strategy = self.recovery_strategy();
        let suggestion = match self {
            UpscalerError::NotInitialized => "调用 initialize 后再执行帧".to_string(),
            UpscalerError::InvalidResolution { display, .. } => format!(
                "渲染分辨率必须非零且不超过显示分辨率 {}x{}",
                display.0, display.1
            ),
            UpscalerError::UnsupportedConfiguration { .. } => {
                "检查反应遮罩模式与本帧提供的遮罩是否一致".to_string()
            }
            UpscalerError::ResourceAllocationFailure { resource, .. } => format!(
                "{}分配失败，可降低显示分辨率重新初始化，或切换到直通模式",
                resource
            ),
            UpscalerError::InvalidInput { input, .. } => format!("修正输入 {} 后重新提交", input),
            UpscalerError::Config(_) => "修正配置文件后重试".to_string(),
        };
        (strategy, suggestion)
    }
}
