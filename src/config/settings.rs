use super::flags::ReactiveGenerationFlags;
use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 反应遮罩来源（互斥）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactiveMaskMode {
    /// 调用方逐帧提供遮罩
    External,
    /// 由独立的遮罩生成阶段从不透明/合成颜色推断
    Generated,
    /// 在累积阶段内联估计（实验性）
    AutoInline,
    /// 不使用遮罩
    None,
}

/// 反应遮罩配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactiveMaskSettings {
    /// 遮罩来源
    pub mode: ReactiveMaskMode,
    /// 差分缩放
    pub scale: f32,
    /// 截断阈值
    pub cutoff_threshold: f32,
    /// 输出上限
    pub binary_value: f32,
    /// 生成选项
    pub flags: ReactiveGenerationFlags,
}

impl_default!(ReactiveMaskSettings {
    mode: ReactiveMaskMode::AutoInline,
    scale: 0.3,
    cutoff_threshold: 0.3,
    binary_value: 0.3,
    flags: ReactiveGenerationFlags::default(),
});

impl ReactiveMaskSettings {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        check_range("reactive.scale", self.scale, 0.0, 1.0)?;
        check_range("reactive.cutoff_threshold", self.cutoff_threshold, 0.0, 1.0)?;
        check_range("reactive.binary_value", self.binary_value, 0.0, 1.0)?;
        if self.flags.contains(
            ReactiveGenerationFlags::APPLY_TONEMAP | ReactiveGenerationFlags::APPLY_INVERSE_TONEMAP,
        ) {
            return Err(ConfigError::ValidationError(
                "reactive.flags: APPLY_TONEMAP and APPLY_INVERSE_TONEMAP are mutually exclusive"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// 内联自动反应遮罩参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoReactiveSettings {
    /// 透明/合成检测阈值
    pub tc_threshold: f32,
    /// 透明/合成缩放
    pub tc_scale: f32,
    /// 反应值缩放
    pub reactive_scale: f32,
    /// 反应值上限
    pub reactive_max: f32,
}

impl_default!(AutoReactiveSettings {
    tc_threshold: 0.05,
    tc_scale: 1.0,
    reactive_scale: 5.0,
    reactive_max: 0.9,
});

impl AutoReactiveSettings {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        check_range("auto_reactive.tc_threshold", self.tc_threshold, 0.0, 1.0)?;
        check_range("auto_reactive.tc_scale", self.tc_scale, 0.0, 2.0)?;
        check_range("auto_reactive.reactive_scale", self.reactive_scale, 0.0, 20.0)?;
        check_range("auto_reactive.reactive_max", self.reactive_max, 0.0, 1.0)?;
        Ok(())
    }
}

/// 锐化配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharpeningSettings {
    /// 是否启用
    pub enabled: bool,
    /// 锐度 [0, 1]
    pub sharpness: f32,
}

impl_default!(SharpeningSettings {
    enabled: true,
    sharpness: 0.3,
});

impl SharpeningSettings {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        check_range("sharpening.sharpness", self.sharpness, 0.0, 1.0)
    }
}

pub(crate) fn check_range(field: &str, value: f32, min: f32, max: f32) -> ConfigResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::ValidationError(format!(
            "{} = {} is outside [{}, {}]",
            field, value, min, max
        )));
    }
    Ok(())
}
