/// 超分辨率配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖和配置校验
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub mod flags;
pub mod quality;
pub mod settings;

pub use flags::{FeatureFlags, ReactiveGenerationFlags};
pub use quality::QualityTier;
pub use settings::{
    AutoReactiveSettings, ReactiveMaskMode, ReactiveMaskSettings, SharpeningSettings,
};

use crate::core::error::UpscalerResult;
use crate::impl_default;
use settings::check_range;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 分辨率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// 宽度（像素）
    pub width: u32,
    /// 高度（像素）
    pub height: u32,
}

impl_default!(Resolution {
    width: 1920,
    height: 1080,
});

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 以元组形式返回
    pub fn as_tuple(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// 上下文配置
///
/// 初始化后不可变；显示分辨率或 HDR/深度约定变化会触发重新初始化。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpscalerConfig {
    /// 显示（输出）分辨率
    pub display: Resolution,

    /// 质量档位
    pub quality: QualityTier,

    /// 特性标志
    pub flags: FeatureFlags,

    /// 锐化
    pub sharpening: SharpeningSettings,

    /// 反应遮罩
    pub reactive: ReactiveMaskSettings,

    /// 内联自动反应遮罩参数
    pub auto_reactive: AutoReactiveSettings,

    /// 新样本权重下限
    ///
    /// 保证部分失效的历史在有限帧内收敛。
    pub new_sample_weight_floor: f32,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl_default!(UpscalerConfig {
    display: Resolution::default(),
    quality: QualityTier::default(),
    flags: FeatureFlags::AUTO_EXPOSURE | FeatureFlags::DEPTH_INVERTED,
    sharpening: SharpeningSettings::default(),
    reactive: ReactiveMaskSettings::default(),
    auto_reactive: AutoReactiveSettings::default(),
    new_sample_weight_floor: 0.1,
    logging: LoggingConfig::default(),
});

impl UpscalerConfig {
    /// 创建默认配置
    pub fn new(display_width: u32, display_height: u32, quality: QualityTier) -> Self {
        Self {
            display: Resolution::new(display_width, display_height),
            quality,
            ..Self::default()
        }
    }

    /// 设置特性标志
    pub fn with_flags(mut self, flags: FeatureFlags) -> Self {
        self.flags = flags;
        self
    }

    /// 以原始位值设置特性标志，包含未知位时返回 `UnsupportedConfiguration`
    pub fn with_flag_bits(mut self, bits: u32) -> UpscalerResult<Self> {
        self.flags = FeatureFlags::try_from_bits(bits)?;
        Ok(self)
    }

    /// 设置反应遮罩来源
    pub fn with_reactive_mode(mut self, mode: ReactiveMaskMode) -> Self {
        self.reactive.mode = mode;
        self
    }

    /// 设置锐化
    pub fn with_sharpening(mut self, enabled: bool, sharpness: f32) -> Self {
        self.sharpening = SharpeningSettings { enabled, sharpness };
        self
    }

    /// 当前档位下的渲染分辨率
    pub fn render_resolution(&self) -> (u32, u32) {
        self.quality
            .render_resolution(self.display.width, self.display.height)
    }

    /// 与另一份配置相比是否需要重建历史
    pub fn requires_reinitialization(&self, other: &UpscalerConfig) -> bool {
        self.display != other.display
            || self.flags.history_affecting() != other.flags.history_affecting()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("FSR_DISPLAY_WIDTH") {
            if let Ok(width) = val.parse() {
                self.display.width = width;
            }
        }
        if let Ok(val) = env::var("FSR_DISPLAY_HEIGHT") {
            if let Ok(height) = val.parse() {
                self.display.height = height;
            }
        }
        if let Ok(val) = env::var("FSR_QUALITY") {
            match val.parse() {
                Ok(quality) => self.quality = quality,
                Err(e) => tracing::warn!(target: "upscaler", "ignoring FSR_QUALITY: {}", e),
            }
        }
        if let Ok(val) = env::var("FSR_SHARPENING") {
            self.sharpening.enabled = val.parse().unwrap_or(self.sharpening.enabled);
        }
        if let Ok(val) = env::var("FSR_SHARPNESS") {
            if let Ok(sharpness) = val.parse() {
                self.sharpening.sharpness = sharpness;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::ValidationError(
                "Invalid display resolution".to_string(),
            ));
        }
        self.sharpening.validate()?;
        self.reactive.validate()?;
        self.auto_reactive.validate()?;
        check_range("new_sample_weight_floor", self.new_sample_weight_floor, 1e-3, 1.0)?;
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否使用彩色输出
    pub ansi: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    ansi: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}
