use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 超分辨率质量档位
///
/// 每个档位对应固定的渲染缩放比例和纹理 LOD 偏移。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QualityTier {
    /// 禁用超分辨率，颜色直通
    #[default]
    Disabled,
    /// 质量模式 (1.5x)
    Quality,
    /// 平衡模式 (1.7x)
    Balanced,
    /// 性能模式 (2.0x)
    Performance,
    /// 超性能模式 (3.0x)
    UltraPerformance,
}

impl QualityTier {
    /// 全部档位
    pub const ALL: [QualityTier; 5] = [
        QualityTier::Disabled,
        QualityTier::Quality,
        QualityTier::Balanced,
        QualityTier::Performance,
        QualityTier::UltraPerformance,
    ];

    /// 获取渲染分辨率缩放比例
    pub fn render_scale(&self) -> f32 {
        match self {
            Self::Disabled => 1.0,
            Self::Quality => 1.0 / 1.5,
            Self::Balanced => 1.0 / 1.7,
            Self::Performance => 1.0 / 2.0,
            Self::UltraPerformance => 1.0 / 3.0,
        }
    }

    /// 获取纹理采样 mip 偏移
    pub fn mip_bias(&self) -> f32 {
        match self {
            Self::Disabled => 0.0,
            Self::Quality => -1.58,
            Self::Balanced => -1.76,
            Self::Performance => -2.0,
            Self::UltraPerformance => -2.58,
        }
    }

    /// 是否启用超分辨率
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// 由显示分辨率计算内部渲染分辨率
    ///
    /// 结果每个轴至少为 1，且不超过显示分辨率。
    pub fn render_resolution(&self, display_width: u32, display_height: u32) -> (u32, u32) {
        let scale = self.render_scale();
        let axis = |display: u32| -> u32 {
            let scaled = (display as f64 * scale as f64).floor() as u32;
            scaled.clamp(1u32.min(display), display)
        };
        (axis(display_width), axis(display_height))
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disabled => "Disabled",
            Self::Quality => "Quality",
            Self::Balanced => "Balanced",
            Self::Performance => "Performance",
            Self::UltraPerformance => "UltraPerformance",
        };
        f.write_str(name)
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" | "off" => Ok(Self::Disabled),
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "performance" => Ok(Self::Performance),
            "ultraperformance" | "ultra_performance" => Ok(Self::UltraPerformance),
            other => Err(format!("unknown quality tier: {}", other)),
        }
    }
}
