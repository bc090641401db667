//! 自动曝光
//!
//! 对每帧平均 log2 亮度做指数滑动平均，时间常数固定。
//! 曝光只参与混合权重计算，不改变输出颜色的尺度。

use crate::upscaling::color::luminance;
use crate::upscaling::texture::ColorTexture;
use rayon::prelude::*;

/// 滑动平均时间常数 (秒)
pub const EXPOSURE_TIME_CONSTANT: f32 = 1.0;

/// 参与平均的最小亮度
const MIN_LUMINANCE: f32 = 1e-5;

/// 自动曝光状态
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AutoExposure {
    /// 平均 log2 亮度，`None` 表示尚未播种
    average_log_luminance: Option<f32>,
}

impl AutoExposure {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用本帧颜色更新并返回曝光
    ///
    /// 重新初始化后的第一帧直接播种，不做平滑。
    pub fn update(&mut self, color: &ColorTexture, frame_delta_seconds: f32) -> f32 {
        let current = Self::average_log_luminance(color);
        let average = match self.average_log_luminance {
            None => current,
            Some(previous) => {
                let blend = 1.0 - (-frame_delta_seconds.max(0.0) / EXPOSURE_TIME_CONSTANT).exp();
                previous + (current - previous) * blend
            }
        };
        self.average_log_luminance = Some(average);
        exposure_from_log_luminance(average)
    }

    /// 当前曝光，未播种时为 1
    pub fn exposure(&self) -> f32 {
        self.average_log_luminance
            .map(exposure_from_log_luminance)
            .unwrap_or(1.0)
    }

    pub fn average(&self) -> Option<f32> {
        self.average_log_luminance
    }

    /// 丢弃平均值，下一帧重新播种
    pub fn reset(&mut self) {
        self.average_log_luminance = None;
    }

    /// 整帧平均 log2 亮度
    ///
    /// 按行并行求和，行内与行间都按固定顺序累加，结果可复现。
    pub fn average_log_luminance(color: &ColorTexture) -> f32 {
        let width = color.width() as usize;
        if width == 0 || color.height() == 0 {
            return MIN_LUMINANCE.log2();
        }
        let row_sums: Vec<f64> = color
            .data()
            .par_chunks(width)
            .map(|row| {
                row.iter()
                    .map(|&c| luminance(c).max(MIN_LUMINANCE).log2() as f64)
                    .sum::<f64>()
            })
            .collect();
        let total: f64 = row_sums.iter().sum();
        (total / color.data().len() as f64) as f32
    }
}

/// 平均 log2 亮度到曝光 (ISO 100, 校准常数 12.5)
pub fn exposure_from_log_luminance(average_log_luminance: f32) -> f32 {
    let average = average_log_luminance.exp2();
    let ev100 = (average * 100.0 / 12.5).log2();
    let max_luminance = 1.2 * ev100.exp2();
    if max_luminance.is_finite() && max_luminance > 0.0 {
        1.0 / max_luminance
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upscaling::texture::Texture;
    use glam::Vec3;

    #[test]
    fn test_first_frame_seeds_average() {
        let mut exposure = AutoExposure::new();
        assert_eq!(exposure.exposure(), 1.0);
        let gray = Texture::filled(4, 4, Vec3::splat(0.5));
        let value = exposure.update(&gray, 0.016);
        let expected_log = luminance(Vec3::splat(0.5)).log2();
        assert!((exposure.average().unwrap() - expected_log).abs() < 1e-5);
        // 1 / (1.2 * L * 8)
        assert!((value - 1.0 / (9.6 * luminance(Vec3::splat(0.5)))).abs() < 1e-3);
    }

    #[test]
    fn test_average_converges_smoothly() {
        let mut exposure = AutoExposure::new();
        let dark = Texture::filled(2, 2, Vec3::splat(0.05));
        let bright = Texture::filled(2, 2, Vec3::splat(0.8));
        exposure.update(&dark, 0.016);
        let dark_log = exposure.average().unwrap();

        exposure.update(&bright, 0.016);
        let after_one = exposure.average().unwrap();
        let bright_log = AutoExposure::average_log_luminance(&bright);
        // 单帧只移动一小步
        assert!(after_one > dark_log && after_one < bright_log);
        assert!((after_one - dark_log) < 0.1 * (bright_log - dark_log));

        for _ in 0..600 {
            exposure.update(&bright, 0.016);
        }
        assert!((exposure.average().unwrap() - bright_log).abs() < 1e-3);
    }

    #[test]
    fn test_black_frame_is_finite() {
        let mut exposure = AutoExposure::new();
        let black = Texture::filled(2, 2, Vec3::ZERO);
        let value = exposure.update(&black, 0.016);
        assert!(value.is_finite() && value > 0.0);
    }

    #[test]
    fn test_reset() {
        let mut exposure = AutoExposure::new();
        exposure.update(&Texture::filled(1, 1, Vec3::ONE), 0.1);
        exposure.reset();
        assert!(exposure.average().is_none());
    }
}
