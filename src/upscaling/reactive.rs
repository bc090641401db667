//! 反应遮罩
//!
//! 比较仅不透明颜色与最终合成颜色，估计每个像素历史复用的可靠程度。
//! 独立生成阶段与累积阶段内联估计是互斥的两条路径。

use crate::config::{AutoReactiveSettings, ReactiveGenerationFlags, ReactiveMaskSettings};
use crate::core::error::{UpscalerError, UpscalerResult};
use crate::upscaling::color::{inverse_tonemap, luminance, tonemap};
use crate::upscaling::constants::FrameConstants;
use crate::upscaling::texture::{sanitize_color, ColorTexture, MaskTexture, Texture};
use glam::Vec3;

/// 遮罩生成参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactiveMaskParams {
    pub scale: f32,
    pub cutoff_threshold: f32,
    pub binary_value: f32,
    pub flags: ReactiveGenerationFlags,
}

impl From<&ReactiveMaskSettings> for ReactiveMaskParams {
    fn from(settings: &ReactiveMaskSettings) -> Self {
        Self {
            scale: settings.scale,
            cutoff_threshold: settings.cutoff_threshold,
            binary_value: settings.binary_value,
            flags: settings.flags,
        }
    }
}

impl From<&FrameConstants> for ReactiveMaskParams {
    fn from(constants: &FrameConstants) -> Self {
        Self {
            scale: constants.reactive_scale,
            cutoff_threshold: constants.reactive_cutoff,
            binary_value: constants.reactive_binary_value,
            flags: ReactiveGenerationFlags::from_bits_truncate(constants.reactive_flags),
        }
    }
}

/// 反应遮罩生成器
pub struct ReactiveMaskGenerator;

impl ReactiveMaskGenerator {
    /// 差分度量 (亮度差或各通道差最大值)
    pub fn difference(opaque: Vec3, color: Vec3, flags: &ReactiveGenerationFlags) -> f32 {
        let (opaque, color) = if flags.contains(ReactiveGenerationFlags::APPLY_TONEMAP) {
            (tonemap(opaque), tonemap(color))
        } else if flags.contains(ReactiveGenerationFlags::APPLY_INVERSE_TONEMAP) {
            (inverse_tonemap(opaque), inverse_tonemap(color))
        } else {
            (opaque, color)
        };

        if flags.contains(ReactiveGenerationFlags::USE_COMPONENTS_MAX) {
            (color - opaque).abs().max_element()
        } else {
            (luminance(color) - luminance(opaque)).abs()
        }
    }

    /// 由差分度量得到遮罩值，结果位于 [0, binary_value]
    ///
    /// 对度量单调不减。
    #[inline]
    pub fn mask_from_difference(metric: f32, params: &ReactiveMaskParams) -> f32 {
        let value = metric * params.scale;
        if !value.is_finite() {
            return params.binary_value;
        }
        if params.flags.contains(ReactiveGenerationFlags::APPLY_THRESHOLD)
            && value < params.cutoff_threshold
        {
            return 0.0;
        }
        value.max(0.0).min(params.binary_value)
    }

    /// 单像素遮罩值
    pub fn evaluate(opaque: Vec3, color: Vec3, params: &ReactiveMaskParams) -> f32 {
        let metric = Self::difference(
            sanitize_color(opaque, true),
            sanitize_color(color, true),
            &params.flags,
        );
        Self::mask_from_difference(metric, params)
    }

    /// 为整张渲染分辨率图像生成遮罩
    pub fn generate(
        opaque: &ColorTexture,
        color: &ColorTexture,
        params: &ReactiveMaskParams,
    ) -> UpscalerResult<MaskTexture> {
        if opaque.size() != color.size() {
            return Err(UpscalerError::InvalidInput {
                input: "opaque_color".to_string(),
                reason: format!(
                    "opaque-only color {:?} does not match color {:?}",
                    opaque.size(),
                    color.size()
                ),
            });
        }

        let (width, height) = color.size();
        let mut mask = Texture::try_new(width, height, 0.0f32, "reactive mask")?;
        mask.par_fill_with(|x, y| Self::evaluate(opaque.get(x, y), color.get(x, y), params));
        Ok(mask)
    }
}

/// 内联自动反应遮罩参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoReactiveParams {
    pub tc_threshold: f32,
    pub tc_scale: f32,
    pub reactive_scale: f32,
    pub reactive_max: f32,
}

impl From<&AutoReactiveSettings> for AutoReactiveParams {
    fn from(settings: &AutoReactiveSettings) -> Self {
        Self {
            tc_threshold: settings.tc_threshold,
            tc_scale: settings.tc_scale,
            reactive_scale: settings.reactive_scale,
            reactive_max: settings.reactive_max,
        }
    }
}

impl From<&FrameConstants> for AutoReactiveParams {
    fn from(constants: &FrameConstants) -> Self {
        Self {
            tc_threshold: constants.auto_tc_threshold,
            tc_scale: constants.auto_tc_scale,
            reactive_scale: constants.auto_reactive_scale,
            reactive_max: constants.auto_reactive_max,
        }
    }
}

/// 内联估计结果
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AutoReactiveSample {
    /// 反应值
    pub reactive: f32,
    /// 透明/合成值
    pub composition: f32,
}

/// 在累积阶段内联估计反应值与合成值
pub fn auto_reactive(color: Vec3, opaque: Vec3, params: &AutoReactiveParams) -> AutoReactiveSample {
    let difference = (tonemap(color) - tonemap(opaque)).abs().max_element();
    if !difference.is_finite() {
        return AutoReactiveSample {
            reactive: params.reactive_max,
            composition: 1.0,
        };
    }
    AutoReactiveSample {
        reactive: (difference * params.reactive_scale).min(params.reactive_max),
        composition: ((difference - params.tc_threshold) * params.tc_scale).clamp(0.0, 1.0),
    }
}
