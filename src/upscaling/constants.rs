//! 逐帧常量块
//!
//! 上下文在输入校验通过后构建一次，各阶段只读取此结构，不再访问配置。
//! 布局固定 (`repr(C)`, 全部 4 字节字段)，可直接按字节上传或跨 FFI 传递。

use crate::config::{FeatureFlags, ReactiveMaskMode, UpscalerConfig};
use crate::upscaling::sharpen::rcas_con;
use glam::Vec2;

/// 常量块布局版本
pub const FRAME_CONSTANTS_VERSION: u32 = 1;

/// 反应遮罩来源编码
pub const REACTIVE_MODE_EXTERNAL: u32 = 0;
pub const REACTIVE_MODE_GENERATED: u32 = 1;
pub const REACTIVE_MODE_AUTO_INLINE: u32 = 2;
pub const REACTIVE_MODE_NONE: u32 = 3;

/// 逐帧常量
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameConstants {
    /// 布局版本
    pub version: u32,
    /// 特性标志位
    pub flags: u32,
    /// 渲染分辨率
    pub render_size: [u32; 2],
    /// 显示分辨率
    pub display_size: [u32; 2],
    /// 本帧抖动 (渲染像素)
    pub jitter: [f32; 2],
    /// 本帧抖动 (UV)
    pub jitter_uv: [f32; 2],
    /// 原始运动矢量到 UV 位移的缩放
    pub motion_vector_scale: [f32; 2],
    /// 抖动抵消量 (UV)，未启用时为零
    pub jitter_cancellation: [f32; 2],
    /// 近平面
    pub camera_near: f32,
    /// 远平面
    pub camera_far: f32,
    /// 垂直视场角 (弧度)
    pub camera_fov_y: f32,
    /// 单位线性深度下一个渲染像素覆盖的世界尺寸
    pub pixel_footprint: f32,
    /// 曝光
    pub exposure: f32,
    /// 预曝光
    pub pre_exposure: f32,
    /// 帧间隔 (秒)
    pub frame_delta: f32,
    /// RCAS 强度
    pub sharpening_con: f32,
    /// 是否锐化 (0/1)
    pub sharpening_enabled: u32,
    /// 反应遮罩来源编码
    pub reactive_mode: u32,
    pub reactive_scale: f32,
    pub reactive_cutoff: f32,
    pub reactive_binary_value: f32,
    pub reactive_flags: u32,
    pub auto_tc_threshold: f32,
    pub auto_tc_scale: f32,
    pub auto_reactive_scale: f32,
    pub auto_reactive_max: f32,
    /// 新样本权重下限
    pub new_sample_weight_floor: f32,
    /// 帧序号 (低 32 位)
    pub frame_index: u32,
}

impl FrameConstants {
    /// 由配置填充与帧无关的字段
    ///
    /// 抖动、相机、曝光等逐帧字段保持为零，由调用方补齐。
    pub fn from_config(config: &UpscalerConfig, render_size: (u32, u32)) -> Self {
        let display = config.display.as_tuple();
        Self {
            version: FRAME_CONSTANTS_VERSION,
            flags: config.flags.bits(),
            render_size: [render_size.0, render_size.1],
            display_size: [display.0, display.1],
            pre_exposure: 1.0,
            exposure: 1.0,
            sharpening_con: rcas_con(config.sharpening.sharpness),
            sharpening_enabled: config.sharpening.enabled as u32,
            reactive_mode: reactive_mode_code(config.reactive.mode),
            reactive_scale: config.reactive.scale,
            reactive_cutoff: config.reactive.cutoff_threshold,
            reactive_binary_value: config.reactive.binary_value,
            reactive_flags: config.reactive.flags.bits(),
            auto_tc_threshold: config.auto_reactive.tc_threshold,
            auto_tc_scale: config.auto_reactive.tc_scale,
            auto_reactive_scale: config.auto_reactive.reactive_scale,
            auto_reactive_max: config.auto_reactive.reactive_max,
            new_sample_weight_floor: config.new_sample_weight_floor,
            ..<Self as bytemuck::Zeroable>::zeroed()
        }
    }

    /// 设置相机参数并计算像素覆盖系数
    pub fn set_camera(&mut self, near: f32, far: f32, fov_y: f32) {
        self.camera_near = near;
        self.camera_far = far;
        self.camera_fov_y = fov_y;
        let render_height = self.render_size[1].max(1) as f32;
        self.pixel_footprint = 2.0 * (fov_y * 0.5).tan() / render_height;
    }

    /// 是否包含标志
    #[inline]
    pub fn has_flag(&self, flag: FeatureFlags) -> bool {
        self.flags & flag.bits() == flag.bits()
    }

    #[inline]
    pub fn hdr(&self) -> bool {
        self.has_flag(FeatureFlags::HIGH_DYNAMIC_RANGE)
    }

    #[inline]
    pub fn render_size_f(&self) -> Vec2 {
        Vec2::new(self.render_size[0] as f32, self.render_size[1] as f32)
    }

    #[inline]
    pub fn display_size_f(&self) -> Vec2 {
        Vec2::new(self.display_size[0] as f32, self.display_size[1] as f32)
    }

    #[inline]
    pub fn jitter_vec(&self) -> Vec2 {
        Vec2::from(self.jitter)
    }

    /// 按字节视图
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// 反应遮罩来源到常量编码
pub fn reactive_mode_code(mode: ReactiveMaskMode) -> u32 {
    match mode {
        ReactiveMaskMode::External => REACTIVE_MODE_EXTERNAL,
        ReactiveMaskMode::Generated => REACTIVE_MODE_GENERATED,
        ReactiveMaskMode::AutoInline => REACTIVE_MODE_AUTO_INLINE,
        ReactiveMaskMode::None => REACTIVE_MODE_NONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QualityTier, ReactiveGenerationFlags};

    #[test]
    fn test_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<FrameConstants>(), 34 * 4);
        assert_eq!(std::mem::align_of::<FrameConstants>(), 4);
    }

    #[test]
    fn test_from_config() {
        let config = UpscalerConfig::new(1920, 1080, QualityTier::Performance);
        let constants = FrameConstants::from_config(&config, (960, 540));
        assert_eq!(constants.version, FRAME_CONSTANTS_VERSION);
        assert_eq!(constants.render_size, [960, 540]);
        assert_eq!(constants.display_size, [1920, 1080]);
        assert!(constants.has_flag(FeatureFlags::DEPTH_INVERTED));
        assert!(!constants.hdr());
        assert_eq!(constants.reactive_mode, REACTIVE_MODE_AUTO_INLINE);
        assert_eq!(
            ReactiveGenerationFlags::from_bits_truncate(constants.reactive_flags),
            ReactiveGenerationFlags::APPLY_THRESHOLD
        );
        assert_eq!(constants.as_bytes().len(), std::mem::size_of::<FrameConstants>());
    }

    #[test]
    fn test_pixel_footprint() {
        let config = UpscalerConfig::new(200, 100, QualityTier::Disabled);
        let mut constants = FrameConstants::from_config(&config, (200, 100));
        constants.set_camera(0.1, 100.0, std::f32::consts::FRAC_PI_2);
        // tan(45°) = 1
        assert!((constants.pixel_footprint - 0.02).abs() < 1e-6);
    }
}
