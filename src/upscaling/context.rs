//! 超分辨率上下文
//!
//! 持有跨帧状态 (历史缓冲区、曝光、抖动序列)，按固定顺序执行各阶段:
//! 输入校验 → 数值清理 → 自动曝光 → 反应遮罩 → 运动矢量膨胀 → 时间累积 → 锐化。
//!
//! 状态机: `Uninitialized → Ready`，显示分辨率或 HDR/深度约定变化时
//! `Ready → Reinitializing → Ready` 并丢弃历史。`Reinitializing` 只存在于
//! `initialize` 内部，返回后状态总是 `Ready` 或 (分配失败时) `Uninitialized`。
//! 质量档位变化 (包括禁用) 保留历史。
//!
//! 单线程调用；阶段之间严格串行，只在阶段内部按行并行。

use crate::config::{FeatureFlags, ReactiveMaskMode, UpscalerConfig};
use crate::core::error::{UpscalerError, UpscalerResult};
use crate::impl_default;
use crate::upscaling::accumulator::{AccumulatorInputs, TemporalAccumulator};
use crate::upscaling::constants::FrameConstants;
use crate::upscaling::history::HistoryState;
use crate::upscaling::jitter::{JitterOffset, JitterSequencer, JitterState};
use crate::upscaling::reactive::{ReactiveMaskGenerator, ReactiveMaskParams};
use crate::upscaling::reprojection::MotionVectorReprojector;
use crate::upscaling::sharpen::Sharpener;
use crate::upscaling::texture::{
    sanitize_color, sanitize_scalar, ColorTexture, DepthTexture, MaskTexture, MotionVectorTexture,
    Texture,
};
use glam::{Vec2, Vec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// 上下文状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// 尚未初始化或已销毁
    Uninitialized,
    /// 可以执行帧
    Ready,
    /// 正在重建历史
    ///
    /// 仅在 `initialize` 重新分配期间短暂存在，调用方观察不到。
    Reinitializing,
}

/// 相机参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraParams {
    /// 近平面
    pub near: f32,
    /// 远平面 (无限远平面时忽略)
    pub far: f32,
    /// 垂直视场角 (弧度)
    pub fov_y: f32,
}

impl_default!(CameraParams {
    near: 0.1,
    far: 1000.0,
    fov_y: std::f32::consts::FRAC_PI_3,
});

/// 单帧输入
///
/// 所有纹理归调用方所有，只在 `execute` 调用期间借用。
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    /// 渲染分辨率颜色
    pub color: &'a ColorTexture,
    /// 渲染分辨率设备深度
    pub depth: &'a DepthTexture,
    /// 运动矢量 (渲染或显示分辨率)
    pub motion_vectors: &'a MotionVectorTexture,
    /// 仅不透明颜色
    pub opaque_color: Option<&'a ColorTexture>,
    /// 外部反应遮罩
    pub reactive_mask: Option<&'a MaskTexture>,
    /// 透明与合成遮罩
    pub composition_mask: Option<&'a MaskTexture>,
    /// 本帧渲染分辨率
    pub render_size: (u32, u32),
    /// 本帧使用的抖动
    pub jitter: JitterOffset,
    /// 运动矢量缩放，`None` 时为 `(-宽, 高)` (运动矢量纹理尺寸)
    pub motion_vector_scale: Option<Vec2>,
    pub camera: CameraParams,
    pub frame_delta_seconds: f32,
    /// 颜色已乘以的预曝光
    pub pre_exposure: f32,
    /// 关闭自动曝光时使用的曝光
    pub exposure: Option<f32>,
    /// 镜头切换，丢弃本帧之前的历史
    pub reset: bool,
}

impl<'a> FrameInputs<'a> {
    /// 以必需的三张纹理创建，渲染分辨率取颜色纹理尺寸
    pub fn new(
        color: &'a ColorTexture,
        depth: &'a DepthTexture,
        motion_vectors: &'a MotionVectorTexture,
    ) -> Self {
        Self {
            color,
            depth,
            motion_vectors,
            opaque_color: None,
            reactive_mask: None,
            composition_mask: None,
            render_size: color.size(),
            jitter: JitterOffset::default(),
            motion_vector_scale: None,
            camera: CameraParams::default(),
            frame_delta_seconds: 1.0 / 60.0,
            pre_exposure: 1.0,
            exposure: None,
            reset: false,
        }
    }

    pub fn with_opaque_color(mut self, opaque: &'a ColorTexture) -> Self {
        self.opaque_color = Some(opaque);
        self
    }

    pub fn with_reactive_mask(mut self, mask: &'a MaskTexture) -> Self {
        self.reactive_mask = Some(mask);
        self
    }

    pub fn with_composition_mask(mut self, mask: &'a MaskTexture) -> Self {
        self.composition_mask = Some(mask);
        self
    }

    pub fn with_render_size(mut self, width: u32, height: u32) -> Self {
        self.render_size = (width, height);
        self
    }

    pub fn with_jitter(mut self, jitter: JitterOffset) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_motion_vector_scale(mut self, scale: Vec2) -> Self {
        self.motion_vector_scale = Some(scale);
        self
    }

    pub fn with_camera(mut self, camera: CameraParams) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_frame_delta(mut self, seconds: f32) -> Self {
        self.frame_delta_seconds = seconds;
        self
    }

    pub fn with_pre_exposure(mut self, pre_exposure: f32) -> Self {
        self.pre_exposure = pre_exposure;
        self
    }

    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = Some(exposure);
        self
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }
}

/// 单帧输出
#[derive(Debug, Clone)]
pub struct FrameOutput {
    /// 显示分辨率颜色 (禁用时为渲染分辨率原样直通)
    pub color: ColorTexture,
    /// 是否经过超分辨率
    pub upscaled: bool,
    /// 本帧曝光
    pub exposure: f32,
    /// 复用了历史的像素数
    pub history_pixels: usize,
    /// 帧序号
    pub frame_index: u64,
}

/// 初始化后调用方需要应用的渲染设置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub render_width: u32,
    pub render_height: u32,
    /// 全局渲染缩放
    pub render_scale: f32,
    /// 纹理采样 mip 偏移
    pub mip_bias: f32,
    /// 抖动相位长度
    pub jitter_phase_count: u32,
    pub upscaling_enabled: bool,
}

impl RenderSettings {
    pub fn from_config(config: &UpscalerConfig) -> Self {
        let (render_width, render_height) = config.render_resolution();
        Self {
            render_width,
            render_height,
            render_scale: config.quality.render_scale(),
            mip_bias: config.quality.mip_bias(),
            jitter_phase_count: JitterSequencer::phase_count(render_width, config.display.width),
            upscaling_enabled: config.quality.is_enabled(),
        }
    }
}

/// 超分辨率上下文
#[derive(Debug)]
pub struct UpscalerContext {
    state: ContextState,
    config: Option<UpscalerConfig>,
    history: Option<HistoryState>,
    jitter: JitterSequencer,
    /// 上一帧抖动 (UV)，用于抖动抵消
    previous_jitter_uv: Option<Vec2>,
    frame_index: u64,
}

impl Default for UpscalerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl UpscalerContext {
    pub fn new() -> Self {
        Self {
            state: ContextState::Uninitialized,
            config: None,
            history: None,
            jitter: JitterSequencer::new(),
            previous_jitter_uv: None,
            frame_index: 0,
        }
    }

    /// 初始化或更新配置
    ///
    /// 显示分辨率或 HDR/深度约定变化时重新分配历史；其余变化原地生效。
    /// 分配失败时上下文回到 `Uninitialized`。
    pub fn initialize(&mut self, config: UpscalerConfig) -> UpscalerResult<RenderSettings> {
        validate_config(&config)?;

        let needs_allocation = match (&self.config, &self.history) {
            (Some(current), Some(_)) => current.requires_reinitialization(&config),
            _ => true,
        };

        if needs_allocation {
            if self.state == ContextState::Ready {
                self.state = ContextState::Reinitializing;
                tracing::info!(
                    target: "upscaler",
                    "reinitializing context: display {}x{}, flags {:?}",
                    config.display.width,
                    config.display.height,
                    config.flags
                );
            }
            self.history = None;

            match HistoryState::allocate(config.display.as_tuple()) {
                Ok(history) => {
                    tracing::info!(
                        target: "upscaler",
                        "history allocated: {}x{} ({} bytes)",
                        config.display.width,
                        config.display.height,
                        history.byte_size()
                    );
                    self.history = Some(history);
                }
                Err(e) => {
                    tracing::error!(target: "upscaler", "history allocation failed: {}", e);
                    self.state = ContextState::Uninitialized;
                    self.config = None;
                    return Err(e);
                }
            }
            self.jitter.reset();
            self.previous_jitter_uv = None;
        } else if let Some(current) = &self.config {
            if current.quality != config.quality {
                tracing::info!(
                    target: "upscaler",
                    "quality tier {} -> {}, history kept",
                    current.quality,
                    config.quality
                );
            }
        }

        let settings = RenderSettings::from_config(&config);
        tracing::info!(
            target: "upscaler",
            "context ready: render {}x{} -> display {}x{} ({}, mip bias {})",
            settings.render_width,
            settings.render_height,
            config.display.width,
            config.display.height,
            config.quality,
            settings.mip_bias
        );
        self.config = Some(config);
        self.state = ContextState::Ready;
        Ok(settings)
    }

    /// 执行一帧
    pub fn execute(&mut self, inputs: &FrameInputs<'_>) -> UpscalerResult<FrameOutput> {
        if self.state != ContextState::Ready {
            return Err(UpscalerError::NotInitialized);
        }
        let (Some(config), Some(history)) = (self.config.as_ref(), self.history.as_mut()) else {
            return Err(UpscalerError::NotInitialized);
        };

        let frame_index = self.frame_index;
        if !config.quality.is_enabled() {
            self.frame_index += 1;
            tracing::debug!(target: "upscaler", "frame {}: upscaling disabled, color passed through", frame_index);
            return Ok(FrameOutput {
                color: inputs.color.clone(),
                upscaled: false,
                exposure: inputs.exposure.unwrap_or(1.0),
                history_pixels: 0,
                frame_index,
            });
        }

        validate_frame(config, inputs)?;

        match run_pipeline(config, history, inputs, self.previous_jitter_uv, frame_index) {
            Ok((output, jitter_uv)) => {
                self.previous_jitter_uv = Some(jitter_uv);
                self.frame_index += 1;
                Ok(output)
            }
            Err(e) => {
                if e.is_fatal_for_context() {
                    tracing::error!(target: "upscaler", "frame {} failed, context invalidated: {}", frame_index, e);
                    self.state = ContextState::Uninitialized;
                    self.history = None;
                    self.config = None;
                }
                Err(e)
            }
        }
    }

    /// 推进抖动序列，返回本帧应使用的偏移
    pub fn next_jitter(&mut self, render_size: (u32, u32)) -> UpscalerResult<JitterOffset> {
        let config = self.config.as_ref().ok_or(UpscalerError::NotInitialized)?;
        Ok(self
            .jitter
            .next(render_size.0, render_size.1, config.display.width))
    }

    pub fn reset_jitter(&mut self) {
        self.jitter.reset();
    }

    /// 标记历史无效，不重新分配
    pub fn reset_history(&mut self) {
        if let Some(history) = self.history.as_mut() {
            tracing::warn!(target: "upscaler", "history discarded on request");
            history.invalidate();
        }
        self.previous_jitter_uv = None;
    }

    /// 释放历史并回到 `Uninitialized`
    pub fn destroy(&mut self) {
        if self.state != ContextState::Uninitialized {
            tracing::info!(target: "upscaler", "context destroyed after {} frames", self.frame_index);
        }
        *self = Self::new();
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn config(&self) -> Option<&UpscalerConfig> {
        self.config.as_ref()
    }

    pub fn render_settings(&self) -> Option<RenderSettings> {
        self.config.as_ref().map(RenderSettings::from_config)
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn history(&self) -> Option<&HistoryState> {
        self.history.as_ref()
    }

    pub fn jitter_state(&self) -> JitterState {
        self.jitter.state()
    }
}

fn validate_config(config: &UpscalerConfig) -> UpscalerResult<()> {
    // 经 from_bits_retain 构造的标志可能带未知位
    FeatureFlags::try_from_bits(config.flags.bits())?;
    if config.display.width == 0 || config.display.height == 0 {
        return Err(UpscalerError::InvalidResolution {
            render: config.render_resolution(),
            display: config.display.as_tuple(),
            reason: "display resolution must be non-zero".to_string(),
        });
    }
    config
        .validate()
        .map_err(|e| UpscalerError::UnsupportedConfiguration {
            reason: e.to_string(),
        })
}

fn check_size(input: &str, actual: (u32, u32), expected: (u32, u32)) -> UpscalerResult<()> {
    if actual != expected {
        return Err(UpscalerError::InvalidInput {
            input: input.to_string(),
            reason: format!(
                "expected {}x{}, got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
        });
    }
    Ok(())
}

fn invalid_input(input: &str, reason: impl Into<String>) -> UpscalerError {
    UpscalerError::InvalidInput {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// 逐像素工作开始前的同步校验
fn validate_frame(config: &UpscalerConfig, inputs: &FrameInputs<'_>) -> UpscalerResult<()> {
    let display = config.display.as_tuple();
    let render = inputs.render_size;
    let resolution_error = |reason: String| UpscalerError::InvalidResolution {
        render,
        display,
        reason,
    };

    if render.0 == 0 || render.1 == 0 {
        return Err(resolution_error("render resolution must be non-zero".to_string()));
    }
    if render.0 > display.0 || render.1 > display.1 {
        return Err(resolution_error(
            "render resolution exceeds display resolution".to_string(),
        ));
    }
    if !config.flags.contains(FeatureFlags::DYNAMIC_RESOLUTION) {
        let expected = config.render_resolution();
        if render != expected {
            return Err(resolution_error(format!(
                "{} expects {}x{} without DYNAMIC_RESOLUTION",
                config.quality, expected.0, expected.1
            )));
        }
    }

    check_size("color", inputs.color.size(), render)?;
    check_size("depth", inputs.depth.size(), render)?;
    let motion_size = if config
        .flags
        .contains(FeatureFlags::DISPLAY_RESOLUTION_MOTION_VECTORS)
    {
        display
    } else {
        render
    };
    check_size("motion_vectors", inputs.motion_vectors.size(), motion_size)?;
    if let Some(opaque) = inputs.opaque_color {
        check_size("opaque_color", opaque.size(), render)?;
    }
    if let Some(mask) = inputs.reactive_mask {
        check_size("reactive_mask", mask.size(), render)?;
    }
    if let Some(mask) = inputs.composition_mask {
        check_size("composition_mask", mask.size(), render)?;
    }

    if !inputs.frame_delta_seconds.is_finite() || inputs.frame_delta_seconds < 0.0 {
        return Err(invalid_input(
            "frame_delta_seconds",
            format!("must be finite and non-negative, got {}", inputs.frame_delta_seconds),
        ));
    }
    if !inputs.pre_exposure.is_finite() || inputs.pre_exposure <= 0.0 {
        return Err(invalid_input("pre_exposure", "must be finite and positive"));
    }
    if let Some(exposure) = inputs.exposure {
        if !exposure.is_finite() || exposure <= 0.0 {
            return Err(invalid_input("exposure", "must be finite and positive"));
        }
    }
    if let Some(scale) = inputs.motion_vector_scale {
        if !scale.is_finite() {
            return Err(invalid_input("motion_vector_scale", "must be finite"));
        }
    }

    let camera = inputs.camera;
    if !camera.near.is_finite() || camera.near <= 0.0 {
        return Err(invalid_input("camera.near", "must be finite and positive"));
    }
    if !(camera.fov_y > 0.0 && camera.fov_y < std::f32::consts::PI) {
        return Err(invalid_input("camera.fov_y", "must be in (0, pi)"));
    }
    if !config.flags.contains(FeatureFlags::DEPTH_INFINITE)
        && !(camera.far.is_finite() && camera.far > camera.near)
    {
        return Err(invalid_input("camera.far", "must be finite and beyond the near plane"));
    }

    validate_reactive_inputs(config.reactive.mode, inputs)
}

/// 反应遮罩来源与本帧提供的缓冲区必须一致
fn validate_reactive_inputs(mode: ReactiveMaskMode, inputs: &FrameInputs<'_>) -> UpscalerResult<()> {
    let unsupported = |reason: &str| UpscalerError::UnsupportedConfiguration {
        reason: reason.to_string(),
    };
    match mode {
        ReactiveMaskMode::External => {
            if inputs.reactive_mask.is_none() {
                return Err(invalid_input(
                    "reactive_mask",
                    "External reactive mode requires a reactive mask",
                ));
            }
        }
        ReactiveMaskMode::Generated => {
            if inputs.reactive_mask.is_some() {
                return Err(unsupported(
                    "Generated reactive mode cannot be combined with an external reactive mask",
                ));
            }
            if inputs.opaque_color.is_none() {
                return Err(invalid_input(
                    "opaque_color",
                    "Generated reactive mode requires opaque-only color",
                ));
            }
        }
        ReactiveMaskMode::AutoInline => {
            if inputs.reactive_mask.is_some() || inputs.composition_mask.is_some() {
                return Err(unsupported(
                    "AutoInline reactive mode cannot be combined with external reactive or composition masks",
                ));
            }
            if inputs.opaque_color.is_none() {
                return Err(invalid_input(
                    "opaque_color",
                    "AutoInline reactive mode requires opaque-only color",
                ));
            }
        }
        ReactiveMaskMode::None => {
            if inputs.reactive_mask.is_some() {
                return Err(unsupported(
                    "reactive mode None cannot be combined with a reactive mask",
                ));
            }
        }
    }
    Ok(())
}

fn sanitized_color(
    source: &ColorTexture,
    inv_pre_exposure: f32,
    hdr: bool,
    label: &str,
) -> UpscalerResult<ColorTexture> {
    let (width, height) = source.size();
    let mut color = Texture::try_new(width, height, Vec3::ZERO, label)?;
    // LDR 钳制作用于调用方的尺度，之后只做有限非负钳制
    color.par_fill_with(|x, y| {
        sanitize_color(sanitize_color(source.get(x, y), hdr) * inv_pre_exposure, true)
    });
    Ok(color)
}

fn sanitized_mask(source: &MaskTexture, label: &str) -> UpscalerResult<MaskTexture> {
    let (width, height) = source.size();
    let mut mask = Texture::try_new(width, height, 0.0f32, label)?;
    mask.par_fill_with(|x, y| sanitize_scalar(source.get(x, y)).min(1.0));
    Ok(mask)
}

/// 构建本帧常量
fn frame_constants(
    config: &UpscalerConfig,
    inputs: &FrameInputs<'_>,
    previous_jitter_uv: Option<Vec2>,
    frame_index: u64,
) -> FrameConstants {
    let render = Vec2::new(inputs.render_size.0 as f32, inputs.render_size.1 as f32);
    let mut constants = FrameConstants::from_config(config, inputs.render_size);

    let jitter = inputs.jitter.as_vec2();
    let jitter_uv = jitter / render;
    constants.jitter = jitter.into();
    constants.jitter_uv = jitter_uv.into();

    let (mv_width, mv_height) = inputs.motion_vectors.size();
    let mv_size = Vec2::new(mv_width as f32, mv_height as f32);
    let scale = inputs
        .motion_vector_scale
        .unwrap_or(Vec2::new(-mv_size.x, mv_size.y));
    constants.motion_vector_scale = (scale / mv_size).into();
    if config
        .flags
        .contains(FeatureFlags::MOTION_VECTORS_JITTER_CANCELLATION)
    {
        let previous = previous_jitter_uv.unwrap_or(jitter_uv);
        constants.jitter_cancellation = (previous - jitter_uv).into();
    }

    constants.set_camera(inputs.camera.near, inputs.camera.far, inputs.camera.fov_y);
    constants.frame_delta = inputs.frame_delta_seconds;
    constants.pre_exposure = inputs.pre_exposure;
    constants.exposure = inputs.exposure.unwrap_or(1.0);
    constants.frame_index = frame_index as u32;
    constants
}

/// 按顺序执行各阶段，返回输出与本帧抖动 (UV)
fn run_pipeline(
    config: &UpscalerConfig,
    history: &mut HistoryState,
    inputs: &FrameInputs<'_>,
    previous_jitter_uv: Option<Vec2>,
    frame_index: u64,
) -> UpscalerResult<(FrameOutput, Vec2)> {
    let started = Instant::now();
    let mut constants = frame_constants(config, inputs, previous_jitter_uv, frame_index);
    let hdr = constants.hdr();
    let inv_pre_exposure = 1.0 / inputs.pre_exposure;

    let color = sanitized_color(inputs.color, inv_pre_exposure, hdr, "color")?;
    let opaque = inputs
        .opaque_color
        .map(|opaque| sanitized_color(opaque, inv_pre_exposure, hdr, "opaque color"))
        .transpose()?;
    let composition = inputs
        .composition_mask
        .map(|mask| sanitized_mask(mask, "composition mask"))
        .transpose()?;

    if inputs.reset {
        tracing::warn!(target: "upscaler", "frame {}: reset requested, history discarded", frame_index);
        history.invalidate();
    }

    if config.flags.contains(FeatureFlags::AUTO_EXPOSURE) {
        constants.exposure = history
            .exposure_mut()
            .update(&color, inputs.frame_delta_seconds);
    }
    let prepared = Instant::now();

    let reactive = match config.reactive.mode {
        ReactiveMaskMode::External => inputs
            .reactive_mask
            .map(|mask| sanitized_mask(mask, "reactive mask"))
            .transpose()?,
        ReactiveMaskMode::Generated => match opaque.as_ref() {
            Some(opaque) => Some(ReactiveMaskGenerator::generate(
                opaque,
                &color,
                &ReactiveMaskParams::from(&constants),
            )?),
            None => None,
        },
        ReactiveMaskMode::AutoInline | ReactiveMaskMode::None => None,
    };
    let reactive_done = Instant::now();

    let dilated = MotionVectorReprojector::new(&constants).dilate(inputs.depth, inputs.motion_vectors)?;
    let dilated_done = Instant::now();

    let accumulator_inputs = AccumulatorInputs {
        color: &color,
        opaque: opaque.as_ref(),
        reactive: reactive.as_ref(),
        composition: composition.as_ref(),
        dilated: &dilated,
    };
    let stats = TemporalAccumulator::new(&constants).accumulate(&accumulator_inputs, history)?;
    let accumulated = Instant::now();

    let mut output = Sharpener::from_constants(&constants).apply(&history.current().color);
    if inputs.pre_exposure != 1.0 {
        let pre_exposure = inputs.pre_exposure;
        output
            .data_mut()
            .par_iter_mut()
            .for_each(|texel| *texel *= pre_exposure);
    }
    let finished = Instant::now();

    tracing::trace!(
        target: "upscaler",
        "frame {} stages (ms): prepare {:.3}, reactive {:.3}, dilate {:.3}, accumulate {:.3}, sharpen {:.3}",
        frame_index,
        (prepared - started).as_secs_f64() * 1e3,
        (reactive_done - prepared).as_secs_f64() * 1e3,
        (dilated_done - reactive_done).as_secs_f64() * 1e3,
        (accumulated - dilated_done).as_secs_f64() * 1e3,
        (finished - accumulated).as_secs_f64() * 1e3,
    );
    tracing::debug!(
        target: "upscaler",
        "frame {}: render {}x{}, jitter ({:.3}, {:.3}), exposure {:.4}, history reused {}/{}",
        frame_index,
        inputs.render_size.0,
        inputs.render_size.1,
        inputs.jitter.x,
        inputs.jitter.y,
        constants.exposure,
        stats.history_pixels,
        stats.total_pixels
    );

    Ok((
        FrameOutput {
            color: output,
            upscaled: true,
            exposure: constants.exposure,
            history_pixels: stats.history_pixels,
            frame_index,
        },
        Vec2::from(constants.jitter_uv),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityTier;

    struct Scene {
        color: ColorTexture,
        depth: DepthTexture,
        motion: MotionVectorTexture,
        opaque: ColorTexture,
    }

    impl Scene {
        fn flat(width: u32, height: u32, value: f32) -> Self {
            Self {
                color: Texture::filled(width, height, Vec3::splat(value)),
                depth: Texture::filled(width, height, 0.5),
                motion: Texture::filled(width, height, Vec2::ZERO),
                opaque: Texture::filled(width, height, Vec3::splat(value)),
            }
        }

        fn inputs(&self) -> FrameInputs<'_> {
            FrameInputs::new(&self.color, &self.depth, &self.motion).with_opaque_color(&self.opaque)
        }
    }

    fn ready(display: (u32, u32), tier: QualityTier) -> UpscalerContext {
        let mut context = UpscalerContext::new();
        context
            .initialize(UpscalerConfig::new(display.0, display.1, tier))
            .unwrap();
        context
    }

    #[test]
    fn test_execute_before_initialize() {
        let mut context = UpscalerContext::new();
        let scene = Scene::flat(4, 4, 0.5);
        assert!(matches!(
            context.execute(&scene.inputs()),
            Err(UpscalerError::NotInitialized)
        ));
        assert!(matches!(
            context.next_jitter((4, 4)),
            Err(UpscalerError::NotInitialized)
        ));
    }

    #[test]
    fn test_initialize_returns_render_settings() {
        let mut context = UpscalerContext::new();
        let settings = context
            .initialize(UpscalerConfig::new(1920, 1080, QualityTier::Performance))
            .unwrap();
        assert_eq!(context.state(), ContextState::Ready);
        assert_eq!((settings.render_width, settings.render_height), (960, 540));
        assert_eq!(settings.jitter_phase_count, 32);
        assert!(settings.upscaling_enabled);
        assert_eq!(settings.mip_bias, QualityTier::Performance.mip_bias());
        assert_eq!(context.history().unwrap().display_size(), (1920, 1080));
    }

    #[test]
    fn test_zero_display_is_invalid_resolution() {
        let mut context = UpscalerContext::new();
        let result = context.initialize(UpscalerConfig::new(0, 1080, QualityTier::Quality));
        assert!(matches!(result, Err(UpscalerError::InvalidResolution { .. })));
        assert_eq!(context.state(), ContextState::Uninitialized);
    }

    #[test]
    fn test_invalid_settings_are_unsupported() {
        let mut context = UpscalerContext::new();
        let config = UpscalerConfig::new(64, 64, QualityTier::Quality).with_sharpening(true, 3.0);
        assert!(matches!(
            context.initialize(config),
            Err(UpscalerError::UnsupportedConfiguration { .. })
        ));
    }

    #[test]
    fn test_unknown_flag_bits_are_unsupported() {
        let mut context = UpscalerContext::new();
        let mut config = UpscalerConfig::new(64, 64, QualityTier::Quality);
        config.flags = FeatureFlags::from_bits_retain(config.flags.bits() | 1 << 7);
        assert!(matches!(
            context.initialize(config),
            Err(UpscalerError::UnsupportedConfiguration { .. })
        ));
        assert_eq!(context.state(), ContextState::Uninitialized);
    }

    #[test]
    fn test_render_resolution_checks() {
        let mut context = ready((16, 16), QualityTier::Performance);

        let zero = Scene::flat(8, 8, 0.5);
        let inputs = zero.inputs().with_render_size(0, 8);
        assert!(matches!(
            context.execute(&inputs),
            Err(UpscalerError::InvalidResolution { .. })
        ));

        let too_big = Scene::flat(32, 32, 0.5);
        assert!(matches!(
            context.execute(&too_big.inputs()),
            Err(UpscalerError::InvalidResolution { .. })
        ));

        // 非动态分辨率时必须与档位一致
        let wrong_tier = Scene::flat(12, 12, 0.5);
        assert!(matches!(
            context.execute(&wrong_tier.inputs()),
            Err(UpscalerError::InvalidResolution { .. })
        ));
    }

    #[test]
    fn test_dynamic_resolution_accepts_any_size() {
        let mut context = UpscalerContext::new();
        let config = UpscalerConfig::new(16, 16, QualityTier::Performance)
            .with_flags(FeatureFlags::DYNAMIC_RESOLUTION | FeatureFlags::DEPTH_INVERTED);
        context.initialize(config).unwrap();

        let scene = Scene::flat(12, 10, 0.5);
        let output = context.execute(&scene.inputs()).unwrap();
        assert_eq!(output.color.size(), (16, 16));
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let mut context = ready((16, 16), QualityTier::Performance);
        let mut scene = Scene::flat(8, 8, 0.5);
        scene.depth = Texture::filled(4, 4, 0.5);
        assert!(matches!(
            context.execute(&scene.inputs()),
            Err(UpscalerError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_bad_frame_delta() {
        let mut context = ready((16, 16), QualityTier::Performance);
        let scene = Scene::flat(8, 8, 0.5);
        for delta in [f32::NAN, -1.0, f32::INFINITY] {
            let inputs = scene.inputs().with_frame_delta(delta);
            assert!(matches!(
                context.execute(&inputs),
                Err(UpscalerError::InvalidInput { .. })
            ));
        }
    }

    #[test]
    fn test_reactive_mode_conflicts() {
        let scene = Scene::flat(8, 8, 0.5);
        let mask = Texture::filled(8, 8, 0.0f32);

        // AutoInline (默认) + 外部遮罩
        let mut context = ready((16, 16), QualityTier::Performance);
        let inputs = scene.inputs().with_reactive_mask(&mask);
        assert!(matches!(
            context.execute(&inputs),
            Err(UpscalerError::UnsupportedConfiguration { .. })
        ));

        let mut context = UpscalerContext::new();
        context
            .initialize(
                UpscalerConfig::new(16, 16, QualityTier::Performance)
                    .with_reactive_mode(ReactiveMaskMode::Generated),
            )
            .unwrap();
        assert!(matches!(
            context.execute(&inputs),
            Err(UpscalerError::UnsupportedConfiguration { .. })
        ));
        assert!(context.execute(&scene.inputs()).is_ok());

        let mut context = UpscalerContext::new();
        context
            .initialize(
                UpscalerConfig::new(16, 16, QualityTier::Performance)
                    .with_reactive_mode(ReactiveMaskMode::None),
            )
            .unwrap();
        assert!(matches!(
            context.execute(&inputs),
            Err(UpscalerError::UnsupportedConfiguration { .. })
        ));

        let mut context = UpscalerContext::new();
        context
            .initialize(
                UpscalerConfig::new(16, 16, QualityTier::Performance)
                    .with_reactive_mode(ReactiveMaskMode::External),
            )
            .unwrap();
        assert!(matches!(
            context.execute(&scene.inputs()),
            Err(UpscalerError::InvalidInput { .. })
        ));
        assert!(context.execute(&inputs).is_ok());
    }

    #[test]
    fn test_missing_opaque_color() {
        let mut context = ready((16, 16), QualityTier::Performance);
        let scene = Scene::flat(8, 8, 0.5);
        let inputs = FrameInputs::new(&scene.color, &scene.depth, &scene.motion);
        assert!(matches!(
            context.execute(&inputs),
            Err(UpscalerError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_tier_change_keeps_history() {
        let mut context = ready((16, 16), QualityTier::Performance);
        let scene = Scene::flat(8, 8, 0.5);
        context.execute(&scene.inputs()).unwrap();
        assert!(context.history().unwrap().is_valid());

        context
            .initialize(UpscalerConfig::new(16, 16, QualityTier::Disabled))
            .unwrap();
        assert!(context.history().unwrap().is_valid());

        context
            .initialize(UpscalerConfig::new(32, 32, QualityTier::Performance))
            .unwrap();
        assert!(!context.history().unwrap().is_valid());
        assert_eq!(context.history().unwrap().display_size(), (32, 32));
    }

    #[test]
    fn test_reinitialize_settles_in_ready() {
        let mut context = ready((16, 16), QualityTier::Performance);
        let scene = Scene::flat(8, 8, 0.5);
        context.execute(&scene.inputs()).unwrap();

        let mut hdr = UpscalerConfig::new(16, 16, QualityTier::Performance);
        hdr.flags.insert(FeatureFlags::HIGH_DYNAMIC_RANGE);
        context.initialize(hdr).unwrap();
        assert_eq!(context.state(), ContextState::Ready);
        assert!(!context.history().unwrap().is_valid());
    }

    #[test]
    fn test_failed_reallocation_leaves_uninitialized() {
        let mut context = ready((16, 16), QualityTier::Performance);
        let result = context.initialize(UpscalerConfig::new(
            u32::MAX,
            u32::MAX,
            QualityTier::Performance,
        ));
        assert!(matches!(
            result,
            Err(UpscalerError::ResourceAllocationFailure { .. })
        ));
        assert_eq!(context.state(), ContextState::Uninitialized);
        assert!(context.history().is_none());
        assert!(matches!(
            context.execute(&Scene::flat(8, 8, 0.5).inputs()),
            Err(UpscalerError::NotInitialized)
        ));
    }

    #[test]
    fn test_reset_discards_history() {
        let mut context = ready((16, 16), QualityTier::Performance);
        let scene = Scene::flat(8, 8, 0.5);
        context.execute(&scene.inputs()).unwrap();
        let second = context.execute(&scene.inputs()).unwrap();
        assert!(second.history_pixels > 0);

        let cut = context.execute(&scene.inputs().with_reset(true)).unwrap();
        assert_eq!(cut.history_pixels, 0);

        context.reset_history();
        assert!(!context.history().unwrap().is_valid());
    }

    #[test]
    fn test_nan_input_does_not_propagate() {
        let mut context = ready((16, 16), QualityTier::Performance);
        let mut scene = Scene::flat(8, 8, 0.5);
        scene.color.set(3, 3, Vec3::new(f32::NAN, f32::INFINITY, -1.0));
        scene.depth.set(2, 2, f32::NAN);
        scene.motion.set(1, 1, Vec2::new(f32::NAN, 0.0));
        let output = context.execute(&scene.inputs()).unwrap();
        assert!(output.color.data().iter().all(|c| c.is_finite()));
        assert!(output.color.data().iter().all(|c| c.cmpge(Vec3::ZERO).all()));
    }

    #[test]
    fn test_next_jitter_and_destroy() {
        let mut context = ready((1920, 1080), QualityTier::Performance);
        let first = context.next_jitter((960, 540)).unwrap();
        assert_eq!(context.jitter_state().phase_count, 32);
        context.next_jitter((960, 540)).unwrap();
        context.reset_jitter();
        assert_eq!(context.next_jitter((960, 540)).unwrap(), first);

        context.destroy();
        assert_eq!(context.state(), ContextState::Uninitialized);
        assert!(context.history().is_none());
        assert!(context.config().is_none());
    }
}
