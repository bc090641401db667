//! 时间超分辨率
//!
//! 把抖动的低分辨率帧与重投影的历史累积为显示分辨率图像。
//!
//! ## 阶段
//!
//! 1. [`jitter`] - 子像素抖动序列与投影矩阵偏移
//! 2. [`exposure`] - 自动曝光
//! 3. [`reactive`] - 反应遮罩生成与内联估计
//! 4. [`reprojection`] - 深度线性化、运动矢量膨胀、历史重投影
//! 5. [`accumulator`] - Lanczos 重建、历史矫正与混合
//! 6. [`sharpen`] - RCAS 锐化
//!
//! [`context::UpscalerContext`] 串联以上阶段并持有跨帧的 [`history::HistoryState`]。
//!
//! ### 示例
//!
//! ```no_run
//! use fsr_upscaler::config::{QualityTier, UpscalerConfig};
//! use fsr_upscaler::upscaling::{FrameInputs, Texture, UpscalerContext};
//! use glam::{Vec2, Vec3};
//!
//! # fn main() -> fsr_upscaler::UpscalerResult<()> {
//! let mut context = UpscalerContext::new();
//! let settings = context.initialize(UpscalerConfig::new(1920, 1080, QualityTier::Performance))?;
//! let render = (settings.render_width, settings.render_height);
//!
//! let color = Texture::filled(render.0, render.1, Vec3::splat(0.5));
//! let depth = Texture::filled(render.0, render.1, 0.5f32);
//! let motion = Texture::filled(render.0, render.1, Vec2::ZERO);
//! let jitter = context.next_jitter(render)?;
//!
//! let inputs = FrameInputs::new(&color, &depth, &motion)
//!     .with_opaque_color(&color)
//!     .with_jitter(jitter);
//! let output = context.execute(&inputs)?;
//! assert_eq!(output.color.size(), (1920, 1080));
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod color;
pub mod constants;
pub mod context;
pub mod exposure;
pub mod history;
pub mod jitter;
pub mod reactive;
pub mod reprojection;
pub mod sharpen;
pub mod texture;

pub use accumulator::{AccumulationStats, AccumulatorInputs, BlendWeight, TemporalAccumulator};
pub use constants::FrameConstants;
pub use context::{
    CameraParams, ContextState, FrameInputs, FrameOutput, RenderSettings, UpscalerContext,
};
pub use exposure::AutoExposure;
pub use history::{HistoryBuffers, HistoryState};
pub use jitter::{apply_to_projection, JitterOffset, JitterSequencer, JitterState};
pub use reactive::{AutoReactiveParams, ReactiveMaskGenerator, ReactiveMaskParams};
pub use reprojection::{DepthConvention, DilatedMotion, MotionVectorReprojector};
pub use sharpen::Sharpener;
pub use texture::{ColorTexture, DepthTexture, MaskTexture, MotionVectorTexture, Texture};
