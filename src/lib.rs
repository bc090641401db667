//! # FSR Upscaler
//!
//! A temporal super-resolution library in the style of AMD FidelityFX Super Resolution 2,
//! running on the CPU with rayon.
//!
//! ## Features
//!
//! - **Quality Tiers**: Quality / Balanced / Performance / UltraPerformance render scales with matching mip bias
//! - **Sub-pixel Jitter**: Halton(2, 3) sequence whose phase length grows with the upscale ratio
//! - **Temporal Accumulation**: Lanczos reconstruction, motion-vector reprojection, history rectification
//! - **Reactive Masks**: external, generated from opaque-only color, or estimated inline
//! - **Sharpening**: robust contrast adaptive sharpening (RCAS)
//! - **Configuration**: TOML/JSON files with environment overrides
//!
//! ## Architecture Design
//!
//! 上下文持有全部跨帧状态，每帧严格按顺序执行各阶段：
//! - **State**: [`upscaling::HistoryState`] 双缓冲历史与自动曝光
//! - **Stage**: 无状态的阶段对象，由 [`upscaling::FrameConstants`] 构造
//! - **Context**: [`upscaling::UpscalerContext`] 负责校验、调度与状态机
//!
//! ### Example
//!
//! ```no_run
//! use fsr_upscaler::config::{QualityTier, UpscalerConfig};
//! use fsr_upscaler::upscaling::UpscalerContext;
//!
//! let mut context = UpscalerContext::new();
//! let settings = context
//!     .initialize(UpscalerConfig::new(2560, 1440, QualityTier::Quality))
//!     .expect("initialize");
//! println!("render at {}x{}", settings.render_width, settings.render_height);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Errors, logging and shared macros
//! - [`config`]: Context configuration
//! - [`upscaling`]: Pipeline stages and the upscaler context

/// Errors, logging and shared macros
pub mod core;
/// Configuration system
pub mod config;
/// Temporal upscaling pipeline
pub mod upscaling;

pub use config::{FeatureFlags, QualityTier, ReactiveMaskMode, UpscalerConfig};
pub use core::{UpscalerError, UpscalerResult};
pub use upscaling::{FrameInputs, FrameOutput, RenderSettings, UpscalerContext};
