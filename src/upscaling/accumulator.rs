//! 时间累积
//!
//! 每个输出像素：在渲染分辨率邻域上做 Lanczos 重建得到新样本，
//! 取重投影后的历史并约束到邻域颜色盒内，再按信任度混合。
//! 结果同时写入历史写缓冲区，提交后作为下一帧的历史。

use crate::core::error::{UpscalerError, UpscalerResult};
use crate::upscaling::color::{lanczos2_approx_sq, luminance, tonemap};
use crate::upscaling::constants::{FrameConstants, REACTIVE_MODE_AUTO_INLINE};
use crate::upscaling::history::HistoryState;
use crate::upscaling::reactive::{auto_reactive, AutoReactiveParams, AutoReactiveSample};
use crate::upscaling::reprojection::{DilatedMotion, MotionVectorReprojector};
use crate::upscaling::texture::{ColorTexture, MaskTexture};
use glam::{Vec2, Vec3};
use rayon::prelude::*;

/// 稳定性度量的分母偏置
const STABILITY_EPSILON: f32 = 1e-3;

/// 重建权重和的下限，低于此值退化为最近样本
const MIN_KERNEL_WEIGHT: f32 = 1e-4;

/// 累积阶段输入 (渲染分辨率，已做数值清理)
#[derive(Clone, Copy)]
pub struct AccumulatorInputs<'a> {
    pub color: &'a ColorTexture,
    /// 仅不透明颜色，内联自动反应遮罩使用
    pub opaque: Option<&'a ColorTexture>,
    pub reactive: Option<&'a MaskTexture>,
    pub composition: Option<&'a MaskTexture>,
    pub dilated: &'a DilatedMotion,
}

/// 新样本邻域统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbourhood {
    /// 重建并去振铃后的新样本
    pub color: Vec3,
    pub min: Vec3,
    pub max: Vec3,
    /// 各通道标准差
    pub stddev: Vec3,
    /// 曝光并色调映射后亮度的标准差
    pub luma_stddev: f32,
    /// 最近的渲染像素
    pub center: (u32, u32),
}

/// 混合权重
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeight {
    /// 新样本权重
    pub alpha: f32,
    /// 写回历史的样本数
    pub samples: f32,
}

/// 单帧累积统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccumulationStats {
    /// 复用了历史的像素数
    pub history_pixels: usize,
    /// 输出像素总数
    pub total_pixels: usize,
}

/// 时间累积器
#[derive(Debug, Clone, Copy)]
pub struct TemporalAccumulator {
    reprojector: MotionVectorReprojector,
    render_size: Vec2,
    display_size: Vec2,
    jitter: Vec2,
    kernel_scale: f32,
    exposure: f32,
    weight_floor: f32,
    auto_reactive: Option<AutoReactiveParams>,
}

impl TemporalAccumulator {
    pub fn new(constants: &FrameConstants) -> Self {
        let render_size = constants.render_size_f();
        let display_size = constants.display_size_f();
        let auto_reactive = (constants.reactive_mode == REACTIVE_MODE_AUTO_INLINE)
            .then(|| AutoReactiveParams::from(constants));

        Self {
            reprojector: MotionVectorReprojector::new(constants),
            render_size,
            display_size,
            jitter: constants.jitter_vec(),
            kernel_scale: (render_size.y / display_size.y.max(1.0)).min(1.0),
            exposure: constants.exposure,
            weight_floor: constants.new_sample_weight_floor,
            auto_reactive,
        }
    }

    /// 混合权重
    ///
    /// 信任度为零时完全使用新样本；否则新样本权重不低于 `floor`，
    /// 样本数不超过 `1 / floor`。
    pub fn blend_weight(previous_samples: f32, trust: f32, floor: f32) -> BlendWeight {
        if trust <= 0.0 || previous_samples <= 0.0 {
            return BlendWeight {
                alpha: 1.0,
                samples: 1.0,
            };
        }
        let effective = previous_samples * trust.min(1.0);
        BlendWeight {
            alpha: (1.0 / (effective + 1.0)).max(floor),
            samples: (effective + 1.0).min(1.0 / floor),
        }
    }

    #[inline]
    fn stability_luma(&self, color: Vec3) -> f32 {
        luminance(tonemap(color * self.exposure))
    }

    /// 在 3x3 渲染邻域上重建新样本并统计颜色盒
    pub fn reconstruct(&self, color: &ColorTexture, uv: Vec2) -> Neighbourhood {
        let position = uv * self.render_size;
        let base = (position - self.jitter).floor();
        let (bx, by) = (base.x as i32, base.y as i32);

        let mut weighted = Vec3::ZERO;
        let mut weight_sum = 0.0f32;
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut sum = Vec3::ZERO;
        let mut sum_sq = Vec3::ZERO;
        let mut luma_sum = 0.0f32;
        let mut luma_sum_sq = 0.0f32;

        for dy in -1..=1 {
            for dx in -1..=1 {
                let sample = color.load_clamped(bx + dx, by + dy);
                let sample_position =
                    Vec2::new((bx + dx) as f32, (by + dy) as f32) + Vec2::splat(0.5) + self.jitter;
                let offset = (sample_position - position) * self.kernel_scale;
                let weight = lanczos2_approx_sq(offset.length_squared());

                weighted += sample * weight;
                weight_sum += weight;
                min = min.min(sample);
                max = max.max(sample);
                sum += sample;
                sum_sq += sample * sample;

                let luma = self.stability_luma(sample);
                luma_sum += luma;
                luma_sum_sq += luma * luma;
            }
        }

        let center = (
            bx.clamp(0, color.width() as i32 - 1) as u32,
            by.clamp(0, color.height() as i32 - 1) as u32,
        );
        let reconstructed = if weight_sum > MIN_KERNEL_WEIGHT {
            weighted / weight_sum
        } else {
            color.get(center.0, center.1)
        };

        let mean = sum / 9.0;
        let variance = (sum_sq / 9.0 - mean * mean).max(Vec3::ZERO);
        let luma_mean = luma_sum / 9.0;
        let luma_variance = (luma_sum_sq / 9.0 - luma_mean * luma_mean).max(0.0);

        Neighbourhood {
            color: reconstructed.clamp(min, max),
            min,
            max,
            stddev: variance.powf(0.5),
            luma_stddev: luma_variance.sqrt(),
            center,
        }
    }

    fn reactivity(&self, inputs: &AccumulatorInputs<'_>, center: (u32, u32)) -> AutoReactiveSample {
        if let (Some(params), Some(opaque)) = (&self.auto_reactive, inputs.opaque) {
            return auto_reactive(
                inputs.color.get(center.0, center.1),
                opaque.get(center.0, center.1),
                params,
            );
        }
        AutoReactiveSample {
            reactive: inputs.reactive.map_or(0.0, |m| m.get(center.0, center.1)),
            composition: inputs.composition.map_or(0.0, |m| m.get(center.0, center.1)),
        }
    }

    /// 累积一帧并提交历史
    pub fn accumulate(
        &self,
        inputs: &AccumulatorInputs<'_>,
        history: &mut HistoryState,
    ) -> UpscalerResult<AccumulationStats> {
        let display = (self.display_size.x as u32, self.display_size.y as u32);
        if history.display_size() != display {
            return Err(UpscalerError::InvalidInput {
                input: "history".to_string(),
                reason: format!(
                    "history is {:?} but display is {:?}",
                    history.display_size(),
                    display
                ),
            });
        }

        let history_valid = history.is_valid();
        let (read, write) = history.split();
        let previous_depth = history_valid.then_some(&read.depth);
        let row = display.0 as usize;
        let inv_display = Vec2::ONE / self.display_size;

        let history_pixels: usize = write
            .color
            .data_mut()
            .par_chunks_mut(row.max(1))
            .zip(write.samples.data_mut().par_chunks_mut(row.max(1)))
            .zip(write.depth.data_mut().par_chunks_mut(row.max(1)))
            .enumerate()
            .map(|(y, ((color_row, samples_row), depth_row))| {
                let mut reused = 0;
                for x in 0..color_row.len() {
                    let uv = (Vec2::new(x as f32, y as f32) + Vec2::splat(0.5)) * inv_display;
                    let neighbourhood = self.reconstruct(inputs.color, uv);
                    let reprojected = self.reprojector.reproject(uv, inputs.dilated, previous_depth);

                    let (output, samples) = if reprojected.valid {
                        let history_color = read.color.sample_bilinear(reprojected.history_uv);
                        let previous_samples = read.samples.sample_nearest(reprojected.history_uv);

                        let box_min = neighbourhood.min - neighbourhood.stddev;
                        let box_max = neighbourhood.max + neighbourhood.stddev;
                        let rectified = history_color.clamp(box_min, box_max);

                        let distance = (self.stability_luma(rectified)
                            - self.stability_luma(history_color))
                        .abs();
                        let stability = 1.0
                            - (distance / (neighbourhood.luma_stddev + STABILITY_EPSILON))
                                .clamp(0.0, 1.0);

                        let reactivity = self.reactivity(inputs, neighbourhood.center);
                        let trust = (1.0 - reactivity.reactive.clamp(0.0, 1.0))
                            * (1.0 - 0.5 * reactivity.composition.clamp(0.0, 1.0))
                            * stability;

                        let weight = Self::blend_weight(previous_samples, trust, self.weight_floor);
                        if weight.alpha >= 1.0 {
                            (neighbourhood.color, weight.samples)
                        } else {
                            reused += 1;
                            (
                                rectified + (neighbourhood.color - rectified) * weight.alpha,
                                weight.samples,
                            )
                        }
                    } else {
                        (neighbourhood.color, 1.0)
                    };

                    color_row[x] = output;
                    samples_row[x] = samples;
                    depth_row[x] = reprojected.depth;
                }
                reused
            })
            .sum();

        history.commit();

        Ok(AccumulationStats {
            history_pixels,
            total_pixels: display.0 as usize * display.1 as usize,
        })
    }
}
