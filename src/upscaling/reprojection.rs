//! 运动矢量重投影
//!
//! 先在渲染分辨率做深度线性化和运动矢量膨胀，再为每个输出像素
//! 计算历史缓冲区中的采样坐标，并用深度比较判断遮挡剔除。

use crate::config::FeatureFlags;
use crate::core::error::UpscalerResult;
use crate::upscaling::constants::FrameConstants;
use crate::upscaling::texture::{sanitize_motion, DepthTexture, MotionVectorTexture, Texture};
use glam::Vec2;
use rayon::prelude::*;

/// 线性深度上限 (无限远平面时的远处)
pub const MAX_LINEAR_DEPTH: f32 = 1.0e7;

/// 相对深度容差
const RELATIVE_DEPTH_TOLERANCE: f32 = 0.01;

/// 相机深度约定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthConvention {
    pub near: f32,
    pub far: f32,
    /// 反向深度 (近平面 = 1)
    pub inverted: bool,
    /// 无限远平面
    pub infinite: bool,
}

impl DepthConvention {
    pub fn from_constants(constants: &FrameConstants) -> Self {
        Self {
            near: constants.camera_near,
            far: constants.camera_far,
            inverted: constants.has_flag(FeatureFlags::DEPTH_INVERTED),
            infinite: constants.has_flag(FeatureFlags::DEPTH_INFINITE),
        }
    }

    /// 设备深度到线性视空间深度
    pub fn linearize(&self, device_depth: f32) -> f32 {
        let depth = if device_depth.is_nan() {
            self.far_plane_depth()
        } else {
            device_depth.clamp(0.0, 1.0)
        };
        // 统一到 0 = 近平面, 1 = 远平面
        let d = if self.inverted { 1.0 - depth } else { depth };

        let z = if self.infinite {
            self.near / (1.0 - d)
        } else {
            self.near * self.far / (self.far - d * (self.far - self.near))
        };

        if z.is_finite() {
            z.clamp(0.0, MAX_LINEAR_DEPTH)
        } else {
            MAX_LINEAR_DEPTH
        }
    }

    /// 远平面处的设备深度
    pub fn far_plane_depth(&self) -> f32 {
        if self.inverted {
            0.0
        } else {
            1.0
        }
    }
}

/// 膨胀后的渲染分辨率运动数据
#[derive(Debug, Clone)]
pub struct DilatedMotion {
    /// UV 空间运动 (当前 -> 上一帧)
    pub motion: Texture<Vec2>,
    /// 3x3 邻域最近的线性深度
    pub depth: DepthTexture,
    /// 3x3 邻域线性深度的最大差
    pub depth_gradient: DepthTexture,
}

/// 单个输出像素的重投影结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReprojectedSample {
    /// 历史缓冲区采样坐标
    pub history_uv: Vec2,
    /// 历史是否可用
    pub valid: bool,
    /// 当前线性深度
    pub depth: f32,
}

/// 运动矢量重投影器
#[derive(Debug, Clone, Copy)]
pub struct MotionVectorReprojector {
    convention: DepthConvention,
    motion_vector_scale: Vec2,
    jitter_cancellation: Vec2,
    pixel_footprint: f32,
}

impl MotionVectorReprojector {
    pub fn new(constants: &FrameConstants) -> Self {
        Self {
            convention: DepthConvention::from_constants(constants),
            motion_vector_scale: Vec2::from(constants.motion_vector_scale),
            jitter_cancellation: Vec2::from(constants.jitter_cancellation),
            pixel_footprint: constants.pixel_footprint,
        }
    }

    /// 原始运动矢量到 UV 位移
    #[inline]
    pub fn motion_to_uv(&self, raw: Vec2) -> Vec2 {
        sanitize_motion(raw) * self.motion_vector_scale - self.jitter_cancellation
    }

    /// 深度线性化与运动矢量膨胀
    ///
    /// 每个渲染像素取 3x3 邻域中最近深度处的运动矢量；线性化后最近即最小，
    /// 与深度约定无关。
    /// 运动矢量纹理可以是渲染或显示分辨率。
    pub fn dilate(
        &self,
        depth: &DepthTexture,
        motion_vectors: &MotionVectorTexture,
    ) -> UpscalerResult<DilatedMotion> {
        let (width, height) = depth.size();

        let mut linear = Texture::try_new(width, height, 0.0f32, "linear depth")?;
        linear.par_fill_with(|x, y| self.convention.linearize(depth.get(x, y)));

        let mut motion = Texture::try_new(width, height, Vec2::ZERO, "dilated motion")?;
        let mut dilated_depth = Texture::try_new(width, height, 0.0f32, "dilated depth")?;
        let mut gradient = Texture::try_new(width, height, 0.0f32, "depth gradient")?;

        let row = width as usize;
        if row == 0 {
            return Ok(DilatedMotion {
                motion,
                depth: dilated_depth,
                depth_gradient: gradient,
            });
        }
        let inv_size = Vec2::new(1.0 / width as f32, 1.0 / height as f32);

        motion
            .data_mut()
            .par_chunks_mut(row)
            .zip(dilated_depth.data_mut().par_chunks_mut(row))
            .zip(gradient.data_mut().par_chunks_mut(row))
            .enumerate()
            .for_each(|(y, ((motion_row, depth_row), gradient_row))| {
                for x in 0..row {
                    let (cx, cy) = (x as i32, y as i32);
                    let mut closest = (cx, cy);
                    let mut min_depth = f32::MAX;
                    let mut max_depth = 0.0f32;

                    for dy in -1..=1 {
                        for dx in -1..=1 {
                            let z = linear.load_clamped(cx + dx, cy + dy);
                            if z < min_depth {
                                min_depth = z;
                                closest = (
                                    (cx + dx).clamp(0, width as i32 - 1),
                                    (cy + dy).clamp(0, height as i32 - 1),
                                );
                            }
                            max_depth = max_depth.max(z);
                        }
                    }

                    let uv = (Vec2::new(closest.0 as f32, closest.1 as f32) + Vec2::splat(0.5))
                        * inv_size;
                    motion_row[x] = self.motion_to_uv(motion_vectors.sample_nearest(uv));
                    depth_row[x] = min_depth;
                    gradient_row[x] = max_depth - min_depth;
                }
            });

        Ok(DilatedMotion {
            motion,
            depth: dilated_depth,
            depth_gradient: gradient,
        })
    }

    /// 深度差容差
    ///
    /// 相对项 + 两个像素的投影尺寸 + 邻域深度梯度。
    #[inline]
    pub fn disocclusion_tolerance(&self, current: f32, previous: f32, gradient: f32) -> f32 {
        let z = current.max(previous);
        RELATIVE_DEPTH_TOLERANCE * z + 2.0 * self.pixel_footprint * z + gradient
    }

    /// 计算输出像素的历史采样坐标与有效性
    ///
    /// `previous_depth` 为 `None` 表示没有可用历史。
    pub fn reproject(
        &self,
        uv: Vec2,
        dilated: &DilatedMotion,
        previous_depth: Option<&DepthTexture>,
    ) -> ReprojectedSample {
        let history_uv = uv + dilated.motion.sample_nearest(uv);
        let depth = dilated.depth.sample_nearest(uv);

        let in_bounds = (0.0..=1.0).contains(&history_uv.x) && (0.0..=1.0).contains(&history_uv.y);
        let valid = in_bounds
            && previous_depth.is_some_and(|previous| {
                let previous = previous.sample_nearest(history_uv);
                let gradient = dilated.depth_gradient.sample_nearest(uv);
                (depth - previous).abs() <= self.disocclusion_tolerance(depth, previous, gradient)
            });

        ReprojectedSample {
            history_uv,
            valid,
            depth,
        }
    }
}
