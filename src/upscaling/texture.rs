//! 常驻内存的二维纹素缓冲区
//!
//! 调用方拥有所有输入纹理，上下文只在 `execute` 期间借用；
//! 历史缓冲区由上下文独占。

use crate::core::error::{UpscalerError, UpscalerResult};
use glam::{Vec2, Vec3};
use rayon::prelude::*;
use std::ops::{Add, Mul};

/// fp16 可表示的最大有限值，输入钳制上界
pub const MAX_TEXEL_VALUE: f32 = 65504.0;

/// 可插值的纹素类型
pub trait Texel: Copy + Default + Send + Sync + Add<Output = Self> + Mul<f32, Output = Self> {}

impl<T> Texel for T where T: Copy + Default + Send + Sync + Add<Output = T> + Mul<f32, Output = T> {}

/// 二维纹理
#[derive(Debug, Clone, PartialEq)]
pub struct Texture<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

/// 颜色纹理 (线性 RGB)
pub type ColorTexture = Texture<Vec3>;
/// 深度纹理
pub type DepthTexture = Texture<f32>;
/// 运动矢量纹理
pub type MotionVectorTexture = Texture<Vec2>;
/// 标量遮罩纹理
pub type MaskTexture = Texture<f32>;

impl<T: Texel> Texture<T> {
    /// 以可失败的方式分配纹理
    ///
    /// 分配失败时返回 `ResourceAllocationFailure`，不会中止进程。
    pub fn try_new(width: u32, height: u32, fill: T, label: &str) -> UpscalerResult<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| UpscalerError::ResourceAllocationFailure {
                resource: label.to_string(),
                bytes: usize::MAX,
            })?;
        let bytes = len.saturating_mul(std::mem::size_of::<T>());

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| UpscalerError::ResourceAllocationFailure {
                resource: label.to_string(),
                bytes,
            })?;
        data.resize(len, fill);

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// 以常量填充创建纹理
    pub fn filled(width: u32, height: u32, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// 由逐像素函数创建纹理
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> T,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// 由已有数据创建纹理，长度必须等于 `width * height`
    pub fn from_vec(width: u32, height: u32, data: Vec<T>) -> UpscalerResult<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(UpscalerError::InvalidInput {
                input: "texture".to_string(),
                reason: format!("expected {} texels, got {}", expected, data.len()),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// (宽, 高)
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// 读取纹素（坐标必须在范围内）
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> T {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// 写入纹素（坐标必须在范围内）
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: T) {
        let index = y as usize * self.width as usize + x as usize;
        self.data[index] = value;
    }

    /// 以边缘钳制方式读取纹素
    #[inline]
    pub fn load_clamped(&self, x: i32, y: i32) -> T {
        let cx = x.clamp(0, self.width as i32 - 1) as u32;
        let cy = y.clamp(0, self.height as i32 - 1) as u32;
        self.get(cx, cy)
    }

    /// 以归一化坐标读取最近纹素
    #[inline]
    pub fn sample_nearest(&self, uv: Vec2) -> T {
        let px = uv * Vec2::new(self.width as f32, self.height as f32);
        self.load_clamped(px.x.floor() as i32, px.y.floor() as i32)
    }

    /// 以归一化坐标做双线性采样（边缘钳制）
    ///
    /// 纹素中心位于 `(i + 0.5) / size`，在中心处采样返回精确值。
    pub fn sample_bilinear(&self, uv: Vec2) -> T {
        let pos = uv * Vec2::new(self.width as f32, self.height as f32) - Vec2::splat(0.5);
        let base = pos.floor();
        let frac = pos - base;
        let x0 = base.x as i32;
        let y0 = base.y as i32;

        let t00 = self.load_clamped(x0, y0);
        let t10 = self.load_clamped(x0 + 1, y0);
        let t01 = self.load_clamped(x0, y0 + 1);
        let t11 = self.load_clamped(x0 + 1, y0 + 1);

        if frac.x == 0.0 && frac.y == 0.0 {
            return t00;
        }

        let top = t00 * (1.0 - frac.x) + t10 * frac.x;
        let bottom = t01 * (1.0 - frac.x) + t11 * frac.x;
        top * (1.0 - frac.y) + bottom * frac.y
    }

    /// 按行并行填充每个纹素
    pub fn par_fill_with<F>(&mut self, f: F)
    where
        F: Fn(u32, u32) -> T + Send + Sync,
    {
        let width = self.width as usize;
        if width == 0 {
            return;
        }
        self.data
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, texel) in row.iter_mut().enumerate() {
                    *texel = f(x as u32, y as u32);
                }
            });
    }

    /// 以常量覆盖整张纹理
    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|texel| *texel = value);
    }

    /// 占用字节数
    pub fn byte_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<T>()
    }
}

/// 钳制标量到有限非负范围
#[inline]
pub fn sanitize_scalar(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_TEXEL_VALUE)
    }
}

/// 钳制颜色到有限非负范围，非 HDR 输入额外钳制到 [0, 1]
#[inline]
pub fn sanitize_color(color: Vec3, hdr: bool) -> Vec3 {
    let max = if hdr { MAX_TEXEL_VALUE } else { 1.0 };
    Vec3::new(
        sanitize_scalar(color.x).min(max),
        sanitize_scalar(color.y).min(max),
        sanitize_scalar(color.z).min(max),
    )
}

/// 钳制运动矢量，非有限分量置零
#[inline]
pub fn sanitize_motion(motion: Vec2) -> Vec2 {
    let fix = |v: f32| if v.is_finite() { v } else { 0.0 };
    Vec2::new(fix(motion.x), fix(motion.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_and_access() {
        let mut texture = Texture::try_new(4, 3, 0.0f32, "test").unwrap();
        assert_eq!(texture.size(), (4, 3));
        texture.set(3, 2, 5.0);
        assert_eq!(texture.get(3, 2), 5.0);
        assert_eq!(texture.load_clamped(10, 10), 5.0);
        assert_eq!(texture.load_clamped(-1, -1), 0.0);
    }

    #[test]
    fn test_try_new_reports_allocation_failure() {
        let result = Texture::try_new(u32::MAX, u32::MAX, Vec3::ZERO, "huge");
        assert!(matches!(
            result,
            Err(UpscalerError::ResourceAllocationFailure { .. })
        ));
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Texture::from_vec(2, 2, vec![0.0f32; 3]).is_err());
        assert!(Texture::from_vec(2, 2, vec![0.0f32; 4]).is_ok());
    }

    #[test]
    fn test_bilinear_at_texel_center_is_exact() {
        let texture = Texture::from_fn(4, 4, |x, y| (x + 10 * y) as f32);
        let uv = Vec2::new(2.5 / 4.0, 1.5 / 4.0);
        assert_eq!(texture.sample_bilinear(uv), 12.0);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let texture = Texture::from_fn(2, 1, |x, _| x as f32);
        let value = texture.sample_bilinear(Vec2::new(0.5, 0.5));
        assert!((value - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_par_fill_with() {
        let mut texture = Texture::filled(8, 4, 0.0f32);
        texture.par_fill_with(|x, y| (x * y) as f32);
        assert_eq!(texture.get(7, 3), 21.0);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_scalar(f32::NAN), 0.0);
        assert_eq!(sanitize_scalar(f32::INFINITY), MAX_TEXEL_VALUE);
        assert_eq!(sanitize_scalar(-3.0), 0.0);
        let color = sanitize_color(Vec3::new(2.0, f32::NEG_INFINITY, 0.5), false);
        assert_eq!(color, Vec3::new(1.0, 0.0, 0.5));
        let hdr = sanitize_color(Vec3::new(2.0, 0.0, 0.5), true);
        assert_eq!(hdr.x, 2.0);
        assert_eq!(sanitize_motion(Vec2::new(f32::NAN, 0.25)), Vec2::new(0.0, 0.25));
    }
}
