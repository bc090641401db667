//! 对比度自适应锐化 (RCAS)
//!
//! 在显示分辨率输出上读取十字邻域，按局部对比度计算负瓣权重。
//! 输出钳制到十字邻域的最小/最大值，不会产生振铃。

use crate::upscaling::constants::FrameConstants;
use crate::upscaling::texture::ColorTexture;
use glam::Vec3;

/// 负瓣上限
pub const RCAS_LIMIT: f32 = 0.25 - 1.0 / 16.0;

/// 除零保护
const RCAS_EPSILON: f32 = 1e-6;

/// 锐度 [0, 1] 到 RCAS 强度
///
/// 锐度 1 对应 0 档衰减 (最强)，锐度 0 对应 2 档。
pub fn rcas_con(sharpness: f32) -> f32 {
    let stops = 2.0 - 2.0 * sharpness.clamp(0.0, 1.0);
    (-stops).exp2()
}

/// 锐化器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpener {
    con: f32,
    enabled: bool,
    hdr: bool,
    denoise: bool,
}

impl Sharpener {
    pub fn new(sharpness: f32, enabled: bool, hdr: bool) -> Self {
        Self {
            con: rcas_con(sharpness),
            enabled,
            hdr,
            denoise: true,
        }
    }

    pub fn from_constants(constants: &FrameConstants) -> Self {
        Self {
            con: constants.sharpening_con,
            enabled: constants.sharpening_enabled != 0,
            hdr: constants.hdr(),
            denoise: true,
        }
    }

    /// 关闭噪声抑制
    pub fn with_denoise(mut self, denoise: bool) -> Self {
        self.denoise = denoise;
        self
    }

    /// 锐化整张图像；未启用时原样返回副本
    pub fn apply(&self, input: &ColorTexture) -> ColorTexture {
        let mut output = input.clone();
        if self.enabled {
            output.par_fill_with(|x, y| self.sharpen_pixel(input, x as i32, y as i32));
        }
        output
    }

    /// 单像素 RCAS
    pub fn sharpen_pixel(&self, input: &ColorTexture, x: i32, y: i32) -> Vec3 {
        let b = input.load_clamped(x, y - 1);
        let d = input.load_clamped(x - 1, y);
        let e = input.load_clamped(x, y);
        let f = input.load_clamped(x + 1, y);
        let h = input.load_clamped(x, y + 1);

        let mn4 = b.min(d).min(f).min(h);
        let mx4 = b.max(d).max(f).max(h);
        let peak = if self.hdr {
            mx4.max_element().max(e.max_element()).max(1.0)
        } else {
            1.0
        };

        let hit_min = mn4 / (4.0 * mx4).max(Vec3::splat(RCAS_EPSILON));
        let hit_max = (Vec3::splat(peak) - mx4)
            / (4.0 * mn4 - Vec3::splat(4.0 * peak)).min(Vec3::splat(-RCAS_EPSILON));
        let lobe_rgb = (-hit_min).max(hit_max);
        let mut lobe = lobe_rgb.max_element().min(0.0).max(-RCAS_LIMIT) * self.con;

        if self.denoise {
            let luma = |c: Vec3| c.y + 0.5 * (c.x + c.z);
            let (bl, dl, el, fl, hl) = (luma(b), luma(d), luma(e), luma(f), luma(h));
            let range = bl.max(dl).max(el).max(fl).max(hl) - bl.min(dl).min(el).min(fl).min(hl);
            let noise = if range > RCAS_EPSILON {
                ((0.25 * (bl + dl + fl + hl) - el).abs() / range).clamp(0.0, 1.0)
            } else {
                0.0
            };
            lobe *= 1.0 - 0.5 * noise;
        }

        let sharpened = (lobe * (b + d + f + h) + e) / (4.0 * lobe + 1.0);
        sharpened.clamp(mn4.min(e), mx4.max(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upscaling::texture::Texture;
    use proptest::prelude::*;

    #[test]
    fn test_con_mapping() {
        assert_eq!(rcas_con(1.0), 1.0);
        assert_eq!(rcas_con(0.0), 0.25);
        assert!(rcas_con(0.3) < rcas_con(0.7));
    }

    #[test]
    fn test_disabled_is_passthrough() {
        let input = Texture::from_fn(4, 4, |x, y| Vec3::splat((x * y) as f32 / 9.0));
        let sharpener = Sharpener::new(1.0, false, false);
        assert_eq!(sharpener.apply(&input), input);
    }

    #[test]
    fn test_flat_image_unchanged() {
        let input = Texture::filled(5, 5, Vec3::splat(0.5));
        let output = Sharpener::new(1.0, true, false).apply(&input);
        assert_eq!(output, input);
    }

    #[test]
    fn test_local_contrast_increases() {
        // 中心比十字邻域平均值暗，锐化后更暗但不低于邻域最小值
        let input = Texture::from_fn(3, 3, |x, y| match (x, y) {
            (0, 1) => Vec3::splat(0.2),
            (2, 1) => Vec3::splat(0.8),
            (1, 0) | (1, 2) => Vec3::splat(0.6),
            _ => Vec3::splat(0.5),
        });
        let output = Sharpener::new(1.0, true, false).with_denoise(false).apply(&input);
        let center = output.get(1, 1).x;
        assert!(center < 0.5 && center > 0.2);
    }

    proptest! {
        #[test]
        fn test_output_within_cross_neighbourhood(
            values in proptest::collection::vec(0.0f32..4.0, 27),
            sharpness in 0.0f32..1.0,
            hdr in any::<bool>(),
        ) {
            let input = Texture::from_fn(3, 3, |x, y| {
                let i = ((y * 3 + x) * 3) as usize;
                let c = Vec3::new(values[i], values[i + 1], values[i + 2]);
                if hdr { c } else { c.min(Vec3::ONE) }
            });
            let output = Sharpener::new(sharpness, true, hdr).apply(&input);
            for y in 0..3i32 {
                for x in 0..3i32 {
                    let cross = [
                        input.load_clamped(x, y),
                        input.load_clamped(x, y - 1),
                        input.load_clamped(x - 1, y),
                        input.load_clamped(x + 1, y),
                        input.load_clamped(x, y + 1),
                    ];
                    let lo = cross.iter().fold(Vec3::splat(f32::MAX), |a, c| a.min(*c));
                    let hi = cross.iter().fold(Vec3::splat(f32::MIN), |a, c| a.max(*c));
                    let out = output.get(x as u32, y as u32);

                    // 属性: 不超出十字邻域范围
                    prop_assert!(out.cmpge(lo).all() && out.cmple(hi).all());
                    prop_assert!(out.is_finite());
                }
            }
        }
    }
}
