//! 颜色与重建核工具函数

use glam::Vec3;

/// 逆色调映射分母下限 (fp16 最小正规数)
const TONEMAP_EPSILON: f32 = 6.103_515_6e-5;

/// Rec.709 亮度
#[inline]
pub fn luminance(color: Vec3) -> f32 {
    color.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

/// 可逆色调映射 `c / (1 + max(c))`
#[inline]
pub fn tonemap(color: Vec3) -> Vec3 {
    color / (1.0 + color.max_element())
}

/// `tonemap` 的逆变换
#[inline]
pub fn inverse_tonemap(color: Vec3) -> Vec3 {
    color / (1.0 - color.max_element()).max(TONEMAP_EPSILON)
}

/// Lanczos-2 多项式近似，输入为距离平方
///
/// 距离超过 2 个像素时权重为 0。
#[inline]
pub fn lanczos2_approx_sq(distance_sq: f32) -> f32 {
    if distance_sq >= 4.0 {
        return 0.0;
    }
    let a = 2.0 / 5.0 * distance_sq - 1.0;
    let b = 1.0 / 4.0 * distance_sq - 1.0;
    (25.0 / 16.0 * a * a - (25.0 / 16.0 - 1.0)) * (b * b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_of_white() {
        assert!((luminance(Vec3::ONE) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tonemap_round_trip() {
        let color = Vec3::new(3.0, 0.5, 0.25);
        let back = inverse_tonemap(tonemap(color));
        assert!((back - color).abs().max_element() < 1e-4);
        assert!(tonemap(Vec3::splat(1000.0)).max_element() < 1.0);
    }

    #[test]
    fn test_lanczos_shape() {
        assert!((lanczos2_approx_sq(0.0) - 1.0).abs() < 1e-6);
        assert!(lanczos2_approx_sq(1.0).abs() < 1e-6);
        // 负瓣
        assert!(lanczos2_approx_sq(2.25) < 0.0);
        assert_eq!(lanczos2_approx_sq(4.0), 0.0);
    }
}
