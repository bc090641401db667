//! 子像素抖动序列
//!
//! Halton(2, 3) 低差异序列，相位长度随超分比例增长。
//! 序列完全由索引决定，重置后可逐帧复现。

use glam::{Mat4, Vec2};
use serde::{Deserialize, Serialize};

/// 最小相位长度
pub const BASE_PHASE_COUNT: u32 = 8;

/// 抖动偏移 (渲染像素，范围约 [-0.5, 0.5])
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JitterOffset {
    pub x: f32,
    pub y: f32,
}

impl JitterOffset {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// 抖动状态快照
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JitterState {
    /// 下一次调用使用的索引
    pub index: u32,
    /// 当前相位长度
    pub phase_count: u32,
    /// 最近一次生成的偏移
    pub offset: JitterOffset,
    /// 最近一次偏移对应的裁剪空间平移
    pub projection_offset: Vec2,
}

/// 抖动序列生成器
#[derive(Debug, Clone, Default)]
pub struct JitterSequencer {
    state: JitterState,
}

impl JitterSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由渲染/显示宽度计算相位长度
    pub fn phase_count(render_width: u32, display_width: u32) -> u32 {
        if render_width == 0 {
            return BASE_PHASE_COUNT;
        }
        let ratio = display_width as f32 / render_width as f32;
        let phase = (BASE_PHASE_COUNT as f32 * ratio * ratio).round() as u32;
        phase.max(BASE_PHASE_COUNT)
    }

    /// 给定索引处的偏移
    pub fn offset_at(index: u32) -> JitterOffset {
        JitterOffset::new(halton(index + 1, 2) - 0.5, halton(index + 1, 3) - 0.5)
    }

    /// 生成本帧偏移并推进索引
    ///
    /// 相位长度变化时索引对新相位取模，不会越界。
    pub fn next(&mut self, render_width: u32, render_height: u32, display_width: u32) -> JitterOffset {
        let phase = Self::phase_count(render_width, display_width);
        let index = self.state.index % phase;
        let offset = Self::offset_at(index);

        self.state = JitterState {
            index: (index + 1) % phase,
            phase_count: phase,
            offset,
            projection_offset: jitter_to_projection_offset(offset, render_width, render_height),
        };
        offset
    }

    /// 重置到序列开头
    pub fn reset(&mut self) {
        self.state = JitterState::default();
    }

    pub fn index(&self) -> u32 {
        self.state.index
    }

    pub fn state(&self) -> JitterState {
        self.state
    }
}

/// Halton 序列
pub fn halton(mut index: u32, base: u32) -> f32 {
    let mut result = 0.0;
    let mut f = 1.0 / base as f32;
    while index > 0 {
        result += f * (index % base) as f32;
        index /= base;
        f /= base as f32;
    }
    result
}

/// 像素抖动到裁剪空间平移
///
/// 纹理空间 y 向下，裁剪空间 y 向上。
pub fn jitter_to_projection_offset(offset: JitterOffset, render_width: u32, render_height: u32) -> Vec2 {
    if render_width == 0 || render_height == 0 {
        return Vec2::ZERO;
    }
    Vec2::new(
        2.0 * offset.x / render_width as f32,
        -2.0 * offset.y / render_height as f32,
    )
}

/// 把抖动叠加到投影矩阵
///
/// 在裁剪空间左乘平移，透视与正交投影均得到相同的 NDC 偏移。
pub fn apply_to_projection(
    projection: Mat4,
    offset: JitterOffset,
    render_width: u32,
    render_height: u32,
) -> Mat4 {
    let translation = jitter_to_projection_offset(offset, render_width, render_height);
    Mat4::from_translation(translation.extend(0.0)) * projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_halton_values() {
        assert_eq!(halton(1, 2), 0.5);
        assert_eq!(halton(2, 2), 0.25);
        assert!((halton(1, 3) - 1.0 / 3.0).abs() < 1e-6);
        assert!((halton(2, 3) - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_phase_count() {
        assert_eq!(JitterSequencer::phase_count(1920, 1920), 8);
        assert_eq!(JitterSequencer::phase_count(1280, 1920), 18);
        assert_eq!(JitterSequencer::phase_count(960, 1920), 32);
        assert_eq!(JitterSequencer::phase_count(640, 1920), 72);
        assert_eq!(JitterSequencer::phase_count(0, 1920), 8);
    }

    #[test]
    fn test_sequence_is_periodic() {
        for (render, display) in [(1920, 1920), (960, 1920), (640, 1920)] {
            let phase = JitterSequencer::phase_count(render, display) as usize;
            let mut sequencer = JitterSequencer::new();
            let offsets: Vec<_> = (0..phase * 3)
                .map(|_| sequencer.next(render, render, display))
                .collect();
            for i in 0..phase * 2 {
                assert_eq!(offsets[i], offsets[i + phase]);
            }
        }
    }

    #[test]
    fn test_mean_is_centered() {
        for (render, display) in [(1920, 1920), (1280, 1920), (960, 1920), (640, 1920)] {
            let phase = JitterSequencer::phase_count(render, display);
            let mut sequencer = JitterSequencer::new();
            let mut sum = Vec2::ZERO;
            for _ in 0..phase {
                sum += sequencer.next(render, render, display).as_vec2();
            }
            let mean = sum / phase as f32;
            let epsilon = 1.0 / phase as f32;
            assert!(mean.x.abs() <= epsilon, "phase {} mean {:?}", phase, mean);
            assert!(mean.y.abs() <= epsilon, "phase {} mean {:?}", phase, mean);
        }
    }

    #[test]
    fn test_offsets_in_range() {
        let mut sequencer = JitterSequencer::new();
        for _ in 0..100 {
            let offset = sequencer.next(640, 360, 1920);
            assert!(offset.x >= -0.5 && offset.x < 0.5);
            assert!(offset.y >= -0.5 && offset.y < 0.5);
        }
    }

    #[test]
    fn test_reset_reproduces_sequence() {
        let mut sequencer = JitterSequencer::new();
        let first: Vec<_> = (0..10).map(|_| sequencer.next(960, 540, 1920)).collect();
        sequencer.reset();
        assert_eq!(sequencer.index(), 0);
        let second: Vec<_> = (0..10).map(|_| sequencer.next(960, 540, 1920)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_projection_offset() {
        let offset = JitterOffset::new(0.25, -0.25);
        let translation = jitter_to_projection_offset(offset, 100, 50);
        assert!((translation.x - 0.005).abs() < 1e-7);
        assert!((translation.y - 0.01).abs() < 1e-7);

        let projection = Mat4::perspective_rh(1.0, 2.0, 0.1, 100.0);
        let jittered = apply_to_projection(projection, offset, 100, 50);
        // 视空间点经投影后，NDC 平移量等于 translation
        let point = Vec4::new(0.3, -0.2, -5.0, 1.0);
        let a = projection * point;
        let b = jittered * point;
        let delta = b.truncate().truncate() / b.w - a.truncate().truncate() / a.w;
        assert!((delta - translation).abs().max_element() < 1e-5);
    }
}
