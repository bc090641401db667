//! 历史状态
//!
//! 显示分辨率的累积颜色、样本计数和上一帧线性深度，双缓冲交替读写。
//! 尺寸始终等于当前显示分辨率；分辨率或深度约定变化时整体重新分配。

use crate::core::error::UpscalerResult;
use crate::upscaling::exposure::AutoExposure;
use crate::upscaling::texture::{ColorTexture, DepthTexture, Texture};
use glam::Vec3;

/// 一组历史缓冲区
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffers {
    /// 累积颜色
    pub color: ColorTexture,
    /// 有效样本数
    pub samples: Texture<f32>,
    /// 线性深度
    pub depth: DepthTexture,
}

impl HistoryBuffers {
    fn allocate(width: u32, height: u32) -> UpscalerResult<Self> {
        Ok(Self {
            color: Texture::try_new(width, height, Vec3::ZERO, "history color")?,
            samples: Texture::try_new(width, height, 0.0, "history sample count")?,
            depth: Texture::try_new(width, height, 0.0, "history depth")?,
        })
    }

    fn byte_size(&self) -> usize {
        self.color.byte_size() + self.samples.byte_size() + self.depth.byte_size()
    }
}

/// 上下文独占的跨帧状态
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryState {
    buffers: [HistoryBuffers; 2],
    /// 当前可读的缓冲区索引
    current: usize,
    /// 历史内容是否有效
    valid: bool,
    /// 自动曝光
    exposure: AutoExposure,
    /// 自上次失效以来累积的帧数
    frames_accumulated: u64,
}

impl HistoryState {
    /// 分配显示分辨率的历史缓冲区
    ///
    /// 新分配的历史无效，第一帧完全使用新样本。
    pub fn allocate(display: (u32, u32)) -> UpscalerResult<Self> {
        let (width, height) = display;
        Ok(Self {
            buffers: [
                HistoryBuffers::allocate(width, height)?,
                HistoryBuffers::allocate(width, height)?,
            ],
            current: 0,
            valid: false,
            exposure: AutoExposure::new(),
            frames_accumulated: 0,
        })
    }

    pub fn display_size(&self) -> (u32, u32) {
        self.buffers[self.current].color.size()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn frames_accumulated(&self) -> u64 {
        self.frames_accumulated
    }

    /// 标记历史无效，不重新分配
    pub fn invalidate(&mut self) {
        self.valid = false;
        self.frames_accumulated = 0;
        self.exposure.reset();
    }

    /// 上一帧写入的缓冲区
    pub fn current(&self) -> &HistoryBuffers {
        &self.buffers[self.current]
    }

    /// 同时借出读缓冲区与写缓冲区
    pub fn split(&mut self) -> (&HistoryBuffers, &mut HistoryBuffers) {
        let (first, second) = self.buffers.split_at_mut(1);
        if self.current == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    /// 写缓冲区成为下一帧的历史
    pub fn commit(&mut self) {
        self.current = 1 - self.current;
        self.valid = true;
        self.frames_accumulated += 1;
    }

    pub fn exposure(&self) -> &AutoExposure {
        &self.exposure
    }

    pub fn exposure_mut(&mut self) -> &mut AutoExposure {
        &mut self.exposure
    }

    /// 历史占用的字节数
    pub fn byte_size(&self) -> usize {
        self.buffers.iter().map(HistoryBuffers::byte_size).sum()
    }
}
