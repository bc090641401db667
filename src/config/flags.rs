//! 上下文特性标志与遮罩生成选项
//!
//! 位值与 FSR2 初始化标志一致，序列化为标志名列表。

use crate::core::error::{UpscalerError, UpscalerResult};
use bitflags::Flags;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags::bitflags! {
    /// 上下文特性标志集合
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[repr(transparent)]
    pub struct FeatureFlags: u32 {
        /// 输入颜色为线性高动态范围
        const HIGH_DYNAMIC_RANGE = 1 << 0;
        /// 运动矢量为显示分辨率
        const DISPLAY_RESOLUTION_MOTION_VECTORS = 1 << 1;
        /// 运动矢量包含抖动，需要抵消
        const MOTION_VECTORS_JITTER_CANCELLATION = 1 << 2;
        /// 反向深度 (近平面 = 1)
        const DEPTH_INVERTED = 1 << 3;
        /// 无限远平面
        const DEPTH_INFINITE = 1 << 4;
        /// 内部自动曝光
        const AUTO_EXPOSURE = 1 << 5;
        /// 动态分辨率，逐帧渲染尺寸可变
        const DYNAMIC_RESOLUTION = 1 << 6;
    }
}

bitflags::bitflags! {
    /// 反应遮罩生成选项
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct ReactiveGenerationFlags: u32 {
        /// 差分前对两路颜色做色调映射
        const APPLY_TONEMAP = 1 << 0;
        /// 差分前对两路颜色做逆色调映射（回到线性空间）
        const APPLY_INVERSE_TONEMAP = 1 << 1;
        /// 低于截断阈值的值归零
        const APPLY_THRESHOLD = 1 << 2;
        /// 使用各通道差的最大值而非亮度差
        const USE_COMPONENTS_MAX = 1 << 3;
    }
}

impl FeatureFlags {
    /// 从调用方传入的原始位值构造
    ///
    /// 包含未知位 (例如 1D 纹理位) 时返回 `UnsupportedConfiguration`。
    pub fn try_from_bits(bits: u32) -> UpscalerResult<Self> {
        Self::from_bits(bits).ok_or_else(|| UpscalerError::UnsupportedConfiguration {
            reason: format!(
                "unknown feature flag bits {:#x}",
                bits & !Self::all().bits()
            ),
        })
    }

    /// 改变后必须重建历史的标志
    pub fn history_affecting(&self) -> Self {
        self.intersection(Self::HIGH_DYNAMIC_RANGE | Self::DEPTH_INVERTED | Self::DEPTH_INFINITE)
    }
}

impl Default for ReactiveGenerationFlags {
    fn default() -> Self {
        Self::APPLY_THRESHOLD
    }
}

fn serialize_names<F: Flags, S: Serializer>(flags: &F, serializer: S) -> Result<S::Ok, S::Error> {
    let names: Vec<&'static str> = flags.iter_names().map(|(name, _)| name).collect();
    names.serialize(serializer)
}

fn deserialize_names<'de, F: Flags, D: Deserializer<'de>>(deserializer: D) -> Result<F, D::Error> {
    let names = Vec::<String>::deserialize(deserializer)?;
    let mut flags = F::empty();
    for name in &names {
        let flag = F::from_name(name)
            .ok_or_else(|| D::Error::custom(format!("unknown flag: {}", name)))?;
        flags.insert(flag);
    }
    Ok(flags)
}

impl Serialize for FeatureFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_names(self, serializer)
    }
}

impl<'de> Deserialize<'de> for FeatureFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_names(deserializer)
    }
}

impl Serialize for ReactiveGenerationFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_names(self, serializer)
    }
}

impl<'de> Deserialize<'de> for ReactiveGenerationFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_names(deserializer)
    }
}
