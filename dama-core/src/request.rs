//! 容量请求数据模型
//!
//! 定义终端标识、优先级层级以及按层级划分的请求/授权量

use serde::{Deserialize, Serialize};
use std::fmt;

/// 终端标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerminalId(pub u32);

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// 终端内的子信道序号
pub type ChannelIndex = u8;

/// 容量请求优先级层级，按严格优先级排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// 保证速率
    Guaranteed,
    /// 最小保证动态速率
    MinimumDynamic,
    /// 动态速率
    Dynamic,
    /// 尽力而为的容量
    Volume,
}

impl Tier {
    /// 全部层级，按优先级从高到低
    pub const ALL: [Tier; 4] = [
        Tier::Guaranteed,
        Tier::MinimumDynamic,
        Tier::Dynamic,
        Tier::Volume,
    ];

    /// 公平分配阶段处理的层级
    pub const SHARED: [Tier; 3] = [Tier::MinimumDynamic, Tier::Dynamic, Tier::Volume];

    /// 当前层级及其之前（更高优先级）的所有层级
    pub fn through(self) -> impl Iterator<Item = Tier> {
        Tier::ALL.into_iter().filter(move |t| *t <= self)
    }

    pub fn name(self) -> &'static str {
        match self {
            Tier::Guaranteed => "guaranteed",
            Tier::MinimumDynamic => "minimum_dynamic",
            Tier::Dynamic => "dynamic",
            Tier::Volume => "volume",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 按层级划分的符号数（请求量或授权量）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTiers {
    pub guaranteed: u64,
    pub minimum_dynamic: u64,
    pub dynamic: u64,
    pub volume: u64,
}

impl SymbolTiers {
    pub fn get(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Guaranteed => self.guaranteed,
            Tier::MinimumDynamic => self.minimum_dynamic,
            Tier::Dynamic => self.dynamic,
            Tier::Volume => self.volume,
        }
    }

    pub fn get_mut(&mut self, tier: Tier) -> &mut u64 {
        match tier {
            Tier::Guaranteed => &mut self.guaranteed,
            Tier::MinimumDynamic => &mut self.minimum_dynamic,
            Tier::Dynamic => &mut self.dynamic,
            Tier::Volume => &mut self.volume,
        }
    }

    /// 四个层级之和
    pub fn total(&self) -> u64 {
        self.guaranteed + self.minimum_dynamic + self.dynamic + self.volume
    }

    /// 指定层级及更高优先级层级之和
    pub fn through(&self, tier: Tier) -> u64 {
        tier.through().map(|t| self.get(t)).sum()
    }

    /// 只保留指定层级及更高优先级层级，其余置零
    pub fn truncated(&self, tier: Tier) -> SymbolTiers {
        let mut out = SymbolTiers::default();
        for t in tier.through() {
            *out.get_mut(t) = self.get(t);
        }
        out
    }

    /// 逐层累加
    pub fn add(&mut self, other: &SymbolTiers) {
        for t in Tier::ALL {
            *self.get_mut(t) += other.get(t);
        }
    }

    /// 逐层判断是否不超过 `other`
    pub fn fits_within(&self, other: &SymbolTiers) -> bool {
        Tier::ALL.into_iter().all(|t| self.get(t) <= other.get(t))
    }
}

/// 单个信道的容量请求（字节）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityRequestItem {
    pub guaranteed_bytes: u32,
    pub minimum_dynamic_bytes: u32,
    pub dynamic_bytes: u32,
    pub volume_bytes: u32,
}

impl CapacityRequestItem {
    pub fn new(guaranteed: u32, minimum_dynamic: u32, dynamic: u32, volume: u32) -> Self {
        Self {
            guaranteed_bytes: guaranteed,
            minimum_dynamic_bytes: minimum_dynamic,
            dynamic_bytes: dynamic,
            volume_bytes: volume,
        }
    }

    /// 由速率请求构造：`minimum` 是 `rate` 中必须保证的部分
    ///
    /// 层级之间是相加关系，因此动态层只保留超出最小值的部分。
    pub fn from_rate_request(guaranteed: u32, rate: u32, minimum: u32, volume: u32) -> Self {
        let minimum = minimum.min(rate);
        Self::new(guaranteed, minimum, rate - minimum, volume)
    }

    pub fn bytes(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Guaranteed => self.guaranteed_bytes,
            Tier::MinimumDynamic => self.minimum_dynamic_bytes,
            Tier::Dynamic => self.dynamic_bytes,
            Tier::Volume => self.volume_bytes,
        }
    }
}

/// 单个终端在一个周期内的容量请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityRequest {
    pub terminal: TerminalId,
    /// 信道质量估计（C/N0，dB-Hz）
    pub quality: f64,
    /// 是否申请控制时隙
    #[serde(default)]
    pub control_slot: bool,
    /// 按信道顺序排列的请求
    pub channels: Vec<CapacityRequestItem>,
}

impl CapacityRequest {
    pub fn new(terminal: TerminalId, quality: f64, channels: Vec<CapacityRequestItem>) -> Self {
        Self {
            terminal,
            quality,
            control_slot: false,
            channels,
        }
    }

    pub fn with_control_slot(mut self) -> Self {
        self.control_slot = true;
        self
    }

    /// 所有信道在指定层级上的请求字节数
    pub fn total_bytes(&self, tier: Tier) -> u64 {
        self.channels.iter().map(|c| c.bytes(tier) as u64).sum()
    }
}
