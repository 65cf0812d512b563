//! FrameAllocator 核心结构和基础方法
//!
//! 包含分配器结构体定义、周期状态和只读查询

use dama_core::{AllocationError, AllocatorConfig, Tier, WaveformId};

use crate::counters::{FrameCounters, TierLoad};
use crate::ledger::Ledger;
use crate::listener::{AllocationListener, NoopListener};

/// 单个周期内分配器所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickState {
    /// 复位后，接受准入请求
    Admitting,
    /// 已完成公平分配
    Distributed,
    /// 已生成时隙表，等待复位
    Sealed,
}

impl TickState {
    pub fn name(self) -> &'static str {
        match self {
            TickState::Admitting => "admitting",
            TickState::Distributed => "distributed",
            TickState::Sealed => "sealed",
        }
    }
}

/// 单帧容量分配器
///
/// 每个周期的调用顺序为 `reset` → `try_admit`（多次）→ `distribute` → `generate_slots`。
/// 同一实例只由一个调用方独占使用。
pub struct FrameAllocator {
    pub(crate) config: AllocatorConfig,
    pub(crate) counters: FrameCounters,
    pub(crate) ledger: Ledger,
    pub(crate) state: TickState,
    pub(crate) listener: Box<dyn AllocationListener>,
}

impl FrameAllocator {
    /// 创建分配器，配置在此处一次性校验
    pub fn new(config: AllocatorConfig) -> Result<Self, AllocationError> {
        Self::with_listener(config, Box::new(NoopListener))
    }

    /// 创建带监听器的分配器
    pub fn with_listener(
        config: AllocatorConfig,
        listener: Box<dyn AllocationListener>,
    ) -> Result<Self, AllocationError> {
        config.validate()?;
        let counters = FrameCounters::new(config.geometry.total_symbols);
        Ok(Self {
            config,
            counters,
            ledger: Ledger::new(),
            state: TickState::Admitting,
            listener,
        })
    }

    /// 复位计数器和台账，开始新的周期
    pub fn reset(&mut self) {
        self.counters = FrameCounters::new(self.config.geometry.total_symbols);
        self.ledger.clear();
        self.state = TickState::Admitting;
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn counters(&self) -> &FrameCounters {
        &self.counters
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn state(&self) -> TickState {
        self.state
    }

    /// 根据信道质量选择有效载荷最大的波形
    pub fn select_waveform(&self, quality: f64) -> Option<WaveformId> {
        self.config.waveforms.select(quality).map(|w| w.id)
    }

    /// 截至指定层级的帧负载
    pub fn load_for_tier(&self, tier: Tier) -> TierLoad {
        self.counters.load_for_tier(tier)
    }

    pub(crate) fn ensure_state(
        &self,
        operation: &'static str,
        allowed: &[TickState],
    ) -> Result<(), AllocationError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(AllocationError::OutOfOrder {
                operation,
                state: self.state.name(),
            })
        }
    }
}
