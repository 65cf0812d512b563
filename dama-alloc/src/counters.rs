//! 帧负载计数器

use dama_core::{SymbolTiers, Tier};
use serde::Serialize;

/// 帧内符号计数
///
/// 始终满足 `available = total - committed.total() - filler`。
/// 计数器变为负数说明分配逻辑有误，直接panic而不是截断。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameCounters {
    total: u64,
    requested: SymbolTiers,
    committed: SymbolTiers,
    filler: u64,
    available: u64,
}

impl FrameCounters {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            requested: SymbolTiers::default(),
            committed: SymbolTiers::default(),
            filler: 0,
            available: total,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    pub fn requested(&self) -> &SymbolTiers {
        &self.requested
    }

    pub fn committed(&self) -> &SymbolTiers {
        &self.committed
    }

    pub fn filler(&self) -> u64 {
        self.filler
    }

    /// 已占用的全部符号（各层授权加空闲填充）
    pub fn used(&self) -> u64 {
        self.committed.total() + self.filler
    }

    /// 记录已准入终端的请求量
    pub(crate) fn record_request(&mut self, requested: &SymbolTiers) {
        self.requested.add(requested);
    }

    /// 在指定层级上占用符号
    pub(crate) fn commit(&mut self, tier: Tier, symbols: u64) {
        self.take(symbols);
        *self.committed.get_mut(tier) += symbols;
        assert!(
            self.committed.get(tier) <= self.requested.get(tier),
            "frame counters: {tier} committed {} exceeds requested {}",
            self.committed.get(tier),
            self.requested.get(tier)
        );
        self.check_balance();
    }

    /// 占用空闲填充符号
    pub(crate) fn commit_filler(&mut self, symbols: u64) {
        self.take(symbols);
        self.filler += symbols;
        self.check_balance();
    }

    fn take(&mut self, symbols: u64) {
        assert!(
            symbols <= self.available,
            "frame counters: committing {symbols} symbols with only {} available",
            self.available
        );
        self.available -= symbols;
    }

    /// 扣减可用量并计入对应计数之后调用
    fn check_balance(&self) {
        debug_assert_eq!(self.available + self.used(), self.total);
    }

    /// 指定层级的帧负载
    pub fn load_for_tier(&self, tier: Tier) -> TierLoad {
        TierLoad {
            tier,
            committed: self.committed.through(tier),
            requested: self.requested.through(tier),
            total: self.total,
        }
    }
}

/// 截至某层级的帧负载
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierLoad {
    pub tier: Tier,
    /// 截至该层级已授权的符号
    pub committed: u64,
    /// 截至该层级已准入终端请求的符号
    pub requested: u64,
    pub total: u64,
}

impl TierLoad {
    /// 已授权符号占帧容量的比例，位于 [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.committed as f64 / self.total as f64
        }
    }

    /// 尚未满足的请求符号
    pub fn unmet(&self) -> u64 {
        self.requested - self.committed
    }
}
