//! 剩余容量公平分配
//!
//! 准入完成后，按最小动态、动态、容量三个层级依次对未满足的请求做注水分配

use dama_core::{AllocationError, SymbolTiers, Tier};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::debug;

use super::core::{FrameAllocator, TickState};
use crate::listener::{UtilizationEvent, UtilizationStage};

/// 一次公平分配的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DistributionSummary {
    /// 各层级本次新增的授权符号
    pub granted: SymbolTiers,
    /// 空闲填充的符号
    pub filler: u64,
    /// 目标利用率下仍未使用的符号
    pub budget_left: u64,
}

impl FrameAllocator {
    /// 将剩余容量分配给未满足的请求
    ///
    /// 可用预算为 `min(剩余符号, target_utilization × 总符号 − 已占用符号)`。
    /// 每个层级内每次选取当前授权量最小的条目（相同时按台账顺序），
    /// 增加一个步长（换算波形的突发长度），直到该层级没有缺口或预算耗尽。
    ///
    /// # 参数
    /// - `target_utilization`: 目标利用率，位于 [0, 1]
    /// - `allow_idle_fill`: 所有层级都满足后，是否用空闲填充补足到目标利用率
    pub fn distribute(
        &mut self,
        target_utilization: f64,
        allow_idle_fill: bool,
    ) -> Result<DistributionSummary, AllocationError> {
        self.ensure_state(
            "distribute",
            &[TickState::Admitting, TickState::Distributed],
        )?;
        if !(0.0..=1.0).contains(&target_utilization) {
            return Err(AllocationError::InvalidTargetUtilization(target_utilization));
        }

        let total = self.counters.total();
        let target = ((target_utilization * total as f64).floor() as u64).min(total);
        let mut budget = target
            .saturating_sub(self.counters.used())
            .min(self.counters.available());

        let mut summary = DistributionSummary::default();
        for tier in Tier::SHARED {
            let granted = self.water_fill(tier, budget);
            budget -= granted;
            *summary.granted.get_mut(tier) = granted;
        }
        // 空闲填充的优先级低于任何层级的缺口
        if allow_idle_fill && budget > 0 {
            summary.filler = self.idle_fill(budget);
            budget -= summary.filler;
        }
        summary.budget_left = budget;

        debug!(
            frame = self.config.frame_id,
            granted = summary.granted.total(),
            filler = summary.filler,
            budget_left = budget,
            "capacity distributed"
        );
        self.state = TickState::Distributed;
        self.listener.on_utilization(&UtilizationEvent {
            frame_id: self.config.frame_id,
            stage: UtilizationStage::Distributed,
            used_symbols: self.counters.used(),
            total_symbols: total,
        });
        Ok(summary)
    }

    /// 单个层级的注水分配，返回本层级新增的授权符号
    fn water_fill(&mut self, tier: Tier, budget: u64) -> u64 {
        let positions = self.ledger.positions();
        // 按 (当前授权量, 台账顺序) 取最小者，每轮根据最新授权量重新入堆
        let mut heap: BinaryHeap<Reverse<(u64, usize)>> = positions
            .iter()
            .enumerate()
            .filter(|(_, pos)| self.ledger.entry(**pos).deficit(tier) > 0)
            .map(|(order, &pos)| Reverse((self.ledger.entry(pos).granted.get(tier), order)))
            .collect();

        let mut spent = 0;
        while spent < budget {
            let Some(Reverse((_, order))) = heap.pop() else {
                break;
            };
            let pos = positions[order];
            let quantum = self.ledger.terminal_at(pos.0).quantum;
            let entry = self.ledger.entry_mut(pos);
            let step = quantum.min(entry.deficit(tier)).min(budget - spent);
            *entry.granted.get_mut(tier) += step;
            let granted = entry.granted.get(tier);
            let remaining = entry.deficit(tier);

            self.counters.commit(tier, step);
            spent += step;
            if remaining > 0 {
                heap.push(Reverse((granted, order)));
            }
        }

        if spent > 0 {
            debug!(%tier, spent, unmet = heap.len(), "tier shared");
        }
        spent
    }

    /// 空闲填充：按占用量从小到大补足，不超过终端的单载波上限
    fn idle_fill(&mut self, budget: u64) -> u64 {
        let limit = self.config.geometry.terminal_limit();
        let positions = self.ledger.positions();
        let mut assigned: Vec<u64> = self.ledger.iter().map(|a| a.assigned()).collect();

        let mut heap: BinaryHeap<Reverse<(u64, usize)>> = positions
            .iter()
            .enumerate()
            .filter(|(_, pos)| assigned[pos.0] < limit)
            .map(|(order, &pos)| Reverse((self.ledger.entry(pos).assigned(), order)))
            .collect();

        let mut spent = 0;
        while spent < budget {
            let Some(Reverse((_, order))) = heap.pop() else {
                break;
            };
            let pos = positions[order];
            let room = limit.saturating_sub(assigned[pos.0]);
            if room == 0 {
                continue;
            }
            let quantum = self.ledger.terminal_at(pos.0).quantum;
            let step = quantum.min(room).min(budget - spent);
            let entry = self.ledger.entry_mut(pos);
            entry.filler += step;
            let entry_assigned = entry.assigned();

            assigned[pos.0] += step;
            self.counters.commit_filler(step);
            spent += step;
            if assigned[pos.0] < limit {
                heap.push(Reverse((entry_assigned, order)));
            }
        }

        if spent > 0 {
            debug!(spent, "idle capacity filled");
        }
        spent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dama_core::{
        AllocatorConfig, CapacityRequest, CapacityRequestItem, FrameGeometry, TerminalId,
        Waveform, WaveformId, WaveformTable,
    };

    /// 100符号/10字节的单一波形，1字节正好对应10个符号
    fn allocator(carriers: u16) -> FrameAllocator {
        let config = AllocatorConfig::new(
            FrameGeometry {
                total_symbols: 1000 * carriers as u64,
                symbols_per_carrier: 1000,
                carrier_count: carriers,
                control_slot_symbols: 0,
                control_waveform: WaveformId(1),
            },
            WaveformTable::new(vec![Waveform::new(1, 0.0, 100, 10)]).unwrap(),
        );
        FrameAllocator::new(config).unwrap()
    }

    fn admit(alloc: &mut FrameAllocator, id: u32, tier: Tier, item: CapacityRequestItem) {
        let req = CapacityRequest::new(TerminalId(id), 60.0, vec![item]);
        assert!(alloc.try_admit(tier, &req, WaveformId(1)).unwrap());
    }

    fn granted(alloc: &FrameAllocator, id: u32) -> SymbolTiers {
        alloc.ledger().get(TerminalId(id)).unwrap().granted()
    }

    #[test]
    fn test_partial_dynamic_grant() {
        let mut alloc = allocator(2);
        admit(&mut alloc, 1, Tier::Guaranteed, CapacityRequestItem::new(96, 0, 0, 0));
        admit(&mut alloc, 2, Tier::Guaranteed, CapacityRequestItem::new(50, 0, 10, 0));
        admit(&mut alloc, 3, Tier::Guaranteed, CapacityRequestItem::new(50, 0, 0, 0));
        assert_eq!(alloc.counters().available(), 40);

        let summary = alloc.distribute(1.0, false).unwrap();
        assert_eq!(summary.granted.dynamic, 40);
        assert_eq!(granted(&alloc, 2).dynamic, 40);
        assert_eq!(alloc.load_for_tier(Tier::Dynamic).unmet(), 60);
        assert_eq!(alloc.counters().available(), 0);
    }

    #[test]
    fn test_max_min_fairness() {
        let mut alloc = allocator(3);
        admit(&mut alloc, 1, Tier::Guaranteed, CapacityRequestItem::new(0, 0, 20, 0));
        admit(&mut alloc, 2, Tier::Guaranteed, CapacityRequestItem::new(0, 0, 100, 0));
        admit(&mut alloc, 3, Tier::Guaranteed, CapacityRequestItem::new(0, 0, 100, 0));

        let summary = alloc.distribute(0.5, false).unwrap();
        assert_eq!(summary.granted.dynamic, 1500);
        // 小请求先被完全满足，其余两者相差不超过一个步长
        assert_eq!(granted(&alloc, 1).dynamic, 200);
        let a = granted(&alloc, 2).dynamic;
        let b = granted(&alloc, 3).dynamic;
        assert_eq!(a + b, 1300);
        assert!(a.abs_diff(b) <= 100);
        assert!(a >= b, "ties resolve in ledger order");
    }

    #[test]
    fn test_tiers_in_priority_order() {
        let mut alloc = allocator(1);
        admit(&mut alloc, 1, Tier::Guaranteed, CapacityRequestItem::new(0, 0, 0, 60));
        admit(&mut alloc, 2, Tier::Guaranteed, CapacityRequestItem::new(0, 30, 30, 0));

        alloc.distribute(1.0, false).unwrap();
        // 最小动态和动态先于容量层
        assert_eq!(granted(&alloc, 2).minimum_dynamic, 300);
        assert_eq!(granted(&alloc, 2).dynamic, 300);
        assert_eq!(granted(&alloc, 1).volume, 400);
    }

    #[test]
    fn test_target_utilization_caps_budget() {
        let mut alloc = allocator(1);
        admit(&mut alloc, 1, Tier::Guaranteed, CapacityRequestItem::new(20, 0, 0, 80));
        let summary = alloc.distribute(0.5, false).unwrap();
        assert_eq!(summary.granted.volume, 300);
        assert_eq!(alloc.counters().used(), 500);
        assert_eq!(summary.budget_left, 0);
    }

    #[test]
    fn test_idle_fill_after_deficits() {
        let mut alloc = allocator(2);
        admit(&mut alloc, 1, Tier::Guaranteed, CapacityRequestItem::new(10, 0, 0, 10));
        admit(&mut alloc, 2, Tier::Guaranteed, CapacityRequestItem::new(30, 0, 0, 0));

        let summary = alloc.distribute(0.8, true).unwrap();
        assert_eq!(summary.granted.volume, 100);
        // 1600 - 500 = 1100 个空闲符号，先补占用较少的终端1
        assert_eq!(summary.filler, 1100);
        let t1 = alloc.ledger().get(TerminalId(1)).unwrap();
        let t2 = alloc.ledger().get(TerminalId(2)).unwrap();
        assert_eq!(t1.assigned() + t2.assigned(), 1600);
        assert!(t1.assigned().abs_diff(t2.assigned()) <= 100);
        assert_eq!(alloc.counters().used(), 1600);
    }

    #[test]
    fn test_idle_fill_respects_carrier_limit() {
        let mut alloc = allocator(3);
        admit(&mut alloc, 1, Tier::Guaranteed, CapacityRequestItem::new(10, 0, 0, 0));
        let summary = alloc.distribute(1.0, true).unwrap();
        assert_eq!(summary.filler, 900);
        assert_eq!(summary.budget_left, 2000);
    }

    #[test]
    fn test_invalid_target() {
        let mut alloc = allocator(1);
        assert!(matches!(
            alloc.distribute(1.5, false),
            Err(AllocationError::InvalidTargetUtilization(_))
        ));
        assert!(alloc.distribute(f64::NAN, false).is_err());
    }
}
