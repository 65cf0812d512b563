//! 准入控制
//!
//! 按层级整体接受或拒绝终端请求，不做部分授权

use dama_core::{
    AllocationError, CapacityRequest, ChannelIndex, SymbolTiers, Tier, Waveform, WaveformId,
};
use tracing::debug;

use super::core::{FrameAllocator, TickState};
use crate::ledger::{ChannelEntry, TerminalAllocation};

impl FrameAllocator {
    /// 尝试在指定层级准入终端请求
    ///
    /// 层级是累加的：在 `Dynamic` 层准入意味着同时满足保证速率和最小动态速率部分。
    ///
    /// # 参数
    /// - `tier`: 本次准入覆盖到的层级
    /// - `request`: 终端请求
    /// - `waveform_id`: 将字节换算为符号时使用的波形
    ///
    /// # 返回
    /// - `Ok(true)`: 已准入，台账和计数器已更新
    /// - `Ok(false)`: 帧内剩余容量不足，状态不变
    /// - `Err(AllocationError)`: 结构性拒绝或调用错误
    pub fn try_admit(
        &mut self,
        tier: Tier,
        request: &CapacityRequest,
        waveform_id: WaveformId,
    ) -> Result<bool, AllocationError> {
        self.ensure_state("try_admit", &[TickState::Admitting])?;
        if self.ledger.contains(request.terminal) {
            return Err(AllocationError::DuplicateTerminal(request.terminal));
        }
        let waveform = self
            .config
            .waveforms
            .get(waveform_id)
            .ok_or(AllocationError::UnknownWaveform(waveform_id))?;

        let mut allocation = self.build_allocation(request, waveform)?;
        let mut demand = allocation.requested();
        demand.guaranteed += allocation.control_symbols;

        let cost = demand.through(tier);
        if cost > self.counters.available() {
            debug!(
                terminal = %request.terminal,
                %tier,
                cost,
                available = self.counters.available(),
                "admission rejected"
            );
            return Ok(false);
        }

        for entry in &mut allocation.channels {
            entry.granted = entry.requested.truncated(tier);
        }
        self.counters.record_request(&demand);
        for t in tier.through() {
            self.counters.commit(t, demand.get(t));
        }
        debug!(
            terminal = %request.terminal,
            %tier,
            cost,
            available = self.counters.available(),
            "admission accepted"
        );
        self.ledger.insert(allocation);
        Ok(true)
    }

    /// 将字节请求换算为符号，并按单载波容量截断
    fn build_allocation(
        &self,
        request: &CapacityRequest,
        waveform: &Waveform,
    ) -> Result<TerminalAllocation, AllocationError> {
        let geometry = &self.config.geometry;
        let control_symbols = if request.control_slot {
            geometry.control_slot_symbols
        } else {
            0
        };

        let mut channels = Vec::with_capacity(request.channels.len());
        for (i, item) in request.channels.iter().enumerate() {
            let channel =
                ChannelIndex::try_from(i).map_err(|_| AllocationError::TooManyChannels {
                    terminal: request.terminal,
                    count: request.channels.len(),
                })?;
            let mut requested = SymbolTiers::default();
            for tier in Tier::ALL {
                *requested.get_mut(tier) = waveform.bytes_to_symbols(item.bytes(tier) as u64);
            }
            channels.push(ChannelEntry {
                channel,
                requested,
                ..Default::default()
            });
        }

        // 保证速率部分不能截断，放不进空帧的单载波即为结构性拒绝
        let limit = geometry.terminal_limit();
        // 极端波形参数下求和可能溢出，溢出同样视为超限
        let guaranteed = channels
            .iter()
            .try_fold(control_symbols, |acc, c| acc.checked_add(c.requested.guaranteed))
            .unwrap_or(u64::MAX);
        if guaranteed > limit {
            return Err(AllocationError::Unadmittable {
                terminal: request.terminal,
                required: guaranteed,
                limit,
            });
        }

        // 终端一帧内最多使用一个载波的容量，其余层级按优先级和信道顺序截断
        let mut room = limit - guaranteed;
        let mut clipped = 0;
        for tier in Tier::SHARED {
            for entry in &mut channels {
                let wanted = entry.requested.get(tier);
                let kept = wanted.min(room);
                *entry.requested.get_mut(tier) = kept;
                room -= kept;
                clipped += wanted - kept;
            }
        }
        if clipped > 0 {
            debug!(
                terminal = %request.terminal,
                clipped,
                limit,
                "request clipped to carrier capacity"
            );
        }

        Ok(TerminalAllocation {
            terminal: request.terminal,
            quality: request.quality,
            waveform: waveform.id,
            quantum: waveform.burst_length as u64,
            control_slot: request.control_slot,
            control_symbols,
            channels,
        })
    }
}
