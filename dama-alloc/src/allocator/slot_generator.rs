//! 时隙表生成
//!
//! 将最终授权切分为离散突发，按载波顺序放置，并打包为有大小上限的授权消息

use dama_core::{AllocationError, ChannelIndex};
use tracing::{debug, warn};

use super::core::{FrameAllocator, TickState};
use crate::grant::{GrantMessageBuilder, SlotKind, SlotTable, TerminalGrant, TimeSlot};
use crate::listener::{TerminalLoadEvent, UtilizationEvent, UtilizationStage, WaveformEvent};

/// 载波占用状态
struct CarrierState {
    id: u16,
    used: u64,
    capacity: u64,
}

impl CarrierState {
    fn room(&self) -> u64 {
        self.capacity - self.used
    }

    /// 在载波末尾占用 `length` 个符号，返回起始偏移
    fn take(&mut self, length: u64) -> u32 {
        let offset = self.used;
        self.used += length;
        offset as u32
    }
}

/// 一次切分的单位：按信道，或终端所有信道合并
struct CarveUnit {
    channel: ChannelIndex,
    slot: usize,
    granted: u64,
    filler: u64,
}

impl FrameAllocator {
    /// 生成本周期的时隙表
    ///
    /// 按台账顺序处理终端：先放置控制时隙，再逐信道切分突发。
    /// 放不下的授权在本周期内丢弃，不会顺延到下一周期。
    /// 未复位时再次调用返回空表。
    ///
    /// # 参数
    /// - `max_message_bytes`: 单条授权消息的最大编码长度
    pub fn generate_slots(&mut self, max_message_bytes: usize) -> Result<SlotTable, AllocationError> {
        if self.state == TickState::Sealed {
            debug!(frame = self.config.frame_id, "slot table already generated");
            return Ok(SlotTable::default());
        }

        let frame_id = self.config.frame_id;
        let geometry = &self.config.geometry;
        let waveforms = &self.config.waveforms;
        let mut builder = GrantMessageBuilder::new(frame_id, max_message_bytes)?;
        let mut carriers: Vec<CarrierState> = (0..geometry.carrier_count)
            .map(|id| CarrierState {
                id,
                used: 0,
                capacity: geometry.symbols_per_carrier,
            })
            .collect();
        let mut table = SlotTable::default();

        for alloc in self.ledger.iter() {
            if alloc.assigned() == 0 {
                continue;
            }
            let mut grant = TerminalGrant {
                terminal: alloc.terminal,
                control_slot: false,
                bytes_per_channel: Vec::new(),
                placed_symbols: 0,
            };

            if alloc.control_slot && alloc.control_symbols > 0 {
                let length = alloc.control_symbols;
                match carriers.iter_mut().find(|c| c.room() >= length) {
                    Some(carrier) => {
                        builder.push(TimeSlot {
                            terminal: alloc.terminal,
                            channel: 0,
                            carrier: carrier.id,
                            waveform: geometry.control_waveform,
                            offset: carrier.take(length),
                            length: length as u32,
                            kind: SlotKind::Control,
                        });
                        grant.control_slot = true;
                        grant.placed_symbols += length;
                    }
                    None => {
                        warn!(terminal = %alloc.terminal, length, "no carrier room for control slot");
                        table.wasted_symbols += length;
                    }
                }
            }

            let units: Vec<CarveUnit> = if self.config.channel_based_slots {
                alloc
                    .channels
                    .iter()
                    .enumerate()
                    .map(|(slot, c)| CarveUnit {
                        channel: c.channel,
                        slot,
                        granted: c.granted.total(),
                        filler: c.filler,
                    })
                    .collect()
            } else {
                vec![CarveUnit {
                    channel: 0,
                    slot: 0,
                    granted: alloc.granted().total(),
                    filler: alloc.filler(),
                }]
            };
            grant.bytes_per_channel = vec![0; units.len()];
            let mut terminal_left: u64 = units.iter().map(|u| u.granted + u.filler).sum();

            for unit in &units {
                let mut left = unit.granted + unit.filler;
                while left > 0 {
                    let max_room = carriers.iter().map(CarrierState::room).max().unwrap_or(0);
                    let Some(waveform) = waveforms.best_burst(
                        left.min(max_room),
                        terminal_left,
                        alloc.quality,
                        Some(alloc.waveform),
                    ) else {
                        break;
                    };
                    let burst = waveform.burst_length as u64;
                    let Some(carrier) = carriers.iter_mut().find(|c| c.room() >= burst) else {
                        break;
                    };

                    let slot = TimeSlot {
                        terminal: alloc.terminal,
                        channel: unit.channel,
                        carrier: carrier.id,
                        waveform: waveform.id,
                        offset: carrier.take(burst),
                        length: waveform.burst_length,
                        kind: SlotKind::Data,
                    };
                    left -= burst;
                    terminal_left -= burst;
                    grant.placed_symbols += burst;
                    grant.bytes_per_channel[unit.slot] += waveform.payload_bytes as u64;

                    self.listener.on_waveform_selected(&WaveformEvent {
                        frame_id,
                        terminal: alloc.terminal,
                        waveform: waveform.id,
                        burst_length: waveform.burst_length,
                    });
                    builder.push(slot);
                }

                if left > 0 {
                    // 放不下的部分优先算作空闲填充
                    let discarded = left.min(unit.filler);
                    let wasted = left - discarded;
                    terminal_left -= left;
                    table.discarded_filler_symbols += discarded;
                    table.wasted_symbols += wasted;
                    if wasted > 0 {
                        warn!(
                            terminal = %alloc.terminal,
                            channel = unit.channel,
                            wasted,
                            "granted symbols could not be placed"
                        );
                    }
                }
            }

            self.listener.on_terminal_load(&TerminalLoadEvent {
                frame_id,
                terminal: alloc.terminal,
                placed_symbols: grant.placed_symbols,
                total_symbols: geometry.total_symbols,
            });
            table.placed_symbols += grant.placed_symbols;
            table.terminals.push(grant);
        }

        assert!(
            table.placed_symbols <= geometry.total_symbols,
            "slot table places {} symbols in a frame of {}",
            table.placed_symbols,
            geometry.total_symbols
        );
        table.messages = builder.finish();
        debug!(
            frame = frame_id,
            messages = table.messages.len(),
            placed = table.placed_symbols,
            wasted = table.wasted_symbols,
            "slot table generated"
        );

        self.listener.on_utilization(&UtilizationEvent {
            frame_id,
            stage: UtilizationStage::Placed,
            used_symbols: table.placed_symbols,
            total_symbols: geometry.total_symbols,
        });
        self.state = TickState::Sealed;
        Ok(table)
    }
}
