//! 请求台账
//!
//! 按终端准入顺序记录每个终端、每个信道的请求量和授权量（符号）

use dama_core::{ChannelIndex, SymbolTiers, TerminalId, Tier, WaveformId};
use serde::Serialize;
use std::collections::HashMap;

/// (终端, 信道) 键，公平分配的基本单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChannelKey {
    pub terminal: TerminalId,
    pub channel: ChannelIndex,
}

/// 单个信道的请求与授权
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelEntry {
    pub channel: ChannelIndex,
    pub requested: SymbolTiers,
    pub granted: SymbolTiers,
    /// 空闲填充的符号，没有对应的字节请求
    pub filler: u64,
}

impl ChannelEntry {
    /// 指定层级尚未满足的符号数
    pub fn deficit(&self, tier: Tier) -> u64 {
        self.requested.get(tier) - self.granted.get(tier)
    }

    /// 授权总量（含空闲填充）
    pub fn assigned(&self) -> u64 {
        self.granted.total() + self.filler
    }
}

/// 单个终端本周期的分配信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalAllocation {
    pub terminal: TerminalId,
    /// 信道质量估计（C/N0，dB-Hz）
    pub quality: f64,
    /// 请求字节换算符号时使用的波形
    pub waveform: WaveformId,
    /// 公平分配的步长，等于换算波形的突发长度
    pub quantum: u64,
    pub control_slot: bool,
    /// 控制时隙占用的符号，计入保证速率层
    pub control_symbols: u64,
    pub channels: Vec<ChannelEntry>,
}

impl TerminalAllocation {
    /// 各信道请求量之和（不含控制时隙）
    pub fn requested(&self) -> SymbolTiers {
        let mut total = SymbolTiers::default();
        for entry in &self.channels {
            total.add(&entry.requested);
        }
        total
    }

    /// 各信道授权量之和（不含控制时隙和空闲填充）
    pub fn granted(&self) -> SymbolTiers {
        let mut total = SymbolTiers::default();
        for entry in &self.channels {
            total.add(&entry.granted);
        }
        total
    }

    pub fn filler(&self) -> u64 {
        self.channels.iter().map(|c| c.filler).sum()
    }

    /// 终端占用的全部符号：控制时隙、各层授权和空闲填充
    pub fn assigned(&self) -> u64 {
        self.control_symbols + self.channels.iter().map(ChannelEntry::assigned).sum::<u64>()
    }
}

/// 本周期的请求台账，保持准入顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    terminals: Vec<TerminalAllocation>,
    index: HashMap<TerminalId, usize>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加终端分配，终端已存在时返回 `false` 且不做修改
    pub fn insert(&mut self, allocation: TerminalAllocation) -> bool {
        if self.index.contains_key(&allocation.terminal) {
            return false;
        }
        self.index.insert(allocation.terminal, self.terminals.len());
        self.terminals.push(allocation);
        true
    }

    pub fn get(&self, terminal: TerminalId) -> Option<&TerminalAllocation> {
        self.index.get(&terminal).map(|&i| &self.terminals[i])
    }

    pub fn contains(&self, terminal: TerminalId) -> bool {
        self.index.contains_key(&terminal)
    }

    /// 按准入顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &TerminalAllocation> {
        self.terminals.iter()
    }

    pub fn len(&self) -> usize {
        self.terminals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }

    pub fn clear(&mut self) {
        self.terminals.clear();
        self.index.clear();
    }

    /// 所有信道条目的位置 (终端序号, 信道序号)，按台账顺序
    pub fn positions(&self) -> Vec<(usize, usize)> {
        self.terminals
            .iter()
            .enumerate()
            .flat_map(|(t, alloc)| (0..alloc.channels.len()).map(move |c| (t, c)))
            .collect()
    }

    pub fn key(&self, (t, c): (usize, usize)) -> ChannelKey {
        let alloc = &self.terminals[t];
        ChannelKey {
            terminal: alloc.terminal,
            channel: alloc.channels[c].channel,
        }
    }

    pub fn terminal_at(&self, t: usize) -> &TerminalAllocation {
        &self.terminals[t]
    }

    pub fn entry(&self, (t, c): (usize, usize)) -> &ChannelEntry {
        &self.terminals[t].channels[c]
    }

    pub(crate) fn entry_mut(&mut self, (t, c): (usize, usize)) -> &mut ChannelEntry {
        &mut self.terminals[t].channels[c]
    }

    /// 按键查找信道条目
    pub fn channel(&self, key: ChannelKey) -> Option<&ChannelEntry> {
        self.get(key.terminal)?
            .channels
            .iter()
            .find(|c| c.channel == key.channel)
    }

    /// 台账中占用的全部符号
    pub fn total_assigned(&self) -> u64 {
        self.terminals.iter().map(TerminalAllocation::assigned).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocation(id: u32, channels: usize) -> TerminalAllocation {
        TerminalAllocation {
            terminal: TerminalId(id),
            quality: 60.0,
            waveform: WaveformId(1),
            quantum: 100,
            control_slot: false,
            control_symbols: 0,
            channels: (0..channels)
                .map(|c| ChannelEntry {
                    channel: c as ChannelIndex,
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut ledger = Ledger::new();
        assert!(ledger.insert(allocation(9, 1)));
        assert!(ledger.insert(allocation(3, 2)));
        assert!(!ledger.insert(allocation(9, 4)));

        let order: Vec<TerminalId> = ledger.iter().map(|a| a.terminal).collect();
        assert_eq!(order, vec![TerminalId(9), TerminalId(3)]);
        assert_eq!(ledger.get(TerminalId(9)).unwrap().channels.len(), 1);
    }

    #[test]
    fn test_positions() {
        let mut ledger = Ledger::new();
        ledger.insert(allocation(1, 2));
        ledger.insert(allocation(2, 0));
        ledger.insert(allocation(3, 1));
        assert_eq!(ledger.positions(), vec![(0, 0), (0, 1), (2, 0)]);
        let key = ledger.key((0, 1));
        assert_eq!(
            key,
            ChannelKey {
                terminal: TerminalId(1),
                channel: 1
            }
        );
        assert_eq!(ledger.channel(key).unwrap().channel, 1);
        assert!(ledger
            .channel(ChannelKey {
                terminal: TerminalId(2),
                channel: 0
            })
            .is_none());
    }

    #[test]
    fn test_assigned_includes_control_and_filler() {
        let mut alloc = allocation(1, 2);
        alloc.control_symbols = 50;
        alloc.channels[0].granted.guaranteed = 100;
        alloc.channels[1].granted.volume = 30;
        alloc.channels[1].filler = 20;
        assert_eq!(alloc.assigned(), 200);
        assert_eq!(alloc.granted().total(), 130);
        assert_eq!(alloc.filler(), 20);
    }
}
