//! 波形表与波形选择
//!
//! 每个波形对应一种调制编码组合：最低C/N0门限、突发长度（符号）和有效载荷（字节）

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AllocationError;

/// 波形标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaveformId(pub u16);

impl fmt::Display for WaveformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}", self.0)
    }
}

/// 波形定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    pub id: WaveformId,
    /// 最低C/N0门限（dB-Hz）
    pub min_quality: f64,
    /// 突发长度（符号）
    pub burst_length: u32,
    /// 每个突发的有效载荷（字节）
    pub payload_bytes: u32,
}

impl Waveform {
    pub fn new(id: u16, min_quality: f64, burst_length: u32, payload_bytes: u32) -> Self {
        Self {
            id: WaveformId(id),
            min_quality,
            burst_length,
            payload_bytes,
        }
    }

    /// 字节数换算为符号数，向上取整
    pub fn bytes_to_symbols(&self, bytes: u64) -> u64 {
        let payload = self.payload_bytes as u64;
        (bytes * self.burst_length as u64).div_ceil(payload)
    }

    /// 信道质量是否满足门限
    pub fn supports(&self, quality: f64) -> bool {
        self.min_quality <= quality
    }
}

/// 波形表，保持配置中的顺序
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaveformTable {
    waveforms: Vec<Waveform>,
}

impl WaveformTable {
    /// 创建并校验波形表
    pub fn new(waveforms: Vec<Waveform>) -> Result<Self, AllocationError> {
        let table = Self { waveforms };
        table.validate()?;
        Ok(table)
    }

    /// 校验波形表自身的合法性
    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.waveforms.is_empty() {
            return Err(AllocationError::EmptyWaveformTable);
        }
        for (i, wf) in self.waveforms.iter().enumerate() {
            if wf.burst_length == 0 || wf.payload_bytes == 0 {
                return Err(AllocationError::InvalidConfig(format!(
                    "waveform {} has zero burst length or payload",
                    wf.id
                )));
            }
            if wf.min_quality.is_nan() {
                return Err(AllocationError::InvalidConfig(format!(
                    "waveform {} has no quality threshold",
                    wf.id
                )));
            }
            if self.waveforms[..i].iter().any(|w| w.id == wf.id) {
                return Err(AllocationError::InvalidConfig(format!(
                    "duplicate waveform id {}",
                    wf.id
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: WaveformId) -> Option<&Waveform> {
        self.waveforms.iter().find(|w| w.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Waveform> {
        self.waveforms.iter()
    }

    pub fn len(&self) -> usize {
        self.waveforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waveforms.is_empty()
    }

    /// 选择门限满足条件且有效载荷最大的波形
    ///
    /// 有效载荷相同时取表中靠前的波形；质量低于所有门限（或为NaN）时返回 `None`。
    pub fn select(&self, quality: f64) -> Option<&Waveform> {
        let mut best: Option<&Waveform> = None;
        for wf in self.waveforms.iter().filter(|w| w.supports(quality)) {
            match best {
                Some(b) if b.payload_bytes >= wf.payload_bytes => {}
                _ => best = Some(wf),
            }
        }
        best
    }

    /// 表中出现的所有突发长度，升序去重
    pub fn burst_lengths(&self) -> Vec<u32> {
        let mut lengths: Vec<u32> = self.waveforms.iter().map(|w| w.burst_length).collect();
        lengths.sort_unstable();
        lengths.dedup();
        lengths
    }

    /// 不超过两个上限的最大突发长度，没有可用长度时返回0
    ///
    /// # 参数
    /// - `channel_symbols`: 信道剩余可用符号
    /// - `terminal_symbols`: 终端剩余可用符号
    pub fn optimal_burst_length(&self, channel_symbols: u64, terminal_symbols: u64) -> u64 {
        let bound = channel_symbols.min(terminal_symbols);
        self.burst_lengths()
            .into_iter()
            .map(u64::from)
            .filter(|&len| len <= bound)
            .max()
            .unwrap_or(0)
    }

    /// 为数据时隙选择波形
    ///
    /// 在门限满足的波形中取不超过上限的最长突发，长度相同时取有效载荷更大者，
    /// 再相同时取表中靠前者。`fallback` 指定的波形即使门限不满足也参与选择。
    pub fn best_burst(
        &self,
        channel_symbols: u64,
        terminal_symbols: u64,
        quality: f64,
        fallback: Option<WaveformId>,
    ) -> Option<&Waveform> {
        let bound = channel_symbols.min(terminal_symbols);
        let mut best: Option<&Waveform> = None;
        for wf in &self.waveforms {
            let eligible = wf.supports(quality) || Some(wf.id) == fallback;
            if !eligible || wf.burst_length as u64 > bound {
                continue;
            }
            match best {
                Some(b) if (b.burst_length, b.payload_bytes) >= (wf.burst_length, wf.payload_bytes) => {}
                _ => best = Some(wf),
            }
        }
        best
    }
}
