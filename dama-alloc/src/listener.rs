//! 分配过程观察接口
//!
//! 监听器在构造分配器时注入，在固定位置同步调用，只用于诊断，不影响分配结果

use dama_core::{TerminalId, WaveformId};
use serde::Serialize;
use tracing::{debug, trace};

/// 为数据时隙选择波形
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaveformEvent {
    pub frame_id: u8,
    pub terminal: TerminalId,
    pub waveform: WaveformId,
    pub burst_length: u32,
}

/// 利用率统计的时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationStage {
    /// 公平分配完成后，按授权量统计
    Distributed,
    /// 时隙生成完成后，按实际放置量统计
    Placed,
}

/// 帧利用率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UtilizationEvent {
    pub frame_id: u8,
    pub stage: UtilizationStage,
    pub used_symbols: u64,
    pub total_symbols: u64,
}

impl UtilizationEvent {
    pub fn fraction(&self) -> f64 {
        if self.total_symbols == 0 {
            0.0
        } else {
            self.used_symbols as f64 / self.total_symbols as f64
        }
    }
}

/// 单个终端在帧内的负载
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TerminalLoadEvent {
    pub frame_id: u8,
    pub terminal: TerminalId,
    pub placed_symbols: u64,
    pub total_symbols: u64,
}

/// 分配过程监听器
pub trait AllocationListener: Send {
    fn on_waveform_selected(&mut self, _event: &WaveformEvent) {}

    fn on_utilization(&mut self, _event: &UtilizationEvent) {}

    fn on_terminal_load(&mut self, _event: &TerminalLoadEvent) {}
}

/// 不做任何处理的监听器
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl AllocationListener for NoopListener {}

/// 将事件写入 `tracing` 日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl AllocationListener for TracingListener {
    fn on_waveform_selected(&mut self, event: &WaveformEvent) {
        trace!(
            frame = event.frame_id,
            terminal = %event.terminal,
            waveform = %event.waveform,
            burst = event.burst_length,
            "waveform selected"
        );
    }

    fn on_utilization(&mut self, event: &UtilizationEvent) {
        debug!(
            frame = event.frame_id,
            stage = ?event.stage,
            used = event.used_symbols,
            total = event.total_symbols,
            "frame utilization {:.3}",
            event.fraction()
        );
    }

    fn on_terminal_load(&mut self, event: &TerminalLoadEvent) {
        trace!(
            frame = event.frame_id,
            terminal = %event.terminal,
            placed = event.placed_symbols,
            "terminal load"
        );
    }
}
