//! 帧分配器配置
//!
//! 帧几何参数和波形表在构造时提供，一个周期内不可修改

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::AllocationError;
use crate::waveform::{WaveformId, WaveformTable};

/// 帧几何参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    /// 帧内可分配的符号总数
    pub total_symbols: u64,
    /// 单个载波的符号容量
    pub symbols_per_carrier: u64,
    /// 载波数量
    pub carrier_count: u16,
    /// 控制时隙长度（符号）
    pub control_slot_symbols: u64,
    /// 控制时隙使用的波形
    pub control_waveform: WaveformId,
}

impl FrameGeometry {
    /// 单个终端在一帧内可获得的最大符号数
    pub fn terminal_limit(&self) -> u64 {
        self.total_symbols.min(self.symbols_per_carrier)
    }
}

/// 帧分配器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// 帧ID，写入授权消息头
    #[serde(default)]
    pub frame_id: u8,
    pub geometry: FrameGeometry,
    pub waveforms: WaveformTable,
    /// 按信道生成时隙；关闭时终端的所有信道合并为信道0
    #[serde(default = "default_channel_based_slots")]
    pub channel_based_slots: bool,
}

fn default_channel_based_slots() -> bool {
    true
}

impl AllocatorConfig {
    pub fn new(geometry: FrameGeometry, waveforms: WaveformTable) -> Self {
        Self {
            frame_id: 0,
            geometry,
            waveforms,
            channel_based_slots: true,
        }
    }

    /// 从JSON字符串加载并校验配置
    pub fn from_json_str(json: &str) -> Result<Self, AllocationError> {
        let config: AllocatorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 从JSON文件加载并校验配置
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AllocationError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// 结构性校验，任何一项不满足都无法在运行时修正
    pub fn validate(&self) -> Result<(), AllocationError> {
        self.waveforms.validate()?;

        let geometry = &self.geometry;
        if geometry.carrier_count == 0 {
            return Err(AllocationError::InvalidConfig(
                "frame has no carriers".to_string(),
            ));
        }
        if geometry.symbols_per_carrier == 0 || geometry.symbols_per_carrier > u32::MAX as u64 {
            return Err(AllocationError::InvalidConfig(format!(
                "symbols per carrier {} out of range",
                geometry.symbols_per_carrier
            )));
        }
        let capacity = geometry.symbols_per_carrier * geometry.carrier_count as u64;
        if geometry.total_symbols == 0 || geometry.total_symbols > capacity {
            return Err(AllocationError::InvalidConfig(format!(
                "total symbols {} must be within carrier capacity {capacity}",
                geometry.total_symbols
            )));
        }
        if geometry.control_slot_symbols > geometry.symbols_per_carrier {
            return Err(AllocationError::InvalidConfig(format!(
                "control slot of {} symbols does not fit a carrier",
                geometry.control_slot_symbols
            )));
        }
        if self.waveforms.get(geometry.control_waveform).is_none() {
            return Err(AllocationError::UnknownWaveform(geometry.control_waveform));
        }
        if let Some(wf) = self
            .waveforms
            .iter()
            .find(|w| w.burst_length as u64 > geometry.symbols_per_carrier)
        {
            return Err(AllocationError::InvalidConfig(format!(
                "waveform {} burst of {} symbols does not fit a carrier",
                wf.id, wf.burst_length
            )));
        }
        Ok(())
    }
}
