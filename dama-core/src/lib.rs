//! DAMA Core Library
//!
//! This crate provides the configuration, request model and waveform table
//! shared by the DAMA frame allocator and its callers.

pub mod config;
pub mod error;
pub mod request;
pub mod waveform;

// 导出错误类型
pub use error::AllocationError;

pub use config::{AllocatorConfig, FrameGeometry};
pub use request::{
    CapacityRequest, CapacityRequestItem, ChannelIndex, SymbolTiers, TerminalId, Tier,
};
pub use waveform::{Waveform, WaveformId, WaveformTable};
