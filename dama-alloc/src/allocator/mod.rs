//! 单帧容量分配器
//!
//! 准入控制、剩余容量公平分配和时隙表生成

pub mod admission;
pub mod core;
pub mod distributor;
pub mod slot_generator;

pub use self::core::{FrameAllocator, TickState};
pub use distributor::DistributionSummary;
