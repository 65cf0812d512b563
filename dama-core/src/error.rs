//! 分配错误定义

use thiserror::Error;

use crate::request::TerminalId;
use crate::waveform::WaveformId;

/// 帧分配过程中的错误
///
/// 准入被拒绝不属于错误，`try_admit` 以 `Ok(false)` 返回；
/// 这里只包含配置错误、结构性拒绝和调用顺序错误。
#[derive(Error, Debug)]
pub enum AllocationError {
    /// 波形表为空
    #[error("waveform table is empty")]
    EmptyWaveformTable,
    /// 帧或波形配置非法
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// 配置文件解析失败
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
    /// 配置文件读取失败
    #[error("failed to read configuration: {0}")]
    ConfigRead(#[from] std::io::Error),
    /// 波形ID不存在
    #[error("unknown waveform id {0}")]
    UnknownWaveform(WaveformId),
    /// 保证速率部分单独就无法放入空帧
    #[error("terminal {terminal} can never be admitted: guaranteed cost {required} symbols exceeds limit {limit}")]
    Unadmittable {
        terminal: TerminalId,
        required: u64,
        limit: u64,
    },
    /// 请求的信道数超过信道序号范围
    #[error("terminal {terminal} requests {count} channels, more than the channel index allows")]
    TooManyChannels { terminal: TerminalId, count: usize },
    /// 同一周期内终端重复准入
    #[error("terminal {0} already admitted in this tick")]
    DuplicateTerminal(TerminalId),
    /// 目标利用率不在 [0, 1]
    #[error("target utilization {0} outside [0, 1]")]
    InvalidTargetUtilization(f64),
    /// 授权消息上限容纳不下一个时隙
    #[error("grant message limit {max} bytes is below the minimum of {required} bytes")]
    MessageTooSmall { max: usize, required: usize },
    /// 授权消息解码失败
    #[error("malformed grant message: {0}")]
    MalformedGrant(String),
    /// 周期内调用顺序错误
    #[error("{operation} called while tick is {state}")]
    OutOfOrder {
        operation: &'static str,
        state: &'static str,
    },
}
