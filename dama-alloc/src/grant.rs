//! 时隙授权消息
//!
//! 时隙表按固定二进制格式编码，用于约束单条授权消息的大小。
//!
//! ```text
//! 消息头（5字节）: frame_id u8 | sequence u16 | slot_count u16
//! 时隙（18字节）:  terminal u32 | channel u8 | carrier u16 | waveform u16 |
//!                  offset u32 | length u32 | kind u8
//! ```
//!
//! 所有字段均为大端序。接收方依赖时隙顺序（终端、信道、突发）进行解码。

use bytes::{Buf, BufMut, Bytes, BytesMut};
use dama_core::{AllocationError, ChannelIndex, TerminalId, WaveformId};
use serde::Serialize;

/// 时隙类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Data,
    Control,
}

impl SlotKind {
    fn to_byte(self) -> u8 {
        match self {
            SlotKind::Data => 0,
            SlotKind::Control => 1,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(SlotKind::Data),
            1 => Some(SlotKind::Control),
            _ => None,
        }
    }
}

/// 载波上的一个时隙
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub terminal: TerminalId,
    pub channel: ChannelIndex,
    pub carrier: u16,
    pub waveform: WaveformId,
    /// 时隙在载波上的起始符号
    pub offset: u32,
    /// 时隙长度（符号）
    pub length: u32,
    pub kind: SlotKind,
}

impl TimeSlot {
    /// 单个时隙的编码长度
    pub const ENCODED_LEN: usize = 18;

    fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u32(self.terminal.0);
        buf.put_u8(self.channel);
        buf.put_u16(self.carrier);
        buf.put_u16(self.waveform.0);
        buf.put_u32(self.offset);
        buf.put_u32(self.length);
        buf.put_u8(self.kind.to_byte());
    }

    fn decode_from(buf: &mut Bytes) -> Result<Self, AllocationError> {
        let terminal = TerminalId(buf.get_u32());
        let channel = buf.get_u8();
        let carrier = buf.get_u16();
        let waveform = WaveformId(buf.get_u16());
        let offset = buf.get_u32();
        let length = buf.get_u32();
        let kind = buf.get_u8();
        let kind = SlotKind::from_byte(kind)
            .ok_or_else(|| AllocationError::MalformedGrant(format!("unknown slot kind {kind}")))?;
        Ok(Self {
            terminal,
            channel,
            carrier,
            waveform,
            offset,
            length,
            kind,
        })
    }
}

/// 一条授权消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantMessage {
    pub frame_id: u8,
    /// 本周期内的消息序号，从0开始
    pub sequence: u16,
    pub slots: Vec<TimeSlot>,
}

impl GrantMessage {
    /// 消息头编码长度
    pub const HEADER_LEN: usize = 5;

    pub fn new(frame_id: u8, sequence: u16) -> Self {
        Self {
            frame_id,
            sequence,
            slots: Vec::new(),
        }
    }

    /// 包含 `slots` 个时隙的消息编码长度
    pub fn encoded_len_for(slots: usize) -> usize {
        Self::HEADER_LEN + slots * TimeSlot::ENCODED_LEN
    }

    pub fn encoded_len(&self) -> usize {
        Self::encoded_len_for(self.slots.len())
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(self.frame_id);
        buf.put_u16(self.sequence);
        buf.put_u16(self.slots.len() as u16);
        for slot in &self.slots {
            slot.encode_into(&mut buf);
        }
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, AllocationError> {
        if data.len() < Self::HEADER_LEN {
            return Err(AllocationError::MalformedGrant(format!(
                "{} bytes is shorter than the header",
                data.len()
            )));
        }
        let mut buf = Bytes::copy_from_slice(data);
        let frame_id = buf.get_u8();
        let sequence = buf.get_u16();
        let count = buf.get_u16() as usize;
        if buf.remaining() != count * TimeSlot::ENCODED_LEN {
            return Err(AllocationError::MalformedGrant(format!(
                "expected {count} slots, found {} bytes of slot data",
                buf.remaining()
            )));
        }
        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            slots.push(TimeSlot::decode_from(&mut buf)?);
        }
        Ok(Self {
            frame_id,
            sequence,
            slots,
        })
    }
}

/// 授权消息构造器，只向前追加，已封装的消息不再修改
pub(crate) struct GrantMessageBuilder {
    frame_id: u8,
    max_bytes: usize,
    sealed: Vec<GrantMessage>,
    current: GrantMessage,
}

impl GrantMessageBuilder {
    pub(crate) fn new(frame_id: u8, max_bytes: usize) -> Result<Self, AllocationError> {
        let required = GrantMessage::encoded_len_for(1);
        if max_bytes < required {
            return Err(AllocationError::MessageTooSmall {
                max: max_bytes,
                required,
            });
        }
        Ok(Self {
            frame_id,
            max_bytes,
            sealed: Vec::new(),
            current: GrantMessage::new(frame_id, 0),
        })
    }

    pub(crate) fn push(&mut self, slot: TimeSlot) {
        let full = GrantMessage::encoded_len_for(self.current.slots.len() + 1) > self.max_bytes
            || self.current.slots.len() == u16::MAX as usize;
        if full {
            let next = GrantMessage::new(self.frame_id, self.current.sequence.wrapping_add(1));
            self.sealed.push(std::mem::replace(&mut self.current, next));
        }
        self.current.slots.push(slot);
    }

    pub(crate) fn finish(mut self) -> Vec<GrantMessage> {
        if !self.current.slots.is_empty() {
            self.sealed.push(self.current);
        }
        self.sealed
    }
}

/// 终端本周期实际获得的容量
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalGrant {
    pub terminal: TerminalId,
    /// 控制时隙是否已放置
    pub control_slot: bool,
    /// 各信道时隙可承载的字节数，按信道序号索引
    pub bytes_per_channel: Vec<u64>,
    /// 已放置的符号（含控制时隙）
    pub placed_symbols: u64,
}

impl TerminalGrant {
    pub fn total_bytes(&self) -> u64 {
        self.bytes_per_channel.iter().sum()
    }
}

/// 一个周期的时隙生成结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlotTable {
    pub messages: Vec<GrantMessage>,
    pub terminals: Vec<TerminalGrant>,
    /// 已放置到载波上的符号
    pub placed_symbols: u64,
    /// 已授权但无法放置的符号
    pub wasted_symbols: u64,
    /// 无法放置而丢弃的空闲填充符号
    pub discarded_filler_symbols: u64,
}

impl SlotTable {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 按输出顺序遍历全部时隙
    pub fn slots(&self) -> impl Iterator<Item = &TimeSlot> {
        self.messages.iter().flat_map(|m| m.slots.iter())
    }

    pub fn terminal(&self, terminal: TerminalId) -> Option<&TerminalGrant> {
        self.terminals.iter().find(|t| t.terminal == terminal)
    }
}
