//! 合成流量生成
//!
//! 为演示周期生成终端容量请求，使用固定种子以便结果可重复

use dama_core::{CapacityRequest, CapacityRequestItem, TerminalId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// 流量配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficProfile {
    /// 终端数量
    pub terminals: u32,
    /// 每个终端的最大信道数
    pub max_channels: u8,
    /// 信道质量范围（dB-Hz）
    pub quality_min: f64,
    pub quality_max: f64,
    /// 每信道保证速率字节上限
    pub guaranteed_bytes_max: u32,
    /// 每信道动态速率字节上限
    pub rate_bytes_max: u32,
    /// 每信道容量请求字节上限
    pub volume_bytes_max: u32,
    /// 申请控制时隙的终端比例（百分比）
    pub control_slot_percent: u8,
}

impl Default for TrafficProfile {
    fn default() -> Self {
        Self {
            terminals: 8,
            max_channels: 2,
            quality_min: 48.0,
            quality_max: 66.0,
            guaranteed_bytes_max: 40,
            rate_bytes_max: 120,
            volume_bytes_max: 200,
            control_slot_percent: 20,
        }
    }
}

/// 流量生成器
pub struct TrafficGenerator {
    profile: TrafficProfile,
    rng: StdRng,
    tick: u64,
}

impl TrafficGenerator {
    /// 使用指定种子创建（相同种子生成相同的请求序列）
    pub fn with_seed(profile: TrafficProfile, seed: u64) -> Self {
        Self {
            profile,
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
        }
    }

    /// 已生成的周期数
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// 生成一个周期内所有终端的请求
    pub fn generate_tick(&mut self) -> Vec<CapacityRequest> {
        self.tick += 1;
        let mut requests = Vec::with_capacity(self.profile.terminals as usize);
        for id in 0..self.profile.terminals {
            requests.push(self.generate_request(TerminalId(id)));
        }
        requests
    }

    fn generate_request(&mut self, terminal: TerminalId) -> CapacityRequest {
        let channels = self.range(1, self.profile.max_channels.max(1) as u64) as usize;
        let mut items = Vec::with_capacity(channels);
        for _ in 0..channels {
            let guaranteed = self.range(0, self.profile.guaranteed_bytes_max as u64) as u32;
            let rate = self.range(0, self.profile.rate_bytes_max as u64) as u32;
            let minimum = self.range(0, rate as u64) as u32;
            let volume = self.range(0, self.profile.volume_bytes_max as u64) as u32;
            items.push(CapacityRequestItem::from_rate_request(
                guaranteed, rate, minimum, volume,
            ));
        }

        // 质量以0.1 dB为步进
        let span = ((self.profile.quality_max - self.profile.quality_min) * 10.0).max(0.0) as u64;
        let quality = self.profile.quality_min + self.range(0, span) as f64 / 10.0;

        let request = CapacityRequest::new(terminal, quality, items);
        if self.range(0, 99) < self.profile.control_slot_percent as u64 {
            request.with_control_slot()
        } else {
            request
        }
    }

    /// 生成 [min, max] 内的随机值
    fn range(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        let range = max - min + 1;
        let mut buf = [0u8; 8];
        self.rng.fill_bytes(&mut buf);
        min + (u64::from_le_bytes(buf) % range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_traffic() {
        let mut a = TrafficGenerator::with_seed(TrafficProfile::default(), 42);
        let mut b = TrafficGenerator::with_seed(TrafficProfile::default(), 42);
        for _ in 0..3 {
            assert_eq!(a.generate_tick(), b.generate_tick());
        }
        assert_eq!(a.tick(), 3);
    }

    #[test]
    fn test_requests_within_profile() {
        let profile = TrafficProfile {
            terminals: 16,
            max_channels: 3,
            ..Default::default()
        };
        let mut generator = TrafficGenerator::with_seed(profile.clone(), 7);
        let requests = generator.generate_tick();

        assert_eq!(requests.len(), 16);
        for (i, req) in requests.iter().enumerate() {
            assert_eq!(req.terminal, TerminalId(i as u32));
            assert!((1..=3).contains(&req.channels.len()));
            assert!(req.quality >= profile.quality_min && req.quality <= profile.quality_max);
            for item in &req.channels {
                assert!(item.guaranteed_bytes <= profile.guaranteed_bytes_max);
                assert!(item.minimum_dynamic_bytes + item.dynamic_bytes <= profile.rate_bytes_max);
                assert!(item.volume_bytes <= profile.volume_bytes_max);
            }
        }
    }

    #[test]
    fn test_degenerate_profile() {
        let profile = TrafficProfile {
            terminals: 2,
            max_channels: 0,
            quality_min: 55.0,
            quality_max: 55.0,
            guaranteed_bytes_max: 0,
            rate_bytes_max: 0,
            volume_bytes_max: 0,
            control_slot_percent: 0,
        };
        let mut generator = TrafficGenerator::with_seed(profile, 1);
        for req in generator.generate_tick() {
            assert_eq!(req.channels, vec![CapacityRequestItem::default()]);
            assert_eq!(req.quality, 55.0);
            assert!(!req.control_slot);
        }
    }
}
