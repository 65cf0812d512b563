//! 演示用周期调度
//!
//! 每个周期复位分配器，为每个终端选择波形并在保证速率层准入，
//! 最小动态、动态和容量层的需求全部交给公平分配，最后生成时隙表

use dama_alloc::{
    AllocationListener, DistributionSummary, FrameAllocator, NoopListener, SlotTable, TierLoad,
};
use dama_core::{AllocationError, AllocatorConfig, CapacityRequest, TerminalId, Tier, WaveformId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 调度参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub target_utilization: f64,
    pub allow_idle_fill: bool,
    pub max_message_bytes: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            target_utilization: 0.95,
            allow_idle_fill: false,
            max_message_bytes: 512,
        }
    }
}

/// 已准入终端
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdmittedTerminal {
    pub terminal: TerminalId,
    pub waveform: WaveformId,
}

/// 一个周期的调度结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub admitted: Vec<AdmittedTerminal>,
    /// 信道质量低于所有波形门限
    pub no_waveform: Vec<TerminalId>,
    /// 保证速率部分永远无法放入帧
    pub unadmittable: Vec<TerminalId>,
    /// 本周期容量不足
    pub rejected: Vec<TerminalId>,
    pub summary: DistributionSummary,
    pub load: TierLoad,
    pub table: SlotTable,
}

/// 演示调度器
pub struct DemoSequencer {
    allocator: FrameAllocator,
    config: SequencerConfig,
    tick: u64,
}

impl DemoSequencer {
    pub fn new(
        allocator_config: AllocatorConfig,
        config: SequencerConfig,
    ) -> Result<Self, AllocationError> {
        Self::with_listener(allocator_config, config, Box::new(NoopListener))
    }

    pub fn with_listener(
        allocator_config: AllocatorConfig,
        config: SequencerConfig,
        listener: Box<dyn AllocationListener>,
    ) -> Result<Self, AllocationError> {
        if !(0.0..=1.0).contains(&config.target_utilization) {
            return Err(AllocationError::InvalidTargetUtilization(
                config.target_utilization,
            ));
        }
        Ok(Self {
            allocator: FrameAllocator::with_listener(allocator_config, listener)?,
            config,
            tick: 0,
        })
    }

    pub fn allocator(&self) -> &FrameAllocator {
        &self.allocator
    }

    /// 执行一个完整周期
    pub fn run_tick(&mut self, requests: &[CapacityRequest]) -> Result<TickReport, AllocationError> {
        self.tick += 1;
        self.allocator.reset();

        let mut admitted = Vec::new();
        let mut no_waveform = Vec::new();
        let mut unadmittable = Vec::new();
        let mut rejected = Vec::new();

        for request in requests {
            let Some(waveform) = self.allocator.select_waveform(request.quality) else {
                debug!(terminal = %request.terminal, quality = request.quality, "no usable waveform");
                no_waveform.push(request.terminal);
                continue;
            };

            // 所有终端的保证速率部分先于任何更低层级
            match self.allocator.try_admit(Tier::Guaranteed, request, waveform) {
                Ok(true) => admitted.push(AdmittedTerminal {
                    terminal: request.terminal,
                    waveform,
                }),
                Ok(false) => rejected.push(request.terminal),
                Err(AllocationError::Unadmittable {
                    terminal,
                    required,
                    limit,
                }) => {
                    warn!(%terminal, required, limit, "terminal skipped");
                    unadmittable.push(terminal);
                }
                Err(e) => return Err(e),
            }
        }

        let summary = self
            .allocator
            .distribute(self.config.target_utilization, self.config.allow_idle_fill)?;
        let table = self.allocator.generate_slots(self.config.max_message_bytes)?;
        let load = self.allocator.load_for_tier(Tier::Volume);

        info!(
            tick = self.tick,
            admitted = admitted.len(),
            rejected = rejected.len(),
            slots = table.slots().count(),
            "tick complete, utilization {:.3}",
            table.placed_symbols as f64 / load.total.max(1) as f64
        );

        Ok(TickReport {
            tick: self.tick,
            admitted,
            no_waveform,
            unadmittable,
            rejected,
            summary,
            load,
            table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dama_core::{CapacityRequestItem, FrameGeometry, Waveform, WaveformTable};

    fn sequencer() -> DemoSequencer {
        let config = AllocatorConfig::new(
            FrameGeometry {
                total_symbols: 1000,
                symbols_per_carrier: 1000,
                carrier_count: 1,
                control_slot_symbols: 100,
                control_waveform: WaveformId(1),
            },
            WaveformTable::new(vec![Waveform::new(1, 50.0, 100, 10)]).unwrap(),
        );
        DemoSequencer::new(
            config,
            SequencerConfig {
                target_utilization: 1.0,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn request(id: u32, quality: f64, item: CapacityRequestItem) -> CapacityRequest {
        CapacityRequest::new(TerminalId(id), quality, vec![item])
    }

    #[test]
    fn test_tick_classifies_terminals() {
        let mut seq = sequencer();
        let requests = vec![
            request(1, 40.0, CapacityRequestItem::new(10, 0, 0, 0)),
            request(2, 60.0, CapacityRequestItem::new(200, 0, 0, 0)),
            request(3, 60.0, CapacityRequestItem::new(30, 10, 10, 10)),
            request(4, 60.0, CapacityRequestItem::new(50, 0, 0, 0)),
            request(5, 60.0, CapacityRequestItem::new(10, 0, 20, 0)),
            request(6, 60.0, CapacityRequestItem::new(20, 0, 0, 0)),
        ];

        let report = seq.run_tick(&requests).unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(report.no_waveform, vec![TerminalId(1)]);
        assert_eq!(report.unadmittable, vec![TerminalId(2)]);
        assert_eq!(report.rejected, vec![TerminalId(6)]);
        let admitted: Vec<_> = report.admitted.iter().map(|a| a.terminal.0).collect();
        assert_eq!(admitted, vec![3, 4, 5]);

        // 保证速率共900符号，剩余100符号给T3的最小动态层
        assert_eq!(report.summary.granted.minimum_dynamic, 100);
        assert_eq!(report.summary.granted.dynamic, 0);
        assert_eq!(report.table.slots().count(), 10);

        // 每个周期重新开始，相同输入得到相同结果
        let again = seq.run_tick(&requests).unwrap();
        assert_eq!(again.tick, 2);
        assert_eq!(again.table, report.table);
    }

    #[test]
    fn test_guaranteed_served_before_earlier_volume() {
        let mut seq = sequencer();
        let requests = vec![
            request(1, 60.0, CapacityRequestItem::new(0, 0, 0, 90)),
            request(2, 60.0, CapacityRequestItem::new(50, 0, 0, 0)),
        ];

        let report = seq.run_tick(&requests).unwrap();
        assert!(report.rejected.is_empty());
        let ledger = seq.allocator().ledger();
        assert_eq!(ledger.get(TerminalId(2)).unwrap().granted().guaranteed, 500);
        // 容量层只分到保证速率之后的剩余部分
        assert_eq!(ledger.get(TerminalId(1)).unwrap().granted().volume, 500);
        assert_eq!(report.summary.granted.volume, 500);
        assert_eq!(report.load.unmet(), 400);
    }

    #[test]
    fn test_shared_tiers_left_to_distribution() {
        let mut seq = sequencer();
        let requests = vec![
            request(1, 60.0, CapacityRequestItem::new(30, 0, 0, 0)),
            request(2, 60.0, CapacityRequestItem::new(50, 0, 30, 0)),
        ];

        let report = seq.run_tick(&requests).unwrap();
        assert_eq!(report.admitted.len(), 2);
        assert_eq!(report.summary.granted.dynamic, 200);
        assert_eq!(report.load.unmet(), 100);
    }

    #[test]
    fn test_invalid_target_rejected() {
        let config = sequencer().allocator().config().clone();
        let result = DemoSequencer::new(
            config,
            SequencerConfig {
                target_utilization: 2.0,
                ..Default::default()
            },
        );
        assert!(matches!(
            result,
            Err(AllocationError::InvalidTargetUtilization(_))
        ));
    }

    #[test]
    fn test_report_serializes() {
        let mut seq = sequencer();
        let report = seq
            .run_tick(&[request(7, 55.0, CapacityRequestItem::new(10, 0, 0, 0))])
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["admitted"][0]["terminal"], 7);
        assert_eq!(json["admitted"][0]["waveform"], 1);
        assert_eq!(json["table"]["placed_symbols"], 100);
    }
}
