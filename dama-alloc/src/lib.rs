//! DAMA Frame Allocator
//!
//! This crate allocates the symbol budget of a single time-division frame
//! among terminals and their channels: tiered admission, fair-share
//! distribution of the remaining capacity and generation of bounded-size
//! time slot grant messages.
//!
//! ```
//! use dama_alloc::FrameAllocator;
//! use dama_core::{
//!     AllocatorConfig, CapacityRequest, CapacityRequestItem, FrameGeometry, TerminalId, Tier,
//!     Waveform, WaveformId, WaveformTable,
//! };
//!
//! let config = AllocatorConfig::new(
//!     FrameGeometry {
//!         total_symbols: 2000,
//!         symbols_per_carrier: 1000,
//!         carrier_count: 2,
//!         control_slot_symbols: 100,
//!         control_waveform: WaveformId(1),
//!     },
//!     WaveformTable::new(vec![Waveform::new(1, 50.0, 100, 10)]).unwrap(),
//! );
//! let mut allocator = FrameAllocator::new(config).unwrap();
//!
//! let request = CapacityRequest::new(
//!     TerminalId(1),
//!     55.0,
//!     vec![CapacityRequestItem::new(20, 0, 30, 0)],
//! );
//! let waveform = allocator.select_waveform(request.quality).unwrap();
//! assert!(allocator.try_admit(Tier::Dynamic, &request, waveform).unwrap());
//!
//! allocator.distribute(0.9, false).unwrap();
//! let table = allocator.generate_slots(256).unwrap();
//! assert_eq!(table.slots().count(), 5);
//! ```

pub mod allocator;
pub mod counters;
pub mod grant;
pub mod ledger;
pub mod listener;

pub use allocator::{DistributionSummary, FrameAllocator, TickState};
pub use counters::{FrameCounters, TierLoad};
pub use grant::{GrantMessage, SlotKind, SlotTable, TerminalGrant, TimeSlot};
pub use ledger::{ChannelEntry, ChannelKey, Ledger, TerminalAllocation};
pub use listener::{
    AllocationListener, NoopListener, TerminalLoadEvent, TracingListener, UtilizationEvent,
    UtilizationStage, WaveformEvent,
};
