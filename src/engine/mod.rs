pub mod achievement;
pub mod aggregator;
pub mod cache;
pub mod ordering;
pub mod period;
pub mod resolver;
pub mod summary;
pub mod target_value;

pub use achievement::AchievementStatus;
pub use aggregator::{
    aggregate, name_families, AggregationReport, AnnualSummary, Diagnostics, GroupIndicator,
    GroupKey, NameFamily, OrderedGroup, OrphanedRecord, QuarterSlot, QuarterSlots,
};
pub use cache::ReportCache;
pub use ordering::StableOrderer;
pub use period::Quarter;
pub use resolver::{resolve, Resolution, ResolutionSource, UnresolvedReason};
pub use summary::SnapshotSummary;
pub use target_value::{EffectiveTarget, TargetSource};
