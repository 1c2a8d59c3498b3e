pub mod config;
pub mod csv_parser;
pub mod engine;
pub mod export;
pub mod logging;
pub mod snapshot;

pub use config::{ConfigError, DuplicatePolicy, EngineConfig};
pub use engine::{aggregate, AggregationReport, ReportCache, StableOrderer};
pub use snapshot::{Snapshot, SnapshotError};
