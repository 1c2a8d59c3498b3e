use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::aggregator::{aggregate, AggregationReport};
use crate::snapshot::Snapshot;

/// Last computed report, reused while the snapshot collections keep their identity.
///
/// Identity is checked per collection allocation, not by content: replacing any collection
/// forces a recompute even if the new data is equal.
#[derive(Debug, Default)]
pub struct ReportCache {
    entry: Option<CacheEntry>,
    recomputations: usize,
}

#[derive(Debug)]
struct CacheEntry {
    snapshot: Snapshot,
    config: EngineConfig,
    report: Arc<AggregationReport>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(
        &mut self,
        snapshot: &Snapshot,
        config: &EngineConfig,
    ) -> Arc<AggregationReport> {
        if let Some(entry) = &self.entry {
            if entry.snapshot.same_identity(snapshot) && entry.config == *config {
                tracing::debug!("report cache hit");
                return Arc::clone(&entry.report);
            }
        }

        tracing::debug!(recomputations = self.recomputations + 1, "report cache miss");
        let report = Arc::new(aggregate(snapshot, config));
        self.recomputations += 1;
        self.entry = Some(CacheEntry {
            snapshot: snapshot.clone(),
            config: config.clone(),
            report: Arc::clone(&report),
        });
        report
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// How many times the report was actually computed.
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicatePolicy;

    const SNAPSHOT: &str = r#"{
        "indicators": [{ "id": 1, "name": "Data Quality", "kind": "IKU" }],
        "ikus": [{ "id": 5, "indicatorId": 1, "targetAnnual": 80 }],
        "realizations": [{ "id": 1, "ikuId": 5, "period": "TW1", "value": 17 }]
    }"#;

    #[test]
    fn test_reuses_report_for_same_snapshot() {
        let snapshot = Snapshot::from_json(SNAPSHOT).expect("valid snapshot");
        let config = EngineConfig::default();
        let mut cache = ReportCache::new();

        let first = cache.get_or_compute(&snapshot, &config);
        let second = cache.get_or_compute(&snapshot.clone(), &config);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.recomputations(), 1);
    }

    #[test]
    fn test_replaced_collection_forces_recompute() {
        let mut snapshot = Snapshot::from_json(SNAPSHOT).expect("valid snapshot");
        let config = EngineConfig::default();
        let mut cache = ReportCache::new();

        cache.get_or_compute(&snapshot, &config);
        let same_content = snapshot.realizations().to_vec();
        snapshot
            .replace_realizations(same_content)
            .expect("unique ids");
        cache.get_or_compute(&snapshot, &config);

        assert_eq!(cache.recomputations(), 2);
    }

    #[test]
    fn test_config_change_forces_recompute() {
        let snapshot = Snapshot::from_json(SNAPSHOT).expect("valid snapshot");
        let mut cache = ReportCache::new();

        cache.get_or_compute(&snapshot, &EngineConfig::default());
        let config = EngineConfig {
            duplicate_policy: DuplicatePolicy::FirstWins,
            ..EngineConfig::default()
        };
        cache.get_or_compute(&snapshot, &config);
        cache.get_or_compute(&snapshot, &config);

        assert_eq!(cache.recomputations(), 2);

        cache.invalidate();
        cache.get_or_compute(&snapshot, &config);
        assert_eq!(cache.recomputations(), 3);
    }
}
