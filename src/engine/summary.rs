use crate::engine::achievement::AchievementStatus;
use crate::engine::aggregator::{Diagnostics, OrderedGroup};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: AchievementStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub total_indicators: usize,
    pub total_targets: usize,
    pub total_realizations: usize,
    /// Mean annual achievement over rows whose effective annual target is positive.
    pub average_achievement: f64,
    pub status_distribution: Vec<StatusCount>,
    pub orphaned_records: usize,
}

/// Record counts that made it into the aggregation (orphans and other-year records excluded).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub indicators: usize,
    pub targets: usize,
    pub realizations: usize,
}

pub fn summarize(groups: &[OrderedGroup], totals: Totals, diagnostics: &Diagnostics) -> SnapshotSummary {
    let rows: Vec<&OrderedGroup> = groups.iter().flat_map(OrderedGroup::flatten).collect();

    let achievements: Vec<f64> = rows
        .iter()
        .filter(|group| group.annual.target > 0.0)
        .map(|group| group.annual.achievement)
        .collect();
    let average_achievement = if achievements.is_empty() {
        0.0
    } else {
        achievements.iter().sum::<f64>() / achievements.len() as f64
    };

    let status_distribution = AchievementStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: rows
                .iter()
                .filter(|group| group.annual.status == *status)
                .count(),
        })
        .collect();

    SnapshotSummary {
        total_indicators: totals.indicators,
        total_targets: totals.targets,
        total_realizations: totals.realizations,
        average_achievement,
        status_distribution,
        orphaned_records: diagnostics.orphaned_realizations.len()
            + diagnostics.orphaned_targets.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::aggregator::aggregate;
    use crate::snapshot::Snapshot;

    #[test]
    fn test_average_excludes_rows_without_target() {
        let snapshot = Snapshot::from_json(
            r#"{
            "indicators": [
                { "id": 1, "name": "A", "kind": "IKU" },
                { "id": 2, "name": "B", "kind": "IKU" },
                { "id": 3, "name": "C", "kind": "IKU" }
            ],
            "ikus": [
                { "id": 10, "indicatorId": 1, "targetAnnual": 100 },
                { "id": 20, "indicatorId": 2, "targetAnnual": 200 },
                { "id": 30, "indicatorId": 3 }
            ],
            "realizations": [
                { "id": 1, "ikuId": 10, "period": "TW1", "value": 90 },
                { "id": 2, "ikuId": 20, "period": "TW2", "value": 100 },
                { "id": 3, "ikuId": 30, "period": "TW2", "value": 100 },
                { "id": 4, "period": "TW2", "value": 100 }
            ]
        }"#,
        )
        .expect("valid snapshot");

        let report = aggregate(&snapshot, &EngineConfig::default());
        let summary = &report.summary;

        assert_eq!(summary.total_indicators, 3);
        assert_eq!(summary.total_realizations, 3);
        assert_eq!(summary.orphaned_records, 1);
        assert!((summary.average_achievement - 70.0).abs() < 1e-9);

        let pending = summary
            .status_distribution
            .iter()
            .find(|entry| entry.status == AchievementStatus::Pending)
            .expect("pending bucket");
        assert_eq!(pending.count, 2);
    }
}
