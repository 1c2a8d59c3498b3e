use crate::engine::period::{quarter_of, Quarter};
use crate::snapshot::models::{Iku, OwnedRecord, Owner, OwnerRef, ProxyIndicator, Target, ValueType};
use serde::{Deserialize, Serialize};

/// Where an effective annual target came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    Annual,
    QuarterlyAverage,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectiveTarget {
    pub value: f64,
    pub source: TargetSource,
}

impl EffectiveTarget {
    pub const NONE: EffectiveTarget = EffectiveTarget {
        value: 0.0,
        source: TargetSource::None,
    };

    pub fn is_usable(&self) -> bool {
        self.value > 0.0
    }
}

/// Quarterly target values for one owner, indexed TW1..TW4.
pub type QuarterTargets = [Option<f64>; 4];

pub fn resolve_iku_annual_target(iku: &Iku) -> f64 {
    if let Some(annual) = iku.target_annual.filter(|v| *v > 0.0) {
        return annual;
    }
    let by_type = match iku.value_type {
        ValueType::Percentage => iku.target_percentage,
        ValueType::Points => iku.target_points,
    };
    by_type.unwrap_or(0.0)
}

pub fn resolve_proxy_annual_target(proxy: &ProxyIndicator) -> f64 {
    proxy.target_annual.filter(|v| *v > 0.0).unwrap_or(0.0)
}

pub fn resolve_annual_target(owner: Owner<'_>) -> f64 {
    match owner {
        Owner::Iku(iku) => resolve_iku_annual_target(iku),
        Owner::Proxy(proxy) => resolve_proxy_annual_target(proxy),
    }
}

/// `target_value` override, then `satuan`, then `persenan_target`.
pub fn resolve_quarter_target(target: &Target) -> Option<f64> {
    target
        .target_value
        .or(target.satuan)
        .or(target.persenan_target)
}

/// Mean over the quarters that carry a value; `None` when none do.
pub fn average_of_quarters(quarters: &QuarterTargets) -> Option<f64> {
    let values: Vec<f64> = quarters.iter().flatten().copied().collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// The annual goal used for progress and achievement.
///
/// Falls back to the average of the owner's quarterly targets when the annual fields give
/// nothing positive; zero when there is nothing to fall back to.
pub fn effective_annual_target(owner: Option<Owner<'_>>, quarters: &QuarterTargets) -> EffectiveTarget {
    let annual = owner.map(resolve_annual_target).unwrap_or(0.0);
    if annual > 0.0 {
        return EffectiveTarget {
            value: annual,
            source: TargetSource::Annual,
        };
    }

    match average_of_quarters(quarters) {
        Some(average) if average > 0.0 => EffectiveTarget {
            value: average,
            source: TargetSource::QuarterlyAverage,
        },
        _ => EffectiveTarget::NONE,
    }
}

/// Collect the quarterly targets that belong to `owner` for one reporting year.
///
/// Without a `year` the most recent year among the owner's targets is used, so the result
/// does not depend on record order. Targets carrying no year apply to any year but lose to a
/// target of the exact year. Periods that do not normalise to a quarter are ignored.
pub fn quarter_targets_for<'a>(
    owner: OwnerRef,
    targets: impl IntoIterator<Item = &'a Target>,
    year: Option<i32>,
) -> QuarterTargets {
    let owned: Vec<(Quarter, &Target)> = targets
        .into_iter()
        .filter(|target| target.owner() == Some(owner))
        .filter_map(|target| quarter_of(target.period.as_deref()).map(|q| (q, target)))
        .collect();
    let year = year.or_else(|| owned.iter().filter_map(|(_, target)| target.year).max());

    let mut quarters: QuarterTargets = [None; 4];
    let mut exact = [false; 4];
    for (quarter, target) in owned {
        let is_exact = match target.year {
            None => false,
            Some(actual) if Some(actual) == year => true,
            Some(_) => continue,
        };
        let idx = quarter.index();
        if exact[idx] && !is_exact {
            continue;
        }
        if let Some(value) = resolve_quarter_target(target) {
            quarters[idx] = Some(value);
            exact[idx] |= is_exact;
        }
    }
    quarters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iku(value_type: ValueType, annual: f64, percentage: f64, points: f64) -> Iku {
        Iku {
            id: 1,
            indicator_id: Some(1),
            indicator: None,
            value_type,
            target_points: Some(points),
            target_percentage: Some(percentage),
            target_annual: Some(annual),
        }
    }

    fn target(id: i64, period: &str, value: Option<f64>) -> Target {
        Target {
            id,
            iku_id: Some(1),
            proxy_id: None,
            iku: None,
            proxy: None,
            period: Some(period.to_string()),
            year: Some(2024),
            target_value: None,
            satuan: value,
            persenan_target: None,
        }
    }

    #[test]
    fn test_iku_annual_precedence() {
        assert_eq!(resolve_iku_annual_target(&iku(ValueType::Points, 400.0, 75.0, 20.0)), 400.0);
        assert_eq!(resolve_iku_annual_target(&iku(ValueType::Percentage, 0.0, 75.0, 20.0)), 75.0);
        assert_eq!(resolve_iku_annual_target(&iku(ValueType::Points, 0.0, 75.0, 20.0)), 20.0);
        assert_eq!(resolve_iku_annual_target(&iku(ValueType::Points, -1.0, 75.0, 0.0)), 0.0);
    }

    #[test]
    fn test_proxy_annual_ignores_percentage() {
        let proxy = ProxyIndicator {
            id: 3,
            indicator_id: Some(2),
            indicator: None,
            parent_iku_id: None,
            target_annual: None,
            target_percentage: Some(80.0),
        };
        assert_eq!(resolve_proxy_annual_target(&proxy), 0.0);
    }

    #[test]
    fn test_quarter_target_precedence() {
        let mut record = target(1, "TW1", Some(90.0));
        record.persenan_target = Some(50.0);
        assert_eq!(resolve_quarter_target(&record), Some(90.0));

        record.target_value = Some(120.0);
        assert_eq!(resolve_quarter_target(&record), Some(120.0));

        record.target_value = None;
        record.satuan = None;
        assert_eq!(resolve_quarter_target(&record), Some(50.0));

        record.persenan_target = None;
        assert_eq!(resolve_quarter_target(&record), None);
    }

    #[test]
    fn test_falls_back_to_average_of_available_quarters() {
        let owner = iku(ValueType::Points, 0.0, 0.0, 0.0);
        let targets = vec![
            target(1, "TW1", Some(80.0)),
            target(2, "II", Some(90.0)),
            target(3, "TW 3", None),
        ];
        let quarters = quarter_targets_for(OwnerRef::Iku(1), &targets, None);
        assert_eq!(quarters, [Some(80.0), Some(90.0), None, None]);

        let effective = effective_annual_target(Some(Owner::Iku(&owner)), &quarters);
        assert_eq!(effective.value, 85.0);
        assert_eq!(effective.source, TargetSource::QuarterlyAverage);
    }

    #[test]
    fn test_no_target_anywhere_is_zero() {
        let owner = iku(ValueType::Percentage, 0.0, 0.0, 0.0);
        let effective = effective_annual_target(Some(Owner::Iku(&owner)), &[None; 4]);
        assert_eq!(effective, EffectiveTarget::NONE);
        assert!(!effective.is_usable());
        assert_eq!(effective_annual_target(None, &[None; 4]), EffectiveTarget::NONE);
    }

    #[test]
    fn test_quarter_targets_respect_owner_and_year() {
        let mut other_year = target(4, "TW4", Some(115.0));
        other_year.year = Some(2023);
        let mut other_owner = target(5, "TW2", Some(10.0));
        other_owner.iku_id = Some(2);
        let targets = vec![target(1, "TW1", Some(90.0)), other_year, other_owner];

        let quarters = quarter_targets_for(OwnerRef::Iku(1), &targets, Some(2024));
        assert_eq!(quarters, [Some(90.0), None, None, None]);
    }

    #[test]
    fn test_quarter_targets_prefer_latest_year_regardless_of_order() {
        let mut old_tw1 = target(1, "TW1", Some(10.0));
        old_tw1.year = Some(2023);
        let current = vec![target(2, "TW1", Some(80.0)), target(3, "TW2", Some(90.0))];

        let mut old_first = vec![old_tw1.clone()];
        old_first.extend(current.iter().cloned());
        let mut old_last = current.clone();
        old_last.push(old_tw1);

        for targets in [&old_first, &old_last] {
            let quarters = quarter_targets_for(OwnerRef::Iku(1), targets, None);
            assert_eq!(quarters, [Some(80.0), Some(90.0), None, None]);
            let quarters = quarter_targets_for(OwnerRef::Iku(1), targets, Some(2023));
            assert_eq!(quarters, [Some(10.0), None, None, None]);
        }
    }

    #[test]
    fn test_exact_year_beats_undated_target() {
        let mut undated = target(1, "TW1", Some(50.0));
        undated.year = None;
        let dated = target(2, "TW1", Some(80.0));

        let quarters = quarter_targets_for(OwnerRef::Iku(1), [&dated, &undated], Some(2024));
        assert_eq!(quarters[0], Some(80.0));
        let quarters = quarter_targets_for(OwnerRef::Iku(1), [&undated, &dated], Some(2024));
        assert_eq!(quarters[0], Some(80.0));
        let quarters = quarter_targets_for(OwnerRef::Iku(1), [&undated], Some(2030));
        assert_eq!(quarters[0], Some(50.0));
    }
}
