use kpi_monitoring::config::{DuplicatePolicy, EngineConfig};
use kpi_monitoring::csv_parser::CsvParser;
use kpi_monitoring::engine::aggregator::name_families;
use kpi_monitoring::engine::{
    AchievementStatus, GroupKey, Quarter, ReportCache, StableOrderer, TargetSource,
};
use kpi_monitoring::export::export_report;
use kpi_monitoring::snapshot::models::{OwnerRef, Realization};
use kpi_monitoring::{aggregate, logging, Snapshot};
use std::fs;
use std::sync::Arc;

const SNAPSHOT: &str = r#"{
    "indicators": [
        { "id": 1, "name": "Data Quality", "kind": "IKU" },
        { "id": 2, "name": "Kepuasan Layanan", "kind": "IKU" },
        { "id": 3, "name": "Survei Kepuasan", "kind": "Proxy" },
        { "id": 4, "name": "data  quality", "kind": "IKU" }
    ],
    "ikus": [
        { "id": 10, "indicatorId": 1, "targetAnnual": "400" },
        { "id": 20, "indicatorId": 2 },
        { "id": 40, "indicatorId": 4, "targetAnnual": 100 }
    ],
    "proxies": [
        { "id": 30, "indicatorId": 3, "parentIkuId": 20, "targetAnnual": 60 }
    ],
    "targets": [
        { "id": 201, "ikuId": 20, "period": "TW1", "year": 2024, "satuan": 80 },
        { "id": 202, "ikuId": 20, "period": "TW2", "year": 2024, "satuan": 90 }
    ],
    "realizations": [
        { "id": 1, "ikuId": 10, "period": "TW1", "year": 2024, "value": 85 },
        { "id": 2, "ikuId": 10, "period": "II", "year": 2024, "value": 92 },
        { "id": 3, "ikuId": 10, "period": "Triwulan III", "year": 2024, "value": 105 },
        { "id": 4, "ikuId": 20, "period": "TW 2", "year": 2024, "value": "85,0" },
        { "id": 5, "proxyId": 30, "period": "tw1", "year": 2024, "value": 60 },
        { "id": 6, "period": "TW1", "year": 2024, "value": 12 },
        { "id": 7, "ikuId": 40, "period": "TW4", "year": 2023, "value": 99 }
    ]
}"#;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_aggregates_full_snapshot() {
    logging::init_test();

    let snapshot = Snapshot::from_json(SNAPSHOT).expect("valid snapshot");
    let report = aggregate(&snapshot, &EngineConfig::default());

    // Proxy 30 nests under Indicator 2 (its parent IKU's row).
    assert_eq!(
        report.keys(),
        vec![
            GroupKey::Indicator { id: 1 },
            GroupKey::Indicator { id: 2 },
            GroupKey::Indicator { id: 4 },
        ]
    );

    let data_quality = report.group(&GroupKey::Indicator { id: 1 }).expect("row 1");
    assert!(approx(data_quality.quarter_slots.get(Quarter::Tw1).progress, 21.25));
    assert!(approx(data_quality.annual.achievement, 26.25));
    assert_eq!(data_quality.annual.status, AchievementStatus::Pending);
    assert_eq!(data_quality.annual.latest_quarter, Some(Quarter::Tw3));

    // No annual target on IKU 20: the mean of its quarterly targets stands in.
    let service = report.group(&GroupKey::Indicator { id: 2 }).expect("row 2");
    assert_eq!(service.annual.target_source, TargetSource::QuarterlyAverage);
    assert!(approx(service.annual.target, 85.0));
    assert!(approx(service.annual.achievement, 100.0));
    assert_eq!(service.annual.status, AchievementStatus::OnTrack);
    assert!(!service.annual.has_issues);
    assert_eq!(service.quarter_slots.get(Quarter::Tw1).target, Some(80.0));
    assert_eq!(service.quarter_slots.get(Quarter::Tw1).value, None);

    let survey = &service.children[0];
    assert_eq!(survey.key, GroupKey::Indicator { id: 3 });
    assert!(approx(survey.annual.achievement, 100.0));

    let diagnostics = &report.diagnostics;
    assert_eq!(diagnostics.orphaned_realizations.len(), 1);
    assert_eq!(diagnostics.orphaned_realizations[0].id, 6);
    assert_eq!(report.summary.orphaned_records, 1);
    assert_eq!(report.summary.total_indicators, 4);
}

#[test]
fn test_year_filter_drops_other_years() {
    let snapshot = Snapshot::from_json(SNAPSHOT).expect("valid snapshot");

    let all_years = aggregate(&snapshot, &EngineConfig::default());
    let row = all_years.group(&GroupKey::Indicator { id: 4 }).expect("row 4");
    assert_eq!(row.quarter_slots.get(Quarter::Tw4).value, Some(99.0));

    let report = aggregate(&snapshot, &EngineConfig::default().with_year(2024));
    let row = report.group(&GroupKey::Indicator { id: 4 }).expect("row 4");
    assert_eq!(row.quarter_slots.get(Quarter::Tw4).value, None);
    assert_eq!(report.diagnostics.skipped_other_year, 1);
}

#[test]
fn test_display_order_survives_refresh() {
    let mut snapshot = Snapshot::from_json(SNAPSHOT).expect("valid snapshot");
    let config = EngineConfig::default();
    let mut cache = ReportCache::new();

    let first = cache.get_or_compute(&snapshot, &config);
    let mut orderer = StableOrderer::new(first.keys());
    assert!(orderer.move_before(&GroupKey::Indicator { id: 4 }, &GroupKey::Indicator { id: 1 }));

    // Same snapshot: memoized.
    let again = cache.get_or_compute(&snapshot, &config);
    assert!(Arc::ptr_eq(&first, &again));

    // A realization embedding an IKU that has no Indicator arrives: a placeholder row appears.
    let mut realizations = snapshot.realizations().to_vec();
    let extra: Realization = serde_json::from_str(
        r#"{ "id": 8, "ikuId": 99, "iku": { "id": 99, "targetAnnual": 10 }, "period": "TW1", "value": 3 }"#,
    )
    .expect("valid realization");
    realizations.push(extra);
    snapshot
        .replace_realizations(realizations)
        .expect("unique ids");

    let refreshed = cache.get_or_compute(&snapshot, &config);
    assert_eq!(cache.recomputations(), 2);
    assert_eq!(refreshed.diagnostics.synthesized_placeholders, 1);

    let mut groups = refreshed.groups.clone();
    orderer.apply(&mut groups);
    let ordered: Vec<GroupKey> = groups.iter().map(|group| group.key.clone()).collect();
    assert_eq!(
        ordered,
        vec![
            GroupKey::Indicator { id: 4 },
            GroupKey::Indicator { id: 1 },
            GroupKey::Indicator { id: 2 },
            GroupKey::Placeholder {
                owner: OwnerRef::Iku(99),
                record_id: 8,
            },
        ]
    );
}

#[test]
fn test_name_families_group_by_normalized_name() {
    let snapshot = Snapshot::from_json(SNAPSHOT).expect("valid snapshot");
    let report = aggregate(&snapshot, &EngineConfig::default());

    let families = name_families(&report.groups);
    let data_quality = families
        .iter()
        .find(|family| family.name == "Data Quality")
        .expect("family");
    assert_eq!(data_quality.indicator_ids, vec![1, 4]);
}

#[test]
fn test_csv_round_trip_through_engine() {
    let input = tempfile::tempdir().expect("temp dir");
    fs::write(
        input.path().join("indicators.csv"),
        "id;name;kind\n1;Data Quality;IKU\n",
    )
    .expect("write");
    fs::write(
        input.path().join("ikus.csv"),
        "id;indicator_id;target_annual\n10;1;400\n",
    )
    .expect("write");
    fs::write(
        input.path().join("realizations.csv"),
        "id;iku_id;period;value\n1;10;TW1;85\n2;10;TW1;90\n",
    )
    .expect("write");

    let snapshot = CsvParser::load_snapshot(input.path()).expect("load");
    let config = EngineConfig {
        duplicate_policy: DuplicatePolicy::FirstWins,
        ..EngineConfig::default()
    };
    let report = aggregate(&snapshot, &config);
    assert_eq!(report.groups[0].quarter_slots.get(Quarter::Tw1).value, Some(85.0));
    assert_eq!(report.diagnostics.duplicate_slots, 1);

    let output = input.path().join("report.csv");
    export_report(&report, "csv", &output).expect("export");
    let written = fs::read_to_string(&output).expect("read export");
    assert!(written.lines().nth(1).expect("data row").starts_with("Data Quality,IKU,,85.00,21.25"));
}
