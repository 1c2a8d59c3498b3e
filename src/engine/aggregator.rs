use crate::config::{DuplicatePolicy, EngineConfig};
use crate::engine::achievement::{
    annual_achievement, has_issues, per_period_progress, AchievementStatus,
};
use crate::engine::period::{quarter_of, Quarter};
use crate::engine::resolver::{
    resolve, resolve_owner, PlaceholderIndicator, Resolution, UnresolvedReason,
};
use crate::engine::summary::{summarize, SnapshotSummary, Totals};
use crate::engine::target_value::{
    effective_annual_target, quarter_targets_for, resolve_quarter_target, QuarterTargets,
    TargetSource,
};
use crate::snapshot::models::{
    Indicator, IndicatorKind, OwnedRecord, Owner, OwnerRef, Realization, RecordId, Target,
};
use crate::snapshot::{Snapshot, SnapshotIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

/// Identity of a display row. Placeholders are keyed per record, so two placeholders for
/// the same owner never merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroupKey {
    Indicator { id: RecordId },
    Placeholder { owner: OwnerRef, record_id: RecordId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum GroupIndicator {
    Resolved(Indicator),
    Synthesized(PlaceholderIndicator),
}

impl GroupIndicator {
    pub fn name(&self) -> &str {
        match self {
            GroupIndicator::Resolved(indicator) => &indicator.name,
            GroupIndicator::Synthesized(placeholder) => &placeholder.name,
        }
    }

    pub fn kind(&self) -> IndicatorKind {
        match self {
            GroupIndicator::Resolved(indicator) => indicator.kind,
            GroupIndicator::Synthesized(placeholder) => placeholder.kind,
        }
    }

    /// The real Indicator id, for edit/delete; placeholders have none.
    pub fn indicator_id(&self) -> Option<RecordId> {
        match self {
            GroupIndicator::Resolved(indicator) => Some(indicator.id),
            GroupIndicator::Synthesized(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuarterSlot {
    pub value: Option<f64>,
    pub target: Option<f64>,
    /// Realized value against the effective annual target.
    pub progress: f64,
    pub source_record: Option<RecordId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuarterSlots {
    #[serde(rename = "TW1")]
    pub tw1: QuarterSlot,
    #[serde(rename = "TW2")]
    pub tw2: QuarterSlot,
    #[serde(rename = "TW3")]
    pub tw3: QuarterSlot,
    #[serde(rename = "TW4")]
    pub tw4: QuarterSlot,
}

impl QuarterSlots {
    pub fn get(&self, quarter: Quarter) -> &QuarterSlot {
        match quarter {
            Quarter::Tw1 => &self.tw1,
            Quarter::Tw2 => &self.tw2,
            Quarter::Tw3 => &self.tw3,
            Quarter::Tw4 => &self.tw4,
        }
    }

    pub fn get_mut(&mut self, quarter: Quarter) -> &mut QuarterSlot {
        match quarter {
            Quarter::Tw1 => &mut self.tw1,
            Quarter::Tw2 => &mut self.tw2,
            Quarter::Tw3 => &mut self.tw3,
            Quarter::Tw4 => &mut self.tw4,
        }
    }

    pub fn values(&self) -> [Option<f64>; 4] {
        Quarter::ALL.map(|quarter| self.get(quarter).value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualSummary {
    pub target: f64,
    pub target_source: TargetSource,
    pub achievement: f64,
    pub latest_quarter: Option<Quarter>,
    pub status: AchievementStatus,
    pub has_issues: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedGroup {
    pub key: GroupKey,
    pub indicator: GroupIndicator,
    pub owner: Option<OwnerRef>,
    pub quarter_slots: QuarterSlots,
    pub annual: AnnualSummary,
    pub realization_count: usize,
    /// Realizations attributed to this row whose period is not TW 1..TW 4.
    pub unmatched_period_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OrderedGroup>,
}

impl OrderedGroup {
    /// This row followed by its children, depth first.
    pub fn flatten(&self) -> Vec<&OrderedGroup> {
        let mut rows = vec![self];
        for child in &self.children {
            rows.extend(child.flatten());
        }
        rows
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanedRecord {
    pub id: RecordId,
    pub reason: UnresolvedReason,
}

/// Records the engine degraded instead of failing on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub orphaned_realizations: Vec<OrphanedRecord>,
    pub orphaned_targets: Vec<OrphanedRecord>,
    pub synthesized_placeholders: usize,
    /// Records carrying both an IKU and a Proxy id.
    pub ambiguous_owners: usize,
    pub unmatched_periods: usize,
    /// Realizations that collided with an already filled (indicator, quarter) slot.
    pub duplicate_slots: usize,
    /// Targets sharing (owner, quarter, year) with an earlier target; the later one is used.
    pub duplicate_targets: usize,
    pub skipped_other_year: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub groups: Vec<OrderedGroup>,
    pub summary: SnapshotSummary,
    pub diagnostics: Diagnostics,
}

impl AggregationReport {
    pub fn group(&self, key: &GroupKey) -> Option<&OrderedGroup> {
        self.groups
            .iter()
            .flat_map(OrderedGroup::flatten)
            .find(|group| &group.key == key)
    }

    pub fn keys(&self) -> Vec<GroupKey> {
        self.groups.iter().map(|group| group.key.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct SlotEntry {
    value: Option<f64>,
    target: Option<f64>,
    record_id: RecordId,
    year: Option<i32>,
}

struct GroupBuilder<'a> {
    key: GroupKey,
    indicator: GroupIndicator,
    owner: Option<Owner<'a>>,
    entries: [Option<SlotEntry>; 4],
    obstacle_reported: bool,
    realization_count: usize,
    unmatched_period_count: usize,
}

impl<'a> GroupBuilder<'a> {
    fn new(key: GroupKey, indicator: GroupIndicator, owner: Option<Owner<'a>>) -> Self {
        Self {
            key,
            indicator,
            owner,
            entries: [None; 4],
            obstacle_reported: false,
            realization_count: 0,
            unmatched_period_count: 0,
        }
    }
}

struct Aggregation<'a> {
    config: &'a EngineConfig,
    index: SnapshotIndex<'a>,
    groups: Vec<GroupBuilder<'a>>,
    positions: HashMap<GroupKey, usize>,
    targets_by_owner: HashMap<OwnerRef, Vec<&'a Target>>,
    target_slots: HashSet<(OwnerRef, Quarter, Option<i32>)>,
    quarter_cache: HashMap<(OwnerRef, Option<i32>), QuarterTargets>,
    diagnostics: Diagnostics,
    totals: Totals,
}

impl<'a> Aggregation<'a> {
    fn new(snapshot: &'a Snapshot, config: &'a EngineConfig) -> Self {
        Self {
            config,
            index: snapshot.index(),
            groups: Vec::new(),
            positions: HashMap::new(),
            targets_by_owner: HashMap::new(),
            target_slots: HashSet::new(),
            quarter_cache: HashMap::new(),
            diagnostics: Diagnostics::default(),
            totals: Totals {
                indicators: snapshot.indicators().len(),
                ..Totals::default()
            },
        }
    }

    fn ensure_group(
        &mut self,
        key: GroupKey,
        indicator: GroupIndicator,
        owner: Option<Owner<'a>>,
    ) -> usize {
        if let Some(&position) = self.positions.get(&key) {
            let group = &mut self.groups[position];
            if group.owner.is_none() {
                group.owner = owner;
            }
            return position;
        }
        let position = self.groups.len();
        self.positions.insert(key.clone(), position);
        self.groups.push(GroupBuilder::new(key, indicator, owner));
        position
    }

    fn seed_indicators(&mut self, indicators: &'a [Indicator]) {
        for indicator in indicators {
            let owner = self.index.owner_of_indicator(indicator);
            self.ensure_group(
                GroupKey::Indicator { id: indicator.id },
                GroupIndicator::Resolved(indicator.clone()),
                owner,
            );
        }
    }

    fn collect_targets(&mut self, targets: &'a [Target]) {
        for target in targets {
            if !self.config.accepts_year(target.year) {
                self.diagnostics.skipped_other_year += 1;
                continue;
            }
            if target.has_ambiguous_owner() {
                self.diagnostics.ambiguous_owners += 1;
            }
            match resolve(target, &self.index) {
                Resolution::Unresolved(reason) => {
                    tracing::warn!(target_id = target.id, ?reason, "orphaned target excluded");
                    self.diagnostics
                        .orphaned_targets
                        .push(OrphanedRecord { id: target.id, reason });
                }
                _ => {
                    if let Some(owner) = target.owner() {
                        if let Some(quarter) = quarter_of(target.period.as_deref()) {
                            if !self.target_slots.insert((owner, quarter, target.year)) {
                                tracing::debug!(
                                    target_id = target.id,
                                    %owner,
                                    quarter = quarter.key(),
                                    year = target.year,
                                    "duplicate target for owner, quarter and year"
                                );
                                self.diagnostics.duplicate_targets += 1;
                            }
                        }
                        self.targets_by_owner.entry(owner).or_default().push(target);
                        self.totals.targets += 1;
                    }
                }
            }
        }
    }

    fn quarter_targets(&mut self, owner: OwnerRef, year: Option<i32>) -> QuarterTargets {
        if let Some(cached) = self.quarter_cache.get(&(owner, year)) {
            return *cached;
        }
        let quarters = match self.targets_by_owner.get(&owner) {
            Some(targets) => quarter_targets_for(owner, targets.iter().copied(), year),
            None => [None; 4],
        };
        self.quarter_cache.insert((owner, year), quarters);
        quarters
    }

    fn slot_target(
        &mut self,
        realization: &'a Realization,
        owner: Option<OwnerRef>,
        quarter: Quarter,
    ) -> Option<f64> {
        let explicit = realization
            .target_id()
            .and_then(|id| {
                realization
                    .embedded_target()
                    .filter(|target| target.id == id)
                    .or_else(|| self.index.target(id))
            })
            .and_then(resolve_quarter_target);
        if explicit.is_some() {
            return explicit;
        }
        let owner = owner?;
        let year = realization.year.or(self.config.year);
        self.quarter_targets(owner, year)[quarter.index()]
    }

    fn add_realization(&mut self, realization: &'a Realization) {
        if !self.config.accepts_year(realization.year) {
            self.diagnostics.skipped_other_year += 1;
            return;
        }
        if realization.has_ambiguous_owner() {
            self.diagnostics.ambiguous_owners += 1;
        }

        let resolution = resolve(realization, &self.index);
        let owner = resolve_owner(realization, &self.index);
        let position = match resolution {
            Resolution::Unresolved(reason) => {
                tracing::warn!(
                    realization_id = realization.id,
                    ?reason,
                    "orphaned realization excluded"
                );
                self.diagnostics.orphaned_realizations.push(OrphanedRecord {
                    id: realization.id,
                    reason,
                });
                return;
            }
            Resolution::Resolved { indicator, .. } => {
                let owner = self.index.owner_of_indicator(indicator).or(owner);
                self.ensure_group(
                    GroupKey::Indicator { id: indicator.id },
                    GroupIndicator::Resolved(indicator.clone()),
                    owner,
                )
            }
            Resolution::Synthesized(placeholder) => {
                self.diagnostics.synthesized_placeholders += 1;
                self.ensure_group(
                    GroupKey::Placeholder {
                        owner: placeholder.owner,
                        record_id: placeholder.record_id,
                    },
                    GroupIndicator::Synthesized(placeholder),
                    owner,
                )
            }
        };
        self.totals.realizations += 1;

        let group_owner = self.groups[position].owner.map(|o| o.owner_ref());
        {
            let group = &mut self.groups[position];
            group.realization_count += 1;
            group.obstacle_reported |= realization.has_obstacle();
        }

        let Some(quarter) = quarter_of(realization.period.as_deref()) else {
            tracing::debug!(
                realization_id = realization.id,
                period = realization.period.as_deref().unwrap_or_default(),
                "period does not map to a quarter"
            );
            self.groups[position].unmatched_period_count += 1;
            self.diagnostics.unmatched_periods += 1;
            return;
        };

        let target = self.slot_target(realization, group_owner, quarter);
        let entry = SlotEntry {
            value: realization.value,
            target,
            record_id: realization.id,
            year: realization.year,
        };

        let slot_index = quarter.index();
        let existing = self.groups[position].entries[slot_index].map(|e| e.record_id);
        match (existing, self.config.duplicate_policy) {
            (None, _) => self.groups[position].entries[slot_index] = Some(entry),
            (Some(replaced), DuplicatePolicy::LastWins) => {
                tracing::debug!(
                    replaced,
                    by = realization.id,
                    quarter = quarter.key(),
                    "duplicate realization replaces earlier one"
                );
                self.groups[position].entries[slot_index] = Some(entry);
                self.diagnostics.duplicate_slots += 1;
            }
            (Some(kept), DuplicatePolicy::FirstWins) => {
                tracing::debug!(
                    kept,
                    ignored = realization.id,
                    quarter = quarter.key(),
                    "duplicate realization ignored"
                );
                self.diagnostics.duplicate_slots += 1;
            }
        }
    }

    fn finish_group(&mut self, builder: GroupBuilder<'a>) -> OrderedGroup {
        let owner_ref = builder.owner.map(|owner| owner.owner_ref());
        // Reporting year of the row: that of its latest filled slot.
        let year = builder
            .entries
            .iter()
            .rev()
            .flatten()
            .find_map(|entry| entry.year)
            .or(self.config.year);
        let quarters = match owner_ref {
            Some(owner) => self.quarter_targets(owner, year),
            None => [None; 4],
        };
        let effective = effective_annual_target(builder.owner, &quarters);

        let mut slots = QuarterSlots::default();
        for quarter in Quarter::ALL {
            let slot = slots.get_mut(quarter);
            match builder.entries[quarter.index()] {
                Some(entry) => {
                    slot.value = entry.value;
                    slot.target = entry.target.or(quarters[quarter.index()]);
                    slot.source_record = Some(entry.record_id);
                }
                None => slot.target = quarters[quarter.index()],
            }
            slot.progress = per_period_progress(slot.value, effective.value);
        }

        let annual = annual_achievement(&slots.values(), effective.value);
        let status = AchievementStatus::classify(annual.achievement);

        OrderedGroup {
            key: builder.key,
            indicator: builder.indicator,
            owner: owner_ref,
            quarter_slots: slots,
            annual: AnnualSummary {
                target: effective.value,
                target_source: effective.source,
                achievement: annual.achievement,
                latest_quarter: annual.latest_quarter,
                status,
                has_issues: has_issues(builder.obstacle_reported, annual.achievement),
            },
            realization_count: builder.realization_count,
            unmatched_period_count: builder.unmatched_period_count,
            children: Vec::new(),
        }
    }

    /// Key of the row a proxy row nests under: its parent IKU's indicator.
    fn parent_key(&self, owner: Option<Owner<'a>>) -> Option<GroupKey> {
        let Some(Owner::Proxy(proxy)) = owner else {
            return None;
        };
        let parent_iku_id = proxy.parent_iku_id?;
        let indicator_id = self
            .index
            .iku(parent_iku_id)
            .and_then(|iku| Owner::Iku(iku).indicator_id())
            .filter(|id| self.index.indicator(*id).is_some())
            .or_else(|| {
                self.index
                    .indicator_by_back_reference(OwnerRef::Iku(parent_iku_id))
                    .map(|indicator| indicator.id)
            })?;
        let key = GroupKey::Indicator { id: indicator_id };
        let parent_position = *self.positions.get(&key)?;
        match self.groups[parent_position].owner {
            Some(Owner::Proxy(_)) => None,
            _ => Some(key),
        }
    }

    fn finish(mut self) -> (Vec<OrderedGroup>, Diagnostics, Totals) {
        let parents: Vec<Option<GroupKey>> = if self.config.nest_proxies {
            self.groups
                .iter()
                .map(|group| self.parent_key(group.owner))
                .collect()
        } else {
            vec![None; self.groups.len()]
        };

        let builders = std::mem::take(&mut self.groups);
        let mut finished: Vec<OrderedGroup> = Vec::with_capacity(builders.len());
        let mut child_lists: HashMap<GroupKey, Vec<OrderedGroup>> = HashMap::new();
        for (builder, parent) in builders.into_iter().zip(parents) {
            let group = self.finish_group(builder);
            match parent {
                Some(parent) if parent != group.key => {
                    child_lists.entry(parent).or_default().push(group)
                }
                _ => finished.push(group),
            }
        }

        for group in &mut finished {
            if let Some(children) = child_lists.remove(&group.key) {
                group.children = children;
            }
        }

        (finished, self.diagnostics, self.totals)
    }
}

/// Group realizations by resolved Indicator into TW1..TW4 rows.
///
/// Rows come out in Indicator order (when `include_unreported` is set), followed by rows
/// first seen while scanning realizations. Within one (indicator, quarter) slot the
/// configured [`DuplicatePolicy`] decides which realization is kept, so callers that need a
/// deterministic winner must order realizations themselves.
pub fn aggregate(snapshot: &Snapshot, config: &EngineConfig) -> AggregationReport {
    let mut aggregation = Aggregation::new(snapshot, config);

    if config.include_unreported {
        aggregation.seed_indicators(snapshot.indicators());
    }
    aggregation.collect_targets(snapshot.targets());
    for realization in snapshot.realizations() {
        aggregation.add_realization(realization);
    }

    let (groups, diagnostics, totals) = aggregation.finish();
    let summary = summarize(&groups, totals, &diagnostics);

    tracing::info!(
        rows = groups.len(),
        realizations = totals.realizations,
        orphaned = summary.orphaned_records,
        placeholders = diagnostics.synthesized_placeholders,
        "aggregation finished"
    );

    AggregationReport {
        groups,
        summary,
        diagnostics,
    }
}

/// Rows sharing one indicator name, for tables that group visually by name.
///
/// Only a display family: each member keeps its own Indicator id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameFamily {
    pub name: String,
    pub indicator_ids: Vec<RecordId>,
    pub keys: Vec<GroupKey>,
}

pub fn name_families(groups: &[OrderedGroup]) -> Vec<NameFamily> {
    let mut families: Vec<NameFamily> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for group in groups.iter().flat_map(OrderedGroup::flatten) {
        let normalized = normalize_name(group.indicator.name());
        let position = *positions.entry(normalized).or_insert_with(|| {
            families.push(NameFamily {
                name: group.indicator.name().trim().to_string(),
                indicator_ids: Vec::new(),
                keys: Vec::new(),
            });
            families.len() - 1
        });

        let family = &mut families[position];
        if let Some(id) = group.indicator.indicator_id() {
            if !family.indicator_ids.contains(&id) {
                family.indicator_ids.push(id);
            }
        }
        family.keys.push(group.key.clone());
    }

    families
}

fn normalize_name(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
