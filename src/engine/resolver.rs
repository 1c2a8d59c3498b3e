use crate::snapshot::models::{
    Indicator, IndicatorKind, OwnedRecord, Owner, OwnerRef, RecordId, Target,
};
use crate::snapshot::SnapshotIndex;
use serde::{Deserialize, Serialize};

/// Which lookup produced the Indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Indicator object embedded in the owning IKU/Proxy.
    EmbeddedOwner,
    /// Indicator joined by the owner's `indicator_id`.
    OwnerIndicatorId,
    /// Indicator whose own IKU/Proxy back-reference names the owner.
    ReverseRelation,
    /// Resolved through the Target the realization points at.
    ViaTarget,
}

/// Best-effort stand-in when the owner exists but no Indicator can be joined.
///
/// Placeholders never share a group, even for the same owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderIndicator {
    pub owner: OwnerRef,
    pub record_id: RecordId,
    pub name: String,
    pub kind: IndicatorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Neither `iku_id` nor `proxy_id` on the record.
    MissingOwner,
    /// Owner id present but the owner record itself is gone.
    MissingIndicator,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Resolved {
        indicator: &'a Indicator,
        source: ResolutionSource,
    },
    Synthesized(PlaceholderIndicator),
    Unresolved(UnresolvedReason),
}

/// Owner candidates for one record: the object embedded in the record and the one in the
/// snapshot collection. Either may be missing.
struct Lookup<'a> {
    owner_ref: OwnerRef,
    embedded: Option<Owner<'a>>,
    indexed: Option<Owner<'a>>,
}

impl<'a> Lookup<'a> {
    fn for_record<R: OwnedRecord>(
        record: &'a R,
        owner_ref: OwnerRef,
        index: &SnapshotIndex<'a>,
    ) -> Self {
        let embedded = match owner_ref {
            OwnerRef::Iku(id) => record
                .embedded_iku()
                .filter(|iku| iku.id == id)
                .map(Owner::Iku),
            OwnerRef::Proxy(id) => record
                .embedded_proxy()
                .filter(|proxy| proxy.id == id)
                .map(Owner::Proxy),
        };
        Self {
            owner_ref,
            embedded,
            indexed: index.owner(owner_ref),
        }
    }

    fn owners(&self) -> impl Iterator<Item = Owner<'a>> {
        self.embedded.into_iter().chain(self.indexed)
    }

    fn any_owner(&self) -> Option<Owner<'a>> {
        self.indexed.or(self.embedded)
    }
}

type Strategy = for<'a> fn(&Lookup<'a>, &SnapshotIndex<'a>) -> Option<&'a Indicator>;

/// Tried in order; the first hit wins.
const STRATEGIES: &[(ResolutionSource, Strategy)] = &[
    (ResolutionSource::EmbeddedOwner, from_embedded_owner as Strategy),
    (ResolutionSource::OwnerIndicatorId, from_owner_indicator_id as Strategy),
    (ResolutionSource::ReverseRelation, from_back_reference as Strategy),
];

fn from_embedded_owner<'a>(lookup: &Lookup<'a>, _index: &SnapshotIndex<'a>) -> Option<&'a Indicator> {
    lookup.owners().find_map(|owner| owner.embedded_indicator())
}

fn from_owner_indicator_id<'a>(
    lookup: &Lookup<'a>,
    index: &SnapshotIndex<'a>,
) -> Option<&'a Indicator> {
    lookup
        .owners()
        .filter_map(|owner| owner.indicator_id())
        .find_map(|indicator_id| index.indicator(indicator_id))
}

fn from_back_reference<'a>(lookup: &Lookup<'a>, index: &SnapshotIndex<'a>) -> Option<&'a Indicator> {
    index.indicator_by_back_reference(lookup.owner_ref)
}

fn run_strategies<'a>(
    lookup: &Lookup<'a>,
    index: &SnapshotIndex<'a>,
) -> Option<(&'a Indicator, ResolutionSource)> {
    STRATEGIES
        .iter()
        .find_map(|(source, strategy)| strategy(lookup, index).map(|indicator| (indicator, *source)))
}

fn linked_target<'a, R: OwnedRecord>(record: &'a R, index: &SnapshotIndex<'a>) -> Option<&'a Target> {
    let target_id = record.target_id()?;
    record
        .embedded_target()
        .filter(|target| target.id == target_id)
        .or_else(|| index.target(target_id))
}

/// Resolve the Indicator that owns a Target or Realization.
///
/// Order: embedded Indicator on the owner, the owner's `indicator_id`, Indicator
/// back-references, then the same chain through the linked Target. When all of those miss
/// but an owner record exists, a placeholder is synthesized from it.
pub fn resolve<'a, R: OwnedRecord>(record: &'a R, index: &SnapshotIndex<'a>) -> Resolution<'a> {
    let Some(owner_ref) = record.owner() else {
        return Resolution::Unresolved(UnresolvedReason::MissingOwner);
    };

    let lookup = Lookup::for_record(record, owner_ref, index);
    if let Some((indicator, source)) = run_strategies(&lookup, index) {
        return Resolution::Resolved { indicator, source };
    }

    let mut fallback_owner = lookup.any_owner();

    if let Some(target) = linked_target(record, index) {
        if let Some(target_owner_ref) = target.owner() {
            let target_lookup = Lookup::for_record(target, target_owner_ref, index);
            if let Some((indicator, _)) = run_strategies(&target_lookup, index) {
                tracing::debug!(
                    record_id = record.record_id(),
                    target_id = target.id,
                    indicator_id = indicator.id,
                    "indicator resolved through linked target"
                );
                return Resolution::Resolved {
                    indicator,
                    source: ResolutionSource::ViaTarget,
                };
            }
            fallback_owner = fallback_owner.or(target_lookup.any_owner());
        }
    }

    match fallback_owner {
        Some(owner) => {
            let placeholder = synthesize(record.record_id(), owner);
            tracing::warn!(
                record_id = record.record_id(),
                owner = %placeholder.owner,
                "no indicator found for owner, using placeholder"
            );
            Resolution::Synthesized(placeholder)
        }
        None => {
            tracing::warn!(
                record_id = record.record_id(),
                owner = %owner_ref,
                "owner record missing, record cannot be attributed"
            );
            Resolution::Unresolved(UnresolvedReason::MissingIndicator)
        }
    }
}

/// The IKU/Proxy record a Target or Realization belongs to, looking through the linked
/// Target when the record's own owner is gone.
pub fn resolve_owner<'a, R: OwnedRecord>(record: &'a R, index: &SnapshotIndex<'a>) -> Option<Owner<'a>> {
    let owner_ref = record.owner()?;
    Lookup::for_record(record, owner_ref, index)
        .any_owner()
        .or_else(|| {
            let target = linked_target(record, index)?;
            let target_owner_ref = target.owner()?;
            Lookup::for_record(target, target_owner_ref, index).any_owner()
        })
}

fn synthesize(record_id: RecordId, owner: Owner<'_>) -> PlaceholderIndicator {
    let owner_ref = owner.owner_ref();
    let name = owner
        .embedded_indicator()
        .map(|indicator| indicator.name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| owner_ref.to_string());

    PlaceholderIndicator {
        owner: owner_ref,
        record_id,
        name,
        kind: owner_ref.kind(),
    }
}
