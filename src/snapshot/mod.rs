use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub mod models;
pub mod numeric;

use models::{
    Indicator, Iku, Owner, OwnerRef, ProxyIndicator, Realization, RecordId, Target,
};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate {collection} id: {id}")]
    DuplicateId {
        collection: &'static str,
        id: RecordId,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotPayload {
    #[serde(default)]
    indicators: Vec<Indicator>,
    #[serde(default)]
    ikus: Vec<Iku>,
    #[serde(default, alias = "proxy_indicators", alias = "proxyIndicators")]
    proxies: Vec<ProxyIndicator>,
    #[serde(default)]
    targets: Vec<Target>,
    #[serde(default)]
    realizations: Vec<Realization>,
}

/// One fetch worth of the five record sets.
///
/// Each collection sits behind its own `Arc`; cloning a snapshot is cheap and two snapshots
/// share identity for a collection until that collection is replaced.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    indicators: Arc<Vec<Indicator>>,
    ikus: Arc<Vec<Iku>>,
    proxies: Arc<Vec<ProxyIndicator>>,
    targets: Arc<Vec<Target>>,
    realizations: Arc<Vec<Realization>>,
}

impl Snapshot {
    pub fn new(
        indicators: Vec<Indicator>,
        ikus: Vec<Iku>,
        proxies: Vec<ProxyIndicator>,
        targets: Vec<Target>,
        realizations: Vec<Realization>,
    ) -> Result<Self, SnapshotError> {
        ensure_unique("indicator", indicators.iter().map(|r| r.id))?;
        ensure_unique("iku", ikus.iter().map(|r| r.id))?;
        ensure_unique("proxy", proxies.iter().map(|r| r.id))?;
        ensure_unique("target", targets.iter().map(|r| r.id))?;
        ensure_unique("realization", realizations.iter().map(|r| r.id))?;

        Ok(Self {
            indicators: Arc::new(indicators),
            ikus: Arc::new(ikus),
            proxies: Arc::new(proxies),
            targets: Arc::new(targets),
            realizations: Arc::new(realizations),
        })
    }

    /// Decode `{ "indicators": [...], "ikus": [...], "proxies": [...], ... }`; missing sets are empty.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let payload: SnapshotPayload = serde_json::from_str(json)?;
        Self::new(
            payload.indicators,
            payload.ikus,
            payload.proxies,
            payload.targets,
            payload.realizations,
        )
    }

    pub fn from_path(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    pub fn ikus(&self) -> &[Iku] {
        &self.ikus
    }

    pub fn proxies(&self) -> &[ProxyIndicator] {
        &self.proxies
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn realizations(&self) -> &[Realization] {
        &self.realizations
    }

    pub fn replace_indicators(&mut self, indicators: Vec<Indicator>) -> Result<(), SnapshotError> {
        ensure_unique("indicator", indicators.iter().map(|r| r.id))?;
        self.indicators = Arc::new(indicators);
        Ok(())
    }

    pub fn replace_ikus(&mut self, ikus: Vec<Iku>) -> Result<(), SnapshotError> {
        ensure_unique("iku", ikus.iter().map(|r| r.id))?;
        self.ikus = Arc::new(ikus);
        Ok(())
    }

    pub fn replace_proxies(&mut self, proxies: Vec<ProxyIndicator>) -> Result<(), SnapshotError> {
        ensure_unique("proxy", proxies.iter().map(|r| r.id))?;
        self.proxies = Arc::new(proxies);
        Ok(())
    }

    pub fn replace_targets(&mut self, targets: Vec<Target>) -> Result<(), SnapshotError> {
        ensure_unique("target", targets.iter().map(|r| r.id))?;
        self.targets = Arc::new(targets);
        Ok(())
    }

    pub fn replace_realizations(
        &mut self,
        realizations: Vec<Realization>,
    ) -> Result<(), SnapshotError> {
        ensure_unique("realization", realizations.iter().map(|r| r.id))?;
        self.realizations = Arc::new(realizations);
        Ok(())
    }

    /// True when every collection is the very same allocation in both snapshots.
    pub fn same_identity(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.indicators, &other.indicators)
            && Arc::ptr_eq(&self.ikus, &other.ikus)
            && Arc::ptr_eq(&self.proxies, &other.proxies)
            && Arc::ptr_eq(&self.targets, &other.targets)
            && Arc::ptr_eq(&self.realizations, &other.realizations)
    }

    pub fn index(&self) -> SnapshotIndex<'_> {
        SnapshotIndex::build(self)
    }
}

fn ensure_unique(
    collection: &'static str,
    ids: impl Iterator<Item = RecordId>,
) -> Result<(), SnapshotError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(SnapshotError::DuplicateId { collection, id });
        }
    }
    Ok(())
}

/// Id lookups over a snapshot, built once per aggregation pass.
pub struct SnapshotIndex<'a> {
    indicators: HashMap<RecordId, &'a Indicator>,
    ikus: HashMap<RecordId, &'a Iku>,
    proxies: HashMap<RecordId, &'a ProxyIndicator>,
    targets: HashMap<RecordId, &'a Target>,
    indicator_by_iku: HashMap<RecordId, &'a Indicator>,
    indicator_by_proxy: HashMap<RecordId, &'a Indicator>,
    owner_by_indicator: HashMap<RecordId, Owner<'a>>,
}

impl<'a> SnapshotIndex<'a> {
    fn build(snapshot: &'a Snapshot) -> Self {
        let indicators: HashMap<_, _> = snapshot.indicators().iter().map(|i| (i.id, i)).collect();

        let mut indicator_by_iku = HashMap::new();
        let mut indicator_by_proxy = HashMap::new();
        for indicator in snapshot.indicators() {
            if let Some(iku_id) = indicator.iku_id {
                indicator_by_iku.entry(iku_id).or_insert(indicator);
            }
            if let Some(proxy_id) = indicator.proxy_id {
                indicator_by_proxy.entry(proxy_id).or_insert(indicator);
            }
        }

        let mut owner_by_indicator = HashMap::new();
        for iku in snapshot.ikus() {
            let owner = Owner::Iku(iku);
            if let Some(indicator_id) = owner.indicator_id() {
                owner_by_indicator.entry(indicator_id).or_insert(owner);
            }
        }
        for proxy in snapshot.proxies() {
            let owner = Owner::Proxy(proxy);
            if let Some(indicator_id) = owner.indicator_id() {
                owner_by_indicator.entry(indicator_id).or_insert(owner);
            }
        }

        Self {
            indicators,
            ikus: snapshot.ikus().iter().map(|i| (i.id, i)).collect(),
            proxies: snapshot.proxies().iter().map(|p| (p.id, p)).collect(),
            targets: snapshot.targets().iter().map(|t| (t.id, t)).collect(),
            indicator_by_iku,
            indicator_by_proxy,
            owner_by_indicator,
        }
    }

    pub fn indicator(&self, id: RecordId) -> Option<&'a Indicator> {
        self.indicators.get(&id).copied()
    }

    pub fn iku(&self, id: RecordId) -> Option<&'a Iku> {
        self.ikus.get(&id).copied()
    }

    pub fn proxy(&self, id: RecordId) -> Option<&'a ProxyIndicator> {
        self.proxies.get(&id).copied()
    }

    pub fn target(&self, id: RecordId) -> Option<&'a Target> {
        self.targets.get(&id).copied()
    }

    pub fn owner(&self, owner: OwnerRef) -> Option<Owner<'a>> {
        match owner {
            OwnerRef::Iku(id) => self.iku(id).map(Owner::Iku),
            OwnerRef::Proxy(id) => self.proxy(id).map(Owner::Proxy),
        }
    }

    /// Indicator whose embedded back-reference points at the given owner.
    pub fn indicator_by_back_reference(&self, owner: OwnerRef) -> Option<&'a Indicator> {
        match owner {
            OwnerRef::Iku(id) => self.indicator_by_iku.get(&id).copied(),
            OwnerRef::Proxy(id) => self.indicator_by_proxy.get(&id).copied(),
        }
    }

    /// The IKU or Proxy that belongs to an Indicator, either by its `indicator_id` or by the
    /// Indicator's own back-reference.
    pub fn owner_of_indicator(&self, indicator: &Indicator) -> Option<Owner<'a>> {
        self.owner_by_indicator
            .get(&indicator.id)
            .copied()
            .or_else(|| indicator.iku_id.and_then(|id| self.iku(id)).map(Owner::Iku))
            .or_else(|| {
                indicator
                    .proxy_id
                    .and_then(|id| self.proxy(id))
                    .map(Owner::Proxy)
            })
    }
}
