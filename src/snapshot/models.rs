use super::numeric::{lenient_date, lenient_f64, lenient_id, lenient_year};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type RecordId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    #[serde(rename = "IKU", alias = "iku", alias = "Iku")]
    Iku,
    #[serde(rename = "Proxy", alias = "proxy", alias = "PROXY")]
    Proxy,
}

impl IndicatorKind {
    pub fn label(&self) -> &'static str {
        match self {
            IndicatorKind::Iku => "IKU",
            IndicatorKind::Proxy => "Proxy",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    #[serde(alias = "poin")]
    Points,
    #[serde(alias = "persentase", alias = "persen")]
    Percentage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: RecordId,
    pub name: String,
    #[serde(alias = "type", alias = "jenis")]
    pub kind: IndicatorKind,
    #[serde(default, alias = "teamId", deserialize_with = "lenient_id")]
    pub team_id: Option<RecordId>,
    /// Back-reference to the owned IKU, when the fetch layer embeds it.
    #[serde(default, alias = "ikuId", deserialize_with = "lenient_id")]
    pub iku_id: Option<RecordId>,
    #[serde(default, alias = "proxyId", deserialize_with = "lenient_id")]
    pub proxy_id: Option<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iku {
    pub id: RecordId,
    #[serde(default, alias = "indicatorId", deserialize_with = "lenient_id")]
    pub indicator_id: Option<RecordId>,
    #[serde(default)]
    pub indicator: Option<Indicator>,
    #[serde(default, alias = "valueType", alias = "tipe_nilai")]
    pub value_type: ValueType,
    #[serde(default, alias = "targetPoints", deserialize_with = "lenient_f64")]
    pub target_points: Option<f64>,
    #[serde(default, alias = "targetPercentage", deserialize_with = "lenient_f64")]
    pub target_percentage: Option<f64>,
    #[serde(default, alias = "targetAnnual", alias = "target_tahunan", deserialize_with = "lenient_f64")]
    pub target_annual: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyIndicator {
    pub id: RecordId,
    #[serde(default, alias = "indicatorId", deserialize_with = "lenient_id")]
    pub indicator_id: Option<RecordId>,
    #[serde(default)]
    pub indicator: Option<Indicator>,
    /// Display grouping only; the parent IKU does not own the proxy.
    #[serde(
        default,
        alias = "parentIkuId",
        alias = "iku_id",
        alias = "ikuId",
        deserialize_with = "lenient_id"
    )]
    pub parent_iku_id: Option<RecordId>,
    #[serde(default, alias = "targetAnnual", alias = "target_tahunan", deserialize_with = "lenient_f64")]
    pub target_annual: Option<f64>,
    #[serde(default, alias = "targetPercentage", deserialize_with = "lenient_f64")]
    pub target_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: RecordId,
    #[serde(default, alias = "ikuId", deserialize_with = "lenient_id")]
    pub iku_id: Option<RecordId>,
    #[serde(default, alias = "proxyId", deserialize_with = "lenient_id")]
    pub proxy_id: Option<RecordId>,
    #[serde(default)]
    pub iku: Option<Iku>,
    #[serde(default)]
    pub proxy: Option<ProxyIndicator>,
    #[serde(default, alias = "periode", alias = "triwulan")]
    pub period: Option<String>,
    #[serde(default, alias = "tahun", deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    /// Explicit override; wins over `satuan` and `persenan_target`.
    #[serde(default, alias = "targetValue", alias = "value", deserialize_with = "lenient_f64")]
    pub target_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub satuan: Option<f64>,
    #[serde(default, alias = "persenanTarget", deserialize_with = "lenient_f64")]
    pub persenan_target: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Realization {
    pub id: RecordId,
    #[serde(default, alias = "ikuId", deserialize_with = "lenient_id")]
    pub iku_id: Option<RecordId>,
    #[serde(default, alias = "proxyId", deserialize_with = "lenient_id")]
    pub proxy_id: Option<RecordId>,
    #[serde(default, alias = "targetId", deserialize_with = "lenient_id")]
    pub target_id: Option<RecordId>,
    #[serde(default)]
    pub iku: Option<Iku>,
    #[serde(default)]
    pub proxy: Option<ProxyIndicator>,
    #[serde(default)]
    pub target: Option<Box<Target>>,
    #[serde(default, alias = "periode", alias = "triwulan")]
    pub period: Option<String>,
    #[serde(default, alias = "tahun", deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default, alias = "realisasi", deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
    #[serde(default, alias = "dueDate", alias = "batas_waktu", deserialize_with = "lenient_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, alias = "kendala")]
    pub obstacle: Option<String>,
    #[serde(default, alias = "solusi")]
    pub solution: Option<String>,
}

/// The IKU or Proxy a target/realization belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OwnerRef {
    Iku(RecordId),
    Proxy(RecordId),
}

impl OwnerRef {
    pub fn kind(&self) -> IndicatorKind {
        match self {
            OwnerRef::Iku(_) => IndicatorKind::Iku,
            OwnerRef::Proxy(_) => IndicatorKind::Proxy,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            OwnerRef::Iku(id) | OwnerRef::Proxy(id) => *id,
        }
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind().label(), self.id())
    }
}

/// A borrowed IKU or Proxy record.
#[derive(Debug, Clone, Copy)]
pub enum Owner<'a> {
    Iku(&'a Iku),
    Proxy(&'a ProxyIndicator),
}

impl<'a> Owner<'a> {
    pub fn owner_ref(&self) -> OwnerRef {
        match self {
            Owner::Iku(iku) => OwnerRef::Iku(iku.id),
            Owner::Proxy(proxy) => OwnerRef::Proxy(proxy.id),
        }
    }

    pub fn indicator_id(&self) -> Option<RecordId> {
        match self {
            Owner::Iku(iku) => iku.indicator_id.or(iku.indicator.as_ref().map(|i| i.id)),
            Owner::Proxy(proxy) => proxy.indicator_id.or(proxy.indicator.as_ref().map(|i| i.id)),
        }
    }

    pub fn embedded_indicator(&self) -> Option<&'a Indicator> {
        match self {
            Owner::Iku(iku) => iku.indicator.as_ref(),
            Owner::Proxy(proxy) => proxy.indicator.as_ref(),
        }
    }
}

/// Shared view over the two record types that point at an IKU or Proxy owner.
pub trait OwnedRecord {
    fn record_id(&self) -> RecordId;
    fn explicit_iku_id(&self) -> Option<RecordId>;
    fn explicit_proxy_id(&self) -> Option<RecordId>;
    fn embedded_iku(&self) -> Option<&Iku>;
    fn embedded_proxy(&self) -> Option<&ProxyIndicator>;
    fn period(&self) -> Option<&str>;
    fn year(&self) -> Option<i32>;

    fn target_id(&self) -> Option<RecordId> {
        None
    }

    fn embedded_target(&self) -> Option<&Target> {
        None
    }

    fn iku_id(&self) -> Option<RecordId> {
        self.explicit_iku_id()
            .or_else(|| self.embedded_iku().map(|iku| iku.id))
    }

    fn proxy_id(&self) -> Option<RecordId> {
        self.explicit_proxy_id()
            .or_else(|| self.embedded_proxy().map(|proxy| proxy.id))
    }

    /// IKU wins when both ids are (invalidly) present.
    fn owner(&self) -> Option<OwnerRef> {
        self.iku_id()
            .map(OwnerRef::Iku)
            .or_else(|| self.proxy_id().map(OwnerRef::Proxy))
    }

    fn has_ambiguous_owner(&self) -> bool {
        self.iku_id().is_some() && self.proxy_id().is_some()
    }
}

impl OwnedRecord for Target {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn explicit_iku_id(&self) -> Option<RecordId> {
        self.iku_id
    }

    fn explicit_proxy_id(&self) -> Option<RecordId> {
        self.proxy_id
    }

    fn embedded_iku(&self) -> Option<&Iku> {
        self.iku.as_ref()
    }

    fn embedded_proxy(&self) -> Option<&ProxyIndicator> {
        self.proxy.as_ref()
    }

    fn period(&self) -> Option<&str> {
        self.period.as_deref()
    }

    fn year(&self) -> Option<i32> {
        self.year
    }
}

impl OwnedRecord for Realization {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn explicit_iku_id(&self) -> Option<RecordId> {
        self.iku_id
    }

    fn explicit_proxy_id(&self) -> Option<RecordId> {
        self.proxy_id
    }

    fn embedded_iku(&self) -> Option<&Iku> {
        self.iku.as_ref()
    }

    fn embedded_proxy(&self) -> Option<&ProxyIndicator> {
        self.proxy.as_ref()
    }

    fn period(&self) -> Option<&str> {
        self.period.as_deref()
    }

    fn year(&self) -> Option<i32> {
        self.year
    }

    fn target_id(&self) -> Option<RecordId> {
        self.target_id
            .or_else(|| self.target.as_ref().map(|target| target.id))
    }

    fn embedded_target(&self) -> Option<&Target> {
        self.target.as_deref()
    }
}

impl Realization {
    pub fn has_obstacle(&self) -> bool {
        self.obstacle
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realization_accepts_camel_case_and_string_numbers() {
        let json = r#"{
            "id": 7,
            "ikuId": "3",
            "targetId": null,
            "period": "TW1",
            "year": "2024",
            "value": "85,5",
            "dueDate": "2024-03-31",
            "obstacle": "  "
        }"#;
        let realization: Realization = serde_json::from_str(json).expect("valid realization");

        assert_eq!(realization.iku_id, Some(3));
        assert_eq!(realization.year, Some(2024));
        assert_eq!(realization.value, Some(85.5));
        assert_eq!(realization.due_date, NaiveDate::from_ymd_opt(2024, 3, 31));
        assert!(!realization.has_obstacle());
        assert_eq!(realization.owner(), Some(OwnerRef::Iku(3)));
    }

    #[test]
    fn test_unparsable_numeric_becomes_zero() {
        let json = r#"{ "id": 1, "proxyId": 4, "value": "lebih dari target" }"#;
        let realization: Realization = serde_json::from_str(json).expect("valid realization");
        assert_eq!(realization.value, Some(0.0));
        assert_eq!(realization.owner(), Some(OwnerRef::Proxy(4)));
    }

    #[test]
    fn test_owner_falls_back_to_embedded_record() {
        let json = r#"{
            "id": 2,
            "period": "II",
            "proxy": { "id": 9, "indicatorId": 4 }
        }"#;
        let target: Target = serde_json::from_str(json).expect("valid target");
        assert_eq!(target.owner(), Some(OwnerRef::Proxy(9)));
        assert!(!target.has_ambiguous_owner());
    }

    #[test]
    fn test_indicator_kind_spellings() {
        let iku: IndicatorKind = serde_json::from_str("\"IKU\"").unwrap();
        let proxy: IndicatorKind = serde_json::from_str("\"proxy\"").unwrap();
        assert_eq!(iku, IndicatorKind::Iku);
        assert_eq!(proxy, IndicatorKind::Proxy);
        assert_eq!(OwnerRef::Proxy(5).to_string(), "Proxy #5");
    }
}
