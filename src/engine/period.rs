use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// One of the four canonical reporting windows (triwulan).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quarter {
    #[serde(rename = "TW1")]
    Tw1,
    #[serde(rename = "TW2")]
    Tw2,
    #[serde(rename = "TW3")]
    Tw3,
    #[serde(rename = "TW4")]
    Tw4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Tw1, Quarter::Tw2, Quarter::Tw3, Quarter::Tw4];

    pub fn from_number(number: u32) -> Option<Quarter> {
        match number {
            1 => Some(Quarter::Tw1),
            2 => Some(Quarter::Tw2),
            3 => Some(Quarter::Tw3),
            4 => Some(Quarter::Tw4),
            _ => None,
        }
    }

    pub fn number(&self) -> u32 {
        match self {
            Quarter::Tw1 => 1,
            Quarter::Tw2 => 2,
            Quarter::Tw3 => 3,
            Quarter::Tw4 => 4,
        }
    }

    pub fn index(&self) -> usize {
        self.number() as usize - 1
    }

    /// Canonical label, as produced by [`normalize`].
    pub fn label(&self) -> &'static str {
        match self {
            Quarter::Tw1 => "TW 1",
            Quarter::Tw2 => "TW 2",
            Quarter::Tw3 => "TW 3",
            Quarter::Tw4 => "TW 4",
        }
    }

    /// Slot key used in aggregated output.
    pub fn key(&self) -> &'static str {
        match self {
            Quarter::Tw1 => "TW1",
            Quarter::Tw2 => "TW2",
            Quarter::Tw3 => "TW3",
            Quarter::Tw4 => "TW4",
        }
    }
}

const PREFIXES: &[&str] = &["TRIWULAN", "TW"];

/// Map a free-text period label onto `"TW <n>"`.
///
/// Blank input gives `""`. Labels that are not recognised come back unchanged so raw
/// listings can still show them; [`quarter_of`] treats them as unmatched.
pub fn normalize(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    if raw.trim().is_empty() {
        return String::new();
    }

    match canonical_number(raw) {
        Some(number) => format!("TW {}", number),
        None => raw.to_string(),
    }
}

/// The canonical quarter for a label, if it names one of TW 1..TW 4.
pub fn quarter_of(raw: Option<&str>) -> Option<Quarter> {
    let raw = raw?;
    canonical_number(raw)
        .and_then(|number| u32::try_from(number).ok())
        .and_then(Quarter::from_number)
}

fn canonical_number(raw: &str) -> Option<u64> {
    let compact: String = raw
        .nfkc()
        .filter(|ch| !ch.is_whitespace() && *ch != '-' && *ch != '.')
        .collect::<String>()
        .to_uppercase();
    if compact.is_empty() {
        return None;
    }

    for prefix in PREFIXES {
        if let Some(rest) = compact.strip_prefix(prefix) {
            if *prefix == "TW" && !rest.is_empty() && rest.chars().all(|ch| ch.is_ascii_digit()) {
                return rest.parse::<u64>().ok();
            }
            return quarter_token(rest);
        }
    }

    quarter_token(&compact)
}

fn quarter_token(token: &str) -> Option<u64> {
    match token {
        "I" | "1" => Some(1),
        "II" | "2" => Some(2),
        "III" | "3" => Some(3),
        "IV" | "4" => Some(4),
        _ => None,
    }
}
