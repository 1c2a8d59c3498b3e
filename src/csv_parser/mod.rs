use csv::{ReaderBuilder, StringRecord};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

use crate::snapshot::models::{
    Indicator, IndicatorKind, Iku, ProxyIndicator, Realization, RecordId, Target, ValueType,
};
use crate::snapshot::numeric::{parse_date, parse_id, parse_numeric, parse_year};
use crate::snapshot::{Snapshot, SnapshotError};

#[derive(Error, Debug)]
pub enum CsvParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Encoding error")]
    Encoding,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

const ID: &[&str] = &["id", "no"];
const NAME: &[&str] = &["name", "nama", "indicator", "indikator", "namaindikator"];
const KIND: &[&str] = &["kind", "type", "jenis"];
const TEAM_ID: &[&str] = &["teamid", "timid"];
const INDICATOR_ID: &[&str] = &["indicatorid", "indikatorid"];
const IKU_ID: &[&str] = &["ikuid"];
const PROXY_ID: &[&str] = &["proxyid"];
const PARENT_IKU_ID: &[&str] = &["parentikuid", "ikuid"];
const TARGET_ID: &[&str] = &["targetid"];
const VALUE_TYPE: &[&str] = &["valuetype", "tipenilai"];
const TARGET_POINTS: &[&str] = &["targetpoints", "targetpoin"];
const TARGET_PERCENTAGE: &[&str] = &["targetpercentage", "targetpersentase"];
const TARGET_ANNUAL: &[&str] = &["targetannual", "targettahunan"];
const PERIOD: &[&str] = &["period", "periode", "triwulan"];
const YEAR: &[&str] = &["year", "tahun"];
const TARGET_VALUE: &[&str] = &["targetvalue", "value", "nilaitarget"];
const SATUAN: &[&str] = &["satuan"];
const PERSENAN_TARGET: &[&str] = &["persenantarget"];
const REALIZATION_VALUE: &[&str] = &["value", "realisasi", "nilai"];
const DUE_DATE: &[&str] = &["duedate", "bataswaktu"];
const OBSTACLE: &[&str] = &["obstacle", "kendala"];
const SOLUTION: &[&str] = &["solution", "solusi"];

/// A decoded CSV export: header row plus data rows.
struct Table {
    headers: StringRecord,
    records: Vec<StringRecord>,
}

impl Table {
    /// Position of the first header matching one of `names`, compared on letters and digits
    /// only, so `Target Annual`, `target_annual` and `targetAnnual` are the same column.
    fn column(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|name| {
            self.headers
                .iter()
                .position(|header| CsvParser::header_key(header) == *name)
        })
    }

    fn require_column(&self, names: &[&str], file_path: &Path) -> Result<usize, CsvParseError> {
        self.column(names).ok_or_else(|| {
            CsvParseError::InvalidFormat(format!(
                "Required column not found in {}: {:?}",
                file_path.display(),
                names
            ))
        })
    }
}

pub struct CsvParser;

impl CsvParser {
    /// Detect the encoding of a file
    pub fn detect_encoding(file_path: &Path) -> Result<&'static Encoding, CsvParseError> {
        let mut file = File::open(file_path)?;
        let mut buffer = vec![0u8; 8192];
        let bytes_read = file.read(&mut buffer)?;

        if let Some((encoding, _)) = Encoding::for_bom(&buffer[..bytes_read]) {
            return Ok(encoding);
        }

        match std::str::from_utf8(&buffer[..bytes_read]) {
            Ok(_) => Ok(UTF_8),
            // Multi-byte sequence cut at the end of the sample.
            Err(err) if err.error_len().is_none() => Ok(UTF_8),
            // Spreadsheet exports on Indonesian Windows installs
            Err(_) => Ok(WINDOWS_1252),
        }
    }

    /// Detect the delimiter used in the CSV file
    pub fn detect_delimiter(content: &str) -> char {
        let first_line = content.lines().next().unwrap_or("");

        let delimiters = [',', '\t', ';', '|'];
        let mut counts: Vec<(char, usize)> = delimiters
            .iter()
            .map(|&d| (d, first_line.matches(d).count()))
            .collect();

        counts.sort_by_key(|&(_, count)| std::cmp::Reverse(count));

        counts.first().map(|&(d, _)| d).unwrap_or(',')
    }

    /// Clean and normalize field values
    pub fn clean_field(field: &str) -> String {
        let trimmed = field.trim().trim_matches('"').trim();

        let mut parts = trimmed.split_whitespace();
        if let Some(first) = parts.next() {
            let mut normalized = String::from(first);
            for part in parts {
                normalized.push(' ');
                normalized.push_str(part);
            }
            normalized
        } else {
            String::new()
        }
    }

    fn header_key(header: &str) -> String {
        header
            .trim_start_matches('\u{feff}')
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    }

    fn read_table(file_path: &Path) -> Result<Table, CsvParseError> {
        let encoding = Self::detect_encoding(file_path)?;

        let file = File::open(file_path)?;
        let mut reader = BufReader::new(file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        let (content, _, had_errors) = encoding.decode(&bytes);
        if had_errors {
            return Err(CsvParseError::Encoding);
        }

        let delimiter = Self::detect_delimiter(&content);

        let mut csv_reader = ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = csv_reader.headers()?.clone();
        let mut records = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            records.push(record);
        }

        tracing::debug!(
            path = %file_path.display(),
            encoding = encoding.name(),
            delimiter = %delimiter,
            rows = records.len(),
            "csv export decoded"
        );

        Ok(Table { headers, records })
    }

    fn get_field_opt(record: &StringRecord, column: Option<usize>) -> Option<String> {
        let value = record.get(column?)?;
        let cleaned = Self::clean_field(value);
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    fn get_id(record: &StringRecord, column: usize, row: usize) -> Result<RecordId, CsvParseError> {
        let raw = record.get(column).unwrap_or_default();
        parse_id(raw).ok_or_else(|| {
            CsvParseError::InvalidFormat(format!("Row {}: invalid id '{}'", row, raw.trim()))
        })
    }

    fn opt_id(record: &StringRecord, column: Option<usize>) -> Option<RecordId> {
        Self::get_field_opt(record, column).and_then(|raw| parse_id(&raw))
    }

    fn opt_number(record: &StringRecord, column: Option<usize>) -> Option<f64> {
        Self::get_field_opt(record, column).and_then(|raw| parse_numeric(&raw))
    }

    fn opt_year(record: &StringRecord, column: Option<usize>) -> Option<i32> {
        Self::get_field_opt(record, column).and_then(|raw| parse_year(&raw))
    }

    fn parse_kind(raw: &str) -> Option<IndicatorKind> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "iku" => Some(IndicatorKind::Iku),
            "proxy" => Some(IndicatorKind::Proxy),
            _ => None,
        }
    }

    fn parse_value_type(raw: Option<String>) -> ValueType {
        match raw.map(|value| value.to_ascii_lowercase()).as_deref() {
            Some("percentage" | "persentase" | "persen" | "%") => ValueType::Percentage,
            _ => ValueType::Points,
        }
    }

    pub fn parse_indicators(file_path: &Path) -> Result<Vec<Indicator>, CsvParseError> {
        let table = Self::read_table(file_path)?;
        let id = table.require_column(ID, file_path)?;
        let name = table.require_column(NAME, file_path)?;
        let kind = table.require_column(KIND, file_path)?;
        let team_id = table.column(TEAM_ID);
        let iku_id = table.column(IKU_ID);
        let proxy_id = table.column(PROXY_ID);

        let mut indicators = Vec::with_capacity(table.records.len());
        for (idx, record) in table.records.iter().enumerate() {
            let row = idx + 2;
            let raw_kind = record.get(kind).unwrap_or_default();
            let Some(parsed_kind) = Self::parse_kind(raw_kind) else {
                tracing::warn!(
                    path = %file_path.display(),
                    row,
                    kind = raw_kind.trim(),
                    "unknown indicator kind, row skipped"
                );
                continue;
            };
            indicators.push(Indicator {
                id: Self::get_id(record, id, row)?,
                name: Self::get_field_opt(record, Some(name)).unwrap_or_default(),
                kind: parsed_kind,
                team_id: Self::opt_id(record, team_id),
                iku_id: Self::opt_id(record, iku_id),
                proxy_id: Self::opt_id(record, proxy_id),
            });
        }
        Ok(indicators)
    }

    pub fn parse_ikus(file_path: &Path) -> Result<Vec<Iku>, CsvParseError> {
        let table = Self::read_table(file_path)?;
        let id = table.require_column(ID, file_path)?;
        let indicator_id = table.column(INDICATOR_ID);
        let value_type = table.column(VALUE_TYPE);
        let target_points = table.column(TARGET_POINTS);
        let target_percentage = table.column(TARGET_PERCENTAGE);
        let target_annual = table.column(TARGET_ANNUAL);

        let mut ikus = Vec::with_capacity(table.records.len());
        for (idx, record) in table.records.iter().enumerate() {
            ikus.push(Iku {
                id: Self::get_id(record, id, idx + 2)?,
                indicator_id: Self::opt_id(record, indicator_id),
                indicator: None,
                value_type: Self::parse_value_type(Self::get_field_opt(record, value_type)),
                target_points: Self::opt_number(record, target_points),
                target_percentage: Self::opt_number(record, target_percentage),
                target_annual: Self::opt_number(record, target_annual),
            });
        }
        Ok(ikus)
    }

    pub fn parse_proxies(file_path: &Path) -> Result<Vec<ProxyIndicator>, CsvParseError> {
        let table = Self::read_table(file_path)?;
        let id = table.require_column(ID, file_path)?;
        let indicator_id = table.column(INDICATOR_ID);
        let parent_iku_id = table.column(PARENT_IKU_ID);
        let target_annual = table.column(TARGET_ANNUAL);
        let target_percentage = table.column(TARGET_PERCENTAGE);

        let mut proxies = Vec::with_capacity(table.records.len());
        for (idx, record) in table.records.iter().enumerate() {
            proxies.push(ProxyIndicator {
                id: Self::get_id(record, id, idx + 2)?,
                indicator_id: Self::opt_id(record, indicator_id),
                indicator: None,
                parent_iku_id: Self::opt_id(record, parent_iku_id),
                target_annual: Self::opt_number(record, target_annual),
                target_percentage: Self::opt_number(record, target_percentage),
            });
        }
        Ok(proxies)
    }

    pub fn parse_targets(file_path: &Path) -> Result<Vec<Target>, CsvParseError> {
        let table = Self::read_table(file_path)?;
        let id = table.require_column(ID, file_path)?;
        let iku_id = table.column(IKU_ID);
        let proxy_id = table.column(PROXY_ID);
        let period = table.column(PERIOD);
        let year = table.column(YEAR);
        let target_value = table.column(TARGET_VALUE);
        let satuan = table.column(SATUAN);
        let persenan_target = table.column(PERSENAN_TARGET);

        let mut targets = Vec::with_capacity(table.records.len());
        for (idx, record) in table.records.iter().enumerate() {
            targets.push(Target {
                id: Self::get_id(record, id, idx + 2)?,
                iku_id: Self::opt_id(record, iku_id),
                proxy_id: Self::opt_id(record, proxy_id),
                iku: None,
                proxy: None,
                period: Self::get_field_opt(record, period),
                year: Self::opt_year(record, year),
                target_value: Self::opt_number(record, target_value),
                satuan: Self::opt_number(record, satuan),
                persenan_target: Self::opt_number(record, persenan_target),
            });
        }
        Ok(targets)
    }

    pub fn parse_realizations(file_path: &Path) -> Result<Vec<Realization>, CsvParseError> {
        let table = Self::read_table(file_path)?;
        let id = table.require_column(ID, file_path)?;
        let iku_id = table.column(IKU_ID);
        let proxy_id = table.column(PROXY_ID);
        let target_id = table.column(TARGET_ID);
        let period = table.column(PERIOD);
        let year = table.column(YEAR);
        let value = table.column(REALIZATION_VALUE);
        let due_date = table.column(DUE_DATE);
        let obstacle = table.column(OBSTACLE);
        let solution = table.column(SOLUTION);

        let mut realizations = Vec::with_capacity(table.records.len());
        for (idx, record) in table.records.iter().enumerate() {
            realizations.push(Realization {
                id: Self::get_id(record, id, idx + 2)?,
                iku_id: Self::opt_id(record, iku_id),
                proxy_id: Self::opt_id(record, proxy_id),
                target_id: Self::opt_id(record, target_id),
                iku: None,
                proxy: None,
                target: None,
                period: Self::get_field_opt(record, period),
                year: Self::opt_year(record, year),
                value: Self::opt_number(record, value),
                due_date: Self::get_field_opt(record, due_date).and_then(|raw| parse_date(&raw)),
                obstacle: Self::get_field_opt(record, obstacle),
                solution: Self::get_field_opt(record, solution),
            });
        }
        Ok(realizations)
    }

    /// Load a snapshot from a directory of exports named `indicators.csv`, `ikus.csv`,
    /// `proxies.csv`, `targets.csv` and `realizations.csv`. Missing files load as empty sets.
    pub fn load_snapshot(dir: &Path) -> Result<Snapshot, CsvParseError> {
        let indicators =
            Self::parse_if_present(&dir.join("indicators.csv"), Self::parse_indicators)?;
        let ikus = Self::parse_if_present(&dir.join("ikus.csv"), Self::parse_ikus)?;
        let proxies = Self::parse_if_present(&dir.join("proxies.csv"), Self::parse_proxies)?;
        let targets = Self::parse_if_present(&dir.join("targets.csv"), Self::parse_targets)?;
        let realizations =
            Self::parse_if_present(&dir.join("realizations.csv"), Self::parse_realizations)?;

        Ok(Snapshot::new(indicators, ikus, proxies, targets, realizations)?)
    }

    fn parse_if_present<T>(
        file_path: &Path,
        parse: fn(&Path) -> Result<Vec<T>, CsvParseError>,
    ) -> Result<Vec<T>, CsvParseError> {
        if file_path.exists() {
            parse(file_path)
        } else {
            tracing::debug!(path = %file_path.display(), "csv export missing, loading empty set");
            Ok(Vec::new())
        }
    }
}
