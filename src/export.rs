use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::path::Path;
use thiserror::Error;

use crate::engine::aggregator::{AggregationReport, OrderedGroup};
use crate::engine::period::Quarter;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
}

/// A table row with its nesting depth (0 for top-level rows).
struct ExportRow<'a> {
    depth: usize,
    group: &'a OrderedGroup,
}

fn collect_rows<'a>(groups: &'a [OrderedGroup], depth: usize, rows: &mut Vec<ExportRow<'a>>) {
    for group in groups {
        rows.push(ExportRow { depth, group });
        collect_rows(&group.children, depth + 1, rows);
    }
}

fn headers() -> Vec<String> {
    let mut headers = vec!["Indicator".to_string(), "Kind".to_string()];
    for quarter in Quarter::ALL {
        headers.push(format!("{} Target", quarter.label()));
        headers.push(format!("{} Value", quarter.label()));
        headers.push(format!("{} Progress (%)", quarter.label()));
    }
    headers.extend([
        "Annual Target".to_string(),
        "Achievement (%)".to_string(),
        "Status".to_string(),
        "Has Issues".to_string(),
    ]);
    headers
}

fn format_number(value: Option<f64>) -> String {
    value.map(|val| format!("{:.2}", val)).unwrap_or_default()
}

/// Write the aggregated table as `csv` or `xlsx`.
pub fn export_report(
    report: &AggregationReport,
    format: &str,
    file_path: &Path,
) -> Result<(), ExportError> {
    let mut rows = Vec::new();
    collect_rows(&report.groups, 0, &mut rows);

    match format.to_ascii_lowercase().as_str() {
        "csv" => export_csv(&rows, file_path)?,
        "xlsx" => export_xlsx(&rows, file_path)?,
        other => return Err(ExportError::UnsupportedFormat(other.to_string())),
    }

    tracing::info!(
        path = %file_path.display(),
        format,
        rows = rows.len(),
        "report exported"
    );
    Ok(())
}

fn export_csv(rows: &[ExportRow<'_>], file_path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(file_path)?;
    writer.write_record(headers())?;

    for row in rows {
        let group = row.group;
        let mut record = vec![
            format!("{}{}", "  ".repeat(row.depth), group.indicator.name()),
            group.indicator.kind().label().to_string(),
        ];
        for quarter in Quarter::ALL {
            let slot = group.quarter_slots.get(quarter);
            record.push(format_number(slot.target));
            record.push(format_number(slot.value));
            record.push(format_number(slot.value.map(|_| slot.progress)));
        }
        record.extend([
            format!("{:.2}", group.annual.target),
            format!("{:.2}", group.annual.achievement),
            group.annual.status.as_str().to_string(),
            if group.annual.has_issues { "yes" } else { "no" }.to_string(),
        ]);
        writer.write_record(record)?;
    }

    writer.flush()?;
    Ok(())
}

fn export_xlsx(rows: &[ExportRow<'_>], file_path: &Path) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let header_format = Format::new().set_bold().set_background_color(0xDDDDDD);
    let number_format = Format::new().set_num_format("0.00");

    for (col, header) in headers().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let group = row.group;
        let sheet_row = idx as u32 + 1;
        let mut col: u16 = 0;

        let indent = u8::try_from(row.depth).unwrap_or(u8::MAX);
        let name_format = Format::new().set_indent(indent);
        worksheet.write_string_with_format(sheet_row, col, group.indicator.name(), &name_format)?;
        col += 1;
        worksheet.write_string(sheet_row, col, group.indicator.kind().label())?;
        col += 1;

        for quarter in Quarter::ALL {
            let slot = group.quarter_slots.get(quarter);
            for cell in [slot.target, slot.value, slot.value.map(|_| slot.progress)] {
                if let Some(value) = cell {
                    worksheet.write_number_with_format(sheet_row, col, value, &number_format)?;
                }
                col += 1;
            }
        }

        worksheet.write_number_with_format(sheet_row, col, group.annual.target, &number_format)?;
        col += 1;
        worksheet.write_number_with_format(
            sheet_row,
            col,
            group.annual.achievement,
            &number_format,
        )?;
        col += 1;
        worksheet.write_string(sheet_row, col, group.annual.status.as_str())?;
        col += 1;
        worksheet.write_boolean(sheet_row, col, group.annual.has_issues)?;
    }

    worksheet.set_column_width(0, 40)?;
    workbook.save(file_path)?;
    Ok(())
}
