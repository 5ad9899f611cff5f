use std::collections::HashSet;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use serde_json::{Number, Value};
use sheetlink_core::{FailureKind, LinkError, Row};

/// Largest integer an f64 holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSheet {
    pub sheet: String,
    pub sheet_names: Vec<String>,
    pub rows: Vec<Row>,
}

/// Turns workbook bytes into header-keyed rows.
pub trait SheetParser: Send + Sync {
    /// Parses `sheet`, or the first sheet when `None`.
    fn parse(&self, bytes: &[u8], sheet: Option<&str>) -> Result<ParsedSheet, LinkError>;
}

/// xlsx/xlsm/xlsb/xls/ods through calamine, format sniffed from the bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct CalamineSheetParser;

impl SheetParser for CalamineSheetParser {
    fn parse(&self, bytes: &[u8], sheet: Option<&str>) -> Result<ParsedSheet, LinkError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|err| LinkError::new(FailureKind::WorkbookUnreadable, err.to_string()))?;
        let sheet_names = workbook.sheet_names();

        let name = match sheet {
            Some(requested) => find_sheet(&sheet_names, requested).ok_or_else(|| {
                LinkError::new(
                    FailureKind::SheetNotFound {
                        requested: requested.to_string(),
                        available: sheet_names.clone(),
                    },
                    "requested sheet is not in the workbook",
                )
            })?,
            None => sheet_names.first().cloned().ok_or_else(|| {
                LinkError::new(FailureKind::WorkbookUnreadable, "workbook has no sheets")
            })?,
        };

        let range = workbook
            .worksheet_range(&name)
            .map_err(|err| LinkError::new(FailureKind::WorkbookUnreadable, err.to_string()))?;

        Ok(ParsedSheet {
            rows: rows_from_range(&range),
            sheet: name,
            sheet_names,
        })
    }
}

/// Exact name first, then a case-insensitive match.
fn find_sheet(names: &[String], requested: &str) -> Option<String> {
    let requested = requested.trim();
    names
        .iter()
        .find(|name| name.as_str() == requested)
        .or_else(|| names.iter().find(|name| name.eq_ignore_ascii_case(requested)))
        .cloned()
}

/// First row is the header; blank rows are skipped and short rows padded with null.
pub fn rows_from_range(range: &Range<Data>) -> Vec<Row> {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };
    let headers = header_names(header_row);

    rows.filter(|cells| !cells.iter().all(is_blank))
        .map(|cells| {
            headers
                .iter()
                .enumerate()
                .map(|(idx, header)| {
                    let value = cells.get(idx).map(cell_value).unwrap_or(Value::Null);
                    (header.clone(), value)
                })
                .collect()
        })
        .collect()
}

/// Blank headers become `__EMPTY`, repeats get `_1`, `_2`, ... suffixes.
fn header_names(cells: &[Data]) -> Vec<String> {
    let mut used = HashSet::new();
    cells
        .iter()
        .map(|cell| {
            let base = match cell {
                Data::Empty => "__EMPTY".to_string(),
                Data::String(s) if s.trim().is_empty() => "__EMPTY".to_string(),
                other => other.to_string(),
            };
            let mut name = base.clone();
            let mut suffix = 0;
            while used.contains(&name) {
                suffix += 1;
                name = format!("{base}_{suffix}");
            }
            used.insert(name.clone());
            name
        })
        .collect()
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => number(*f),
        Data::DateTime(dt) => number(dt.as_f64()),
        other => Value::String(other.to_string()),
    }
}

/// Integral floats serialize as integers, the way spreadsheets display them.
fn number(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Keeps only `fields`, in that order; missing columns become null.
pub fn project_rows(rows: Vec<Row>, fields: &[String]) -> Vec<Row> {
    if fields.is_empty() {
        return rows;
    }
    rows.into_iter()
        .map(|mut row| {
            fields
                .iter()
                .map(|field| (field.clone(), row.remove(field).unwrap_or(Value::Null)))
                .collect()
        })
        .collect()
}
