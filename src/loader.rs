use std::io::{BufRead, BufReader};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::DashboardError;
use crate::models::{
    Columns, Record, Table, DATE_COLUMN, PACKAGE_COLUMN, POINT_COLUMN, STATUS_COLUMNS,
};
use crate::status::normalize_status;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl Cell {
    fn as_text(&self) -> Option<String> {
        let text = match self {
            Cell::Empty => return None,
            Cell::Text(value) => value.trim().to_string(),
            Cell::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                format!("{}", *value as i64)
            }
            Cell::Number(value) => value.to_string(),
            Cell::DateTime(value) => value.to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// A sheet as read from disk, before any column is interpreted.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetChoice {
    pub name: String,
    pub fell_back: bool,
}

/// Preferred sheet when the workbook has it, otherwise the first one.
pub fn resolve_sheet(names: &[String], preferred: &str) -> Option<SheetChoice> {
    if names.iter().any(|name| name == preferred) {
        return Some(SheetChoice {
            name: preferred.to_string(),
            fell_back: false,
        });
    }
    names.first().map(|name| SheetChoice {
        name: name.clone(),
        fell_back: true,
    })
}

pub fn load_table(path: &Path, preferred_sheet: &str) -> Result<Table, DashboardError> {
    if !path.is_file() {
        return Err(DashboardError::MissingSource(path.to_path_buf()));
    }

    let sheet = match extension(path).as_deref() {
        Some("csv") => read_csv(path)?,
        Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => read_workbook(path, preferred_sheet)?,
        _ => return Err(DashboardError::UnsupportedFormat(path.to_path_buf())),
    };

    let table = build_table(sheet)?;
    let unrecognized = table
        .records
        .iter()
        .filter(|record| !record.status.is_known())
        .count();
    if unrecognized > 0 {
        tracing::debug!(unrecognized, "statuses outside the label table kept verbatim");
    }
    tracing::info!(
        sheet = %table.sheet,
        records = table.records.len(),
        "loaded {}",
        path.display()
    );
    Ok(table)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn read_workbook(path: &Path, preferred_sheet: &str) -> Result<RawSheet, DashboardError> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();
    let choice = resolve_sheet(&names, preferred_sheet).ok_or(DashboardError::EmptyData)?;

    let (choice, range) = match workbook.worksheet_range(&choice.name) {
        Ok(range) => (choice, range),
        Err(err) if !choice.fell_back && names.first() != Some(&choice.name) => {
            let first = names[0].clone();
            tracing::warn!(
                "could not read sheet '{}' ({}), using first sheet '{}'",
                choice.name,
                err,
                first
            );
            let range = workbook.worksheet_range(&first)?;
            (
                SheetChoice {
                    name: first,
                    fell_back: true,
                },
                range,
            )
        }
        Err(err) => return Err(err.into()),
    };

    if choice.fell_back {
        tracing::info!(
            "sheet '{}' not available, using '{}'",
            preferred_sheet,
            choice.name
        );
    }

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_row.iter().map(header_name).collect(),
        None => Vec::new(),
    };
    let rows = rows
        .map(|row| row.iter().map(cell_from_data).collect::<Vec<_>>())
        .filter(|cells| cells.iter().any(|cell| *cell != Cell::Empty))
        .collect();

    Ok(RawSheet {
        name: choice.name,
        headers,
        rows,
    })
}

fn header_name(data: &Data) -> String {
    data.to_string().trim_start_matches('\u{feff}').trim().to_string()
}

pub fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(value) | Data::DurationIso(value) => Cell::Text(value.clone()),
        Data::DateTimeIso(value) => parse_date_text(value)
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Text(value.clone())),
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Float(value) => Cell::Number(*value),
        Data::Bool(value) => Cell::Text(value.to_string()),
        Data::DateTime(value) => value
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or(Cell::Number(value.as_f64())),
    }
}

fn sniff_delimiter(path: &Path) -> Result<u8, DashboardError> {
    let mut first_line = String::new();
    BufReader::new(std::fs::File::open(path)?).read_line(&mut first_line)?;
    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    Ok(if semicolons > commas { b';' } else { b',' })
}

fn read_csv(path: &Path) -> Result<RawSheet, DashboardError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(path)?)
        .flexible(true)
        .from_path(path)?;

    let headers = reader
        .headers()?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let cells: Vec<Cell> = record
            .iter()
            .map(|value| {
                if value.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(value.to_string())
                }
            })
            .collect();
        if cells.iter().any(|cell| *cell != Cell::Empty) {
            rows.push(cells);
        }
    }

    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("csv")
        .to_string();

    Ok(RawSheet {
        name,
        headers,
        rows,
    })
}

/// Interprets the recognized columns. Only an empty sheet fails here; absent
/// columns are recorded in `Columns` and checked where they are needed.
pub fn build_table(sheet: RawSheet) -> Result<Table, DashboardError> {
    if sheet.rows.is_empty() {
        return Err(DashboardError::EmptyData);
    }

    let position = |name: &str| sheet.headers.iter().position(|header| header == name);
    let status_column = STATUS_COLUMNS
        .iter()
        .find_map(|name| position(name).map(|index| (index, name.to_string())));
    let date_index = position(DATE_COLUMN);
    let point_index = position(POINT_COLUMN);
    let package_index = position(PACKAGE_COLUMN);

    let columns = Columns {
        status: status_column.as_ref().map(|(_, name)| name.clone()),
        has_date: date_index.is_some(),
        has_point: point_index.is_some(),
        has_package: package_index.is_some(),
    };

    let cell_at = |row: &[Cell], index: Option<usize>| -> Cell {
        index
            .and_then(|index| row.get(index))
            .cloned()
            .unwrap_or(Cell::Empty)
    };

    let records = sheet
        .rows
        .iter()
        .map(|row| {
            let row = row.as_slice();
            let status_raw = cell_at(row, status_column.as_ref().map(|(index, _)| *index))
                .as_text()
                .unwrap_or_default();
            Record {
                point_id: parse_point_id(&cell_at(row, point_index)),
                package: cell_at(row, package_index).as_text(),
                route_date: parse_route_date(&cell_at(row, date_index)),
                status: normalize_status(&status_raw),
                status_raw,
            }
        })
        .collect();

    Ok(Table {
        sheet: sheet.name,
        columns,
        records,
    })
}

const DATE_TIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

fn parse_date_text(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Anything that is not a date-time cell or recognizable date text counts as
/// no date.
pub fn parse_route_date(cell: &Cell) -> Option<NaiveDateTime> {
    match cell {
        Cell::DateTime(value) => Some(*value),
        Cell::Text(value) => parse_date_text(value),
        Cell::Number(_) | Cell::Empty => None,
    }
}

pub fn parse_point_id(cell: &Cell) -> Option<i64> {
    let integral = |value: f64| {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
            Some(value as i64)
        } else {
            None
        }
    };
    match cell {
        Cell::Number(value) => integral(*value),
        Cell::Text(value) => {
            let value = value.trim();
            value
                .parse::<i64>()
                .ok()
                .or_else(|| value.parse::<f64>().ok().and_then(integral))
        }
        Cell::DateTime(_) | Cell::Empty => None,
    }
}
