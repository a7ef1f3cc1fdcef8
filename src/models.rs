use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::status::StatusLabel;

pub const STATUS_COLUMNS: [&str; 2] = ["Resultado_Evaluacion", "Estado_Migracion_Texto"];
pub const DATE_COLUMN: &str = "fecha_ruta";
pub const POINT_COLUMN: &str = "Codigo_Punto";
pub const PACKAGE_COLUMN: &str = "paquetes_logisticos";

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub point_id: Option<i64>,
    pub package: Option<String>,
    pub route_date: Option<NaiveDateTime>,
    pub status_raw: String,
    pub status: StatusLabel,
}

impl Record {
    pub fn route_day(&self) -> Option<NaiveDate> {
        self.route_date.map(|value| value.date())
    }
}

/// Which recognized columns the loaded sheet actually carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns {
    pub status: Option<String>,
    pub has_date: bool,
    pub has_point: bool,
    pub has_package: bool,
}

/// One loaded snapshot of the source file. Replaced wholesale on reload.
#[derive(Debug, Clone)]
pub struct Table {
    pub sheet: String,
    pub columns: Columns,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DateMode {
    /// Only the selected day
    Exact,
    /// The selected day and every earlier one
    UpTo,
}

/// How percentages are normalized in an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denominator {
    DistinctPoints,
    Rows,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub label: StatusLabel,
    pub count: usize,
    pub percentage: f64,
}

impl StatusCount {
    pub fn rounded_percentage(&self) -> f64 {
        round_one_decimal(self.percentage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub rows: usize,
    pub total_points: usize,
    pub statuses: Vec<StatusCount>,
}

impl AggregateResult {
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn count(&self, label: &StatusLabel) -> usize {
        self.statuses
            .iter()
            .find(|status| &status.label == label)
            .map(|status| status.count)
            .unwrap_or(0)
    }

    pub fn percentage(&self, label: &StatusLabel) -> f64 {
        self.statuses
            .iter()
            .find(|status| &status.label == label)
            .map(|status| status.percentage)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayComposition {
    pub day: NaiveDate,
    pub total: usize,
    pub statuses: Vec<StatusCount>,
}

impl DayComposition {
    pub fn percentage(&self, label: &StatusLabel) -> f64 {
        self.statuses
            .iter()
            .find(|status| &status.label == label)
            .map(|status| status.percentage)
            .unwrap_or(0.0)
    }
}

/// Per-day status shares, days in ascending order. `labels` lists every status
/// seen on any day, which is the series order for a stacked chart.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DailyPivot {
    pub labels: Vec<StatusLabel>,
    pub days: Vec<DayComposition>,
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
