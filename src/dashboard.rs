use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate;
use crate::error::DashboardError;
use crate::models::{
    AggregateResult, DailyPivot, DateMode, Record, Table, PACKAGE_COLUMN, STATUS_COLUMNS,
};

pub const ALL_PACKAGES: &str = "Todos";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSelection {
    All,
    Named(String),
}

impl PackageSelection {
    pub fn from_arg(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some(ALL_PACKAGES) | Some("") => PackageSelection::All,
            Some(name) => PackageSelection::Named(name.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PackageSelection::All => ALL_PACKAGES,
            PackageSelection::Named(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffRequest {
    /// `None` picks the latest day present in the data.
    pub day: Option<NaiveDate>,
    pub mode: DateMode,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub package: PackageSelection,
    pub latest_only: bool,
    pub cutoff: Option<CutoffRequest>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CutoffView {
    NoRecords {
        cutoff: NaiveDate,
        mode: DateMode,
    },
    Ready {
        cutoff: NaiveDate,
        mode: DateMode,
        aggregate: AggregateResult,
        pivot: DailyPivot,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "section", rename_all = "snake_case")]
pub enum DateSection {
    /// The sheet has no route date column.
    Unavailable,
    /// The column exists but no row carries a usable date.
    NoDates,
    NotRequested,
    Cutoff(CutoffView),
}

/// Everything one render pass shows, computed from a single table snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub sheet: String,
    pub package: String,
    pub latest_only: bool,
    pub current: AggregateResult,
    pub available_dates: Vec<NaiveDate>,
    pub dates: DateSection,
}

pub fn select_package(
    table: &Table,
    selection: &PackageSelection,
) -> Result<Vec<Record>, DashboardError> {
    if !table.columns.has_package {
        return Err(DashboardError::MissingColumn(PACKAGE_COLUMN.to_string()));
    }

    let records = match selection {
        PackageSelection::All => table.records.clone(),
        PackageSelection::Named(name) => aggregate::filter_by_package(&table.records, name),
    };

    if records.is_empty() {
        return Err(DashboardError::NoPointsForPackage(selection.label().to_string()));
    }
    Ok(records)
}

/// Runs the package view and then the cutoff view. The first halting
/// condition ends the pass.
pub fn render(table: &Table, options: &RenderOptions) -> Result<Dashboard, DashboardError> {
    let records = select_package(table, &options.package)?;

    if table.columns.status.is_none() {
        return Err(DashboardError::MissingColumn(STATUS_COLUMNS.join("' or '")));
    }

    let denominator = aggregate::denominator_for(&table.columns, options.latest_only);
    let current_records = if options.latest_only {
        aggregate::latest_per_point(&records, &table.columns)
    } else {
        records.clone()
    };
    let current = aggregate::aggregate(&current_records, denominator);
    tracing::debug!(
        package = options.package.label(),
        rows = current.rows,
        points = current.total_points,
        "package view computed"
    );

    let available_dates = aggregate::available_dates(&records);
    let dates = if !table.columns.has_date {
        DateSection::Unavailable
    } else if available_dates.is_empty() {
        DateSection::NoDates
    } else {
        match options.cutoff {
            None => DateSection::NotRequested,
            Some(request) => {
                let cutoff = request
                    .day
                    .or_else(|| available_dates.last().copied())
                    .unwrap_or_default();
                DateSection::Cutoff(cutoff_view(table, options, &records, cutoff, request.mode))
            }
        }
    };

    Ok(Dashboard {
        sheet: table.sheet.clone(),
        package: options.package.label().to_string(),
        latest_only: options.latest_only,
        current,
        available_dates,
        dates,
    })
}

fn cutoff_view(
    table: &Table,
    options: &RenderOptions,
    records: &[Record],
    cutoff: NaiveDate,
    mode: DateMode,
) -> CutoffView {
    let in_range = aggregate::filter_by_date(records, cutoff, mode);
    if in_range.is_empty() {
        tracing::info!(%cutoff, ?mode, "no records for cutoff");
        return CutoffView::NoRecords { cutoff, mode };
    }

    let counted = if options.latest_only {
        aggregate::latest_per_point(&in_range, &table.columns)
    } else {
        in_range.clone()
    };

    CutoffView::Ready {
        cutoff,
        mode,
        aggregate: aggregate::aggregate(
            &counted,
            aggregate::denominator_for(&table.columns, options.latest_only),
        ),
        pivot: aggregate::daily_pivot(&in_range),
    }
}
