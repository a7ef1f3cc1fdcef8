use std::fmt::Write;

use chrono::NaiveDate;

use crate::dashboard::{CutoffView, Dashboard, DateSection};
use crate::models::{AggregateResult, DailyPivot, DateMode};

pub fn display_day(day: NaiveDate) -> String {
    day.format("%d/%m/%Y").to_string()
}

fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn mode_label(mode: DateMode) -> &'static str {
    match mode {
        DateMode::Exact => "selected day only",
        DateMode::UpTo => "selected day and earlier",
    }
}

fn write_status_lines(output: &mut String, result: &AggregateResult) {
    for status in result.statuses.iter() {
        let style = status.label.style();
        let _ = writeln!(
            output,
            "- {} **{}**: {} points ({:.1}%)",
            style.glyph,
            status.label,
            group_thousands(status.count),
            status.rounded_percentage()
        );
    }
}

pub fn write_pivot(output: &mut String, pivot: &DailyPivot) {
    let _ = write!(output, "| Day |");
    for label in pivot.labels.iter() {
        let _ = write!(output, " {} |", label);
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "|---|{}", "---|".repeat(pivot.labels.len()));

    for composition in pivot.days.iter() {
        let _ = write!(output, "| {} |", display_day(composition.day));
        for label in pivot.labels.iter() {
            let _ = write!(output, " {:.1}% |", composition.percentage(label));
        }
        let _ = writeln!(output);
    }
}

pub fn build_report(dashboard: &Dashboard, banner: Option<&str>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Migration Status");
    let _ = writeln!(
        output,
        "Package: {} (sheet '{}')",
        dashboard.package, dashboard.sheet
    );
    if let Some(banner) = banner {
        let _ = writeln!(output, "{}", banner);
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Current Status");
    let _ = writeln!(
        output,
        "Total points in package: {}",
        group_thousands(dashboard.current.total_points)
    );
    if !dashboard.latest_only {
        let _ = writeln!(output, "Counting every historical row.");
    }
    write_status_lines(&mut output, &dashboard.current);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Status by Date");

    match &dashboard.dates {
        DateSection::Unavailable => {
            let _ = writeln!(
                output,
                "This file has no 'fecha_ruta' column. Only the overall distribution is shown."
            );
        }
        DateSection::NoDates => {
            let _ = writeln!(output, "No dates available in 'fecha_ruta' for this file.");
        }
        DateSection::NotRequested => {
            let first = dashboard.available_dates.first().copied();
            let last = dashboard.available_dates.last().copied();
            if let (Some(first), Some(last)) = (first, last) {
                let _ = writeln!(
                    output,
                    "{} route days available, {} to {}.",
                    dashboard.available_dates.len(),
                    display_day(first),
                    display_day(last)
                );
            }
        }
        DateSection::Cutoff(CutoffView::NoRecords { cutoff, mode }) => {
            let _ = writeln!(
                output,
                "Cutoff {} ({}): no points scheduled for that criterion.",
                display_day(*cutoff),
                mode_label(*mode)
            );
        }
        DateSection::Cutoff(CutoffView::Ready {
            cutoff,
            mode,
            aggregate,
            pivot,
        }) => {
            let _ = writeln!(
                output,
                "Cutoff {} ({})",
                display_day(*cutoff),
                mode_label(*mode)
            );
            let _ = writeln!(
                output,
                "Total points to date: {}",
                group_thousands(aggregate.total_points)
            );
            write_status_lines(&mut output, aggregate);
            let _ = writeln!(output);
            let _ = writeln!(output, "### Daily Composition");
            write_pivot(&mut output, pivot);
        }
    }

    output
}
