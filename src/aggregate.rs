use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;

use crate::models::{
    AggregateResult, Columns, DailyPivot, DateMode, DayComposition, Denominator, Record,
    StatusCount,
};
use crate::status::StatusLabel;

/// Percentages are taken over distinct points only when each point has been
/// collapsed to its latest record; every other view is normalized by rows.
pub fn denominator_for(columns: &Columns, latest_only: bool) -> Denominator {
    if latest_only && columns.has_point && columns.has_date {
        Denominator::DistinctPoints
    } else {
        Denominator::Rows
    }
}

/// Keeps only the most recent record of each point. Records sort by route
/// date ascending (undated first, file order kept on ties) and the last one
/// per identifier wins. Records without an identifier cannot be matched and
/// are all kept. A no-op unless the sheet has both columns.
pub fn latest_per_point(records: &[Record], columns: &Columns) -> Vec<Record> {
    if !(columns.has_point && columns.has_date) {
        return records.to_vec();
    }

    let mut sorted = records.to_vec();
    sorted.sort_by_key(|record| record.route_date);

    let mut last_seen: HashMap<i64, usize> = HashMap::new();
    for (index, record) in sorted.iter().enumerate() {
        if let Some(point_id) = record.point_id {
            last_seen.insert(point_id, index);
        }
    }

    sorted
        .into_iter()
        .enumerate()
        .filter(|(index, record)| match record.point_id {
            Some(point_id) => last_seen.get(&point_id) == Some(index),
            None => true,
        })
        .map(|(_, record)| record)
        .collect()
}

/// Under `DistinctPoints` only records carrying an identifier are counted,
/// so the per-status counts and the point total cover the same rows. A subset
/// with no identifiers at all falls back to counting rows.
pub fn aggregate(records: &[Record], denominator: Denominator) -> AggregateResult {
    let by_point = denominator == Denominator::DistinctPoints
        && records.iter().any(|record| record.point_id.is_some());
    let counted: Vec<&Record> = records
        .iter()
        .filter(|record| !by_point || record.point_id.is_some())
        .collect();

    let mut counts: HashMap<&StatusLabel, usize> = HashMap::new();
    for record in counted.iter() {
        *counts.entry(&record.status).or_insert(0) += 1;
    }

    let total_points = if by_point {
        counted
            .iter()
            .filter_map(|record| record.point_id)
            .collect::<HashSet<_>>()
            .len()
    } else {
        counted.len()
    };
    let divisor = total_points.max(1) as f64;

    let mut statuses: Vec<StatusCount> = counts
        .into_iter()
        .map(|(label, count)| StatusCount {
            label: label.clone(),
            count,
            percentage: count as f64 / divisor * 100.0,
        })
        .collect();
    statuses.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

    AggregateResult {
        rows: records.len(),
        total_points,
        statuses,
    }
}

/// Undated records never pass either mode.
pub fn filter_by_date(records: &[Record], cutoff: NaiveDate, mode: DateMode) -> Vec<Record> {
    records
        .iter()
        .filter(|record| match (record.route_day(), mode) {
            (Some(day), DateMode::Exact) => day == cutoff,
            (Some(day), DateMode::UpTo) => day <= cutoff,
            (None, _) => false,
        })
        .cloned()
        .collect()
}

/// Share of each status within each day's records. Days without records are
/// absent rather than zero-filled.
pub fn daily_pivot(records: &[Record]) -> DailyPivot {
    let mut by_day: BTreeMap<NaiveDate, HashMap<&StatusLabel, usize>> = BTreeMap::new();
    let mut seen: BTreeSet<&StatusLabel> = BTreeSet::new();

    for record in records {
        let Some(day) = record.route_day() else {
            continue;
        };
        *by_day
            .entry(day)
            .or_default()
            .entry(&record.status)
            .or_insert(0) += 1;
        seen.insert(&record.status);
    }

    let mut labels: Vec<StatusLabel> = seen.into_iter().cloned().collect();
    labels.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    let days = by_day
        .into_iter()
        .map(|(day, counts)| {
            let total: usize = counts.values().sum();
            let divisor = total.max(1) as f64;
            let statuses = labels
                .iter()
                .filter_map(|label| {
                    counts.get(label).map(|&count| StatusCount {
                        label: label.clone(),
                        count,
                        percentage: count as f64 / divisor * 100.0,
                    })
                })
                .collect();
            DayComposition {
                day,
                total,
                statuses,
            }
        })
        .collect();

    DailyPivot { labels, days }
}

pub fn filter_by_package(records: &[Record], package: &str) -> Vec<Record> {
    records
        .iter()
        .filter(|record| record.package.as_deref() == Some(package))
        .cloned()
        .collect()
}

pub fn packages(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| record.package.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn available_dates(records: &[Record]) -> Vec<NaiveDate> {
    records
        .iter()
        .filter_map(Record::route_day)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::normalize_status;
    use proptest::prelude::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(point_id: Option<i64>, status: &str, date: Option<NaiveDate>) -> Record {
        Record {
            point_id,
            package: Some("Paquete 1".to_string()),
            route_date: date.map(|d| d.and_hms_opt(8, 30, 0).unwrap()),
            status_raw: status.to_string(),
            status: normalize_status(status),
        }
    }

    fn full_columns() -> Columns {
        Columns {
            status: Some("Resultado_Evaluacion".to_string()),
            has_date: true,
            has_point: true,
            has_package: true,
        }
    }

    #[test]
    fn latest_status_wins_per_point() {
        let records = vec![
            record(Some(1), "MIGRADO", Some(day(2024, 1, 1))),
            record(Some(1), "VENCIDO", Some(day(2024, 1, 5))),
            record(Some(2), "ALISTAMIENTO", Some(day(2024, 1, 3))),
        ];

        let latest = latest_per_point(&records, &full_columns());
        let result = aggregate(&latest, Denominator::DistinctPoints);

        assert_eq!(result.count(&StatusLabel::Migrated), 0);
        assert_eq!(result.count(&StatusLabel::Overdue), 1);
        assert_eq!(result.count(&StatusLabel::Readying), 1);
        assert_eq!(result.total_points, 2);
        assert!((result.percentage(&StatusLabel::Overdue) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn collapse_is_skipped_without_a_date_column() {
        let records = vec![
            record(Some(1), "MIGRADO", None),
            record(Some(1), "VENCIDO", None),
        ];
        let columns = Columns {
            has_date: false,
            ..full_columns()
        };
        assert_eq!(latest_per_point(&records, &columns), records);
    }

    #[test]
    fn later_row_wins_on_same_date() {
        let records = vec![
            record(Some(7), "ALISTAMIENTO", Some(day(2024, 2, 1))),
            record(Some(7), "MIGRADO", Some(day(2024, 2, 1))),
        ];
        let latest = latest_per_point(&records, &full_columns());
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].status, StatusLabel::Migrated);
    }

    #[test]
    fn dated_observation_beats_undated_one() {
        let records = vec![
            record(Some(3), "MIGRADO", Some(day(2024, 3, 1))),
            record(Some(3), "VENCIDO", None),
        ];
        let latest = latest_per_point(&records, &full_columns());
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].status, StatusLabel::Migrated);
    }

    #[test]
    fn unknown_status_counts_as_its_own_label() {
        let records = vec![
            record(Some(1), "Desistido", None),
            record(Some(2), "Desistido", None),
            record(Some(3), "MIGRADO", None),
        ];
        let result = aggregate(&records, Denominator::DistinctPoints);

        assert_eq!(result.statuses.len(), 2);
        assert_eq!(
            result.count(&StatusLabel::Other("Desistido".to_string())),
            2
        );
        assert_eq!(result.count(&StatusLabel::Migrated), 1);
        assert_eq!(result.statuses[0].label.as_str(), "Desistido");
    }

    #[test]
    fn empty_subset_yields_empty_result() {
        let result = aggregate(&[], Denominator::DistinctPoints);
        assert!(result.is_empty());
        assert!(result.statuses.is_empty());
        assert_eq!(result.total_points, 0);
    }

    #[test]
    fn subset_without_identifiers_counts_rows() {
        let records = vec![record(None, "MIGRADO", None)];
        let result = aggregate(&records, Denominator::DistinctPoints);
        assert_eq!(result.total_points, 1);
        assert!((result.statuses[0].percentage - 100.0).abs() < 1e-9);
    }

    #[test]
    fn unidentified_rows_stay_out_of_point_shares() {
        let records = vec![
            record(None, "MIGRADO", Some(day(2024, 1, 1))),
            record(None, "VENCIDO", Some(day(2024, 1, 2))),
            record(Some(1), "MIGRADO", Some(day(2024, 1, 3))),
        ];

        let latest = latest_per_point(&records, &full_columns());
        let result = aggregate(&latest, Denominator::DistinctPoints);

        assert_eq!(result.rows, 3);
        assert_eq!(result.total_points, 1);
        assert_eq!(result.count(&StatusLabel::Migrated), 1);
        assert_eq!(result.count(&StatusLabel::Overdue), 0);
        let sum: f64 = result.statuses.iter().map(|s| s.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn point_shares_only_follow_a_collapse() {
        let columns = full_columns();
        assert_eq!(denominator_for(&columns, true), Denominator::DistinctPoints);
        assert_eq!(denominator_for(&columns, false), Denominator::Rows);

        let dateless = Columns {
            has_date: false,
            ..full_columns()
        };
        assert_eq!(denominator_for(&dateless, true), Denominator::Rows);
    }

    #[test]
    fn row_denominator_counts_every_record() {
        let records = vec![
            record(Some(1), "MIGRADO", None),
            record(Some(1), "VENCIDO", None),
            record(Some(1), "VENCIDO", None),
            record(Some(1), "VENCIDO", None),
        ];
        let result = aggregate(&records, Denominator::Rows);
        assert_eq!(result.total_points, 4);
        assert!((result.percentage(&StatusLabel::Overdue) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn date_filters_truncate_to_the_day() {
        let records = vec![
            record(Some(1), "MIGRADO", Some(day(2024, 1, 1))),
            record(Some(2), "VENCIDO", Some(day(2024, 1, 2))),
            record(Some(3), "VENCIDO", Some(day(2024, 1, 3))),
            record(Some(4), "VENCIDO", None),
        ];

        let exact = filter_by_date(&records, day(2024, 1, 2), DateMode::Exact);
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].point_id, Some(2));

        let up_to = filter_by_date(&records, day(2024, 1, 2), DateMode::UpTo);
        let ids: Vec<_> = up_to.iter().map(|r| r.point_id).collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);

        assert!(filter_by_date(&records, day(2023, 12, 31), DateMode::UpTo).is_empty());
    }

    #[test]
    fn pivot_splits_a_day_by_status() {
        let d = day(2024, 5, 10);
        let records = vec![
            record(Some(1), "MIGRADO", Some(d)),
            record(Some(2), "MIGRADO", Some(d)),
            record(Some(3), "MIGRADO", Some(d)),
            record(Some(4), "VENCIDO", Some(d)),
        ];

        let pivot = daily_pivot(&records);
        assert_eq!(pivot.days.len(), 1);
        let composition = &pivot.days[0];
        assert_eq!(composition.total, 4);
        assert!((composition.percentage(&StatusLabel::Migrated) - 75.0).abs() < 1e-9);
        assert!((composition.percentage(&StatusLabel::Overdue) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn pivot_has_no_zero_filled_days() {
        let records = vec![
            record(Some(1), "MIGRADO", Some(day(2024, 5, 1))),
            record(Some(2), "VENCIDO", Some(day(2024, 5, 4))),
            record(Some(3), "VENCIDO", None),
        ];
        let pivot = daily_pivot(&records);
        let days: Vec<_> = pivot.days.iter().map(|c| c.day).collect();
        assert_eq!(days, vec![day(2024, 5, 1), day(2024, 5, 4)]);
        assert_eq!(pivot.labels, vec![StatusLabel::Migrated, StatusLabel::Overdue]);
        assert_eq!(pivot.days[0].statuses.len(), 1);
    }

    #[test]
    fn lists_packages_and_days() {
        let mut second = record(Some(2), "MIGRADO", Some(day(2024, 1, 9)));
        second.package = Some("Paquete 0".to_string());
        let mut blank = record(Some(3), "MIGRADO", None);
        blank.package = None;
        let records = vec![
            record(Some(1), "MIGRADO", Some(day(2024, 1, 9))),
            second,
            blank,
            record(Some(4), "MIGRADO", Some(day(2024, 1, 2))),
        ];

        assert_eq!(packages(&records), vec!["Paquete 0", "Paquete 1"]);
        assert_eq!(
            available_dates(&records),
            vec![day(2024, 1, 2), day(2024, 1, 9)]
        );
        assert_eq!(filter_by_package(&records, "Paquete 0").len(), 1);
    }

    const STATUSES: [&str; 5] = ["MIGRADO", "VENCIDO", "ALISTAMIENTO", "Desistido", "en ruta"];

    fn arb_records() -> impl Strategy<Value = Vec<Record>> {
        let row = (
            prop::option::of(1i64..8),
            prop::option::of(0u32..20),
            0usize..5,
        );
        prop::collection::vec(row, 1..40).prop_map(
            |rows| {
                rows.into_iter()
                    .map(|(id, offset, status)| {
                        record(
                            id,
                            STATUSES[status],
                            offset.map(|o| day(2024, 1, 1) + chrono::Duration::days(o as i64)),
                        )
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn current_status_percentages_sum_to_100(records in arb_records()) {
            let latest = latest_per_point(&records, &full_columns());
            let result = aggregate(&latest, Denominator::DistinctPoints);
            let sum: f64 = result.statuses.iter().map(|s| s.rounded_percentage()).sum();
            prop_assert!(!result.statuses.is_empty());
            prop_assert!((99.5..=100.5).contains(&sum));
            let exact: f64 = result.statuses.iter().map(|s| s.percentage).sum();
            prop_assert!((exact - 100.0).abs() < 1e-6);
        }

        #[test]
        fn full_history_percentages_sum_to_100(records in arb_records()) {
            let result = aggregate(&records, denominator_for(&full_columns(), false));
            prop_assert_eq!(result.total_points, records.len());
            let exact: f64 = result.statuses.iter().map(|s| s.percentage).sum();
            prop_assert!((exact - 100.0).abs() < 1e-6);
        }

        #[test]
        fn latest_per_point_is_idempotent(records in arb_records()) {
            let once = latest_per_point(&records, &full_columns());
            let twice = latest_per_point(&once, &full_columns());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn exact_day_is_within_up_to(records in arb_records(), offset in 0u32..20) {
            let cutoff = day(2024, 1, 1) + chrono::Duration::days(offset as i64);
            let exact = filter_by_date(&records, cutoff, DateMode::Exact);
            let up_to = filter_by_date(&records, cutoff, DateMode::UpTo);
            for record in &exact {
                prop_assert!(up_to.contains(record));
            }
        }

        #[test]
        fn each_pivot_day_sums_to_100(records in arb_records()) {
            for composition in daily_pivot(&records).days {
                let sum: f64 = composition.statuses.iter().map(|s| s.percentage).sum();
                prop_assert!((sum - 100.0).abs() < 1e-6);
            }
        }
    }
}
