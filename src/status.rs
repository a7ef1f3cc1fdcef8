use std::fmt;

use serde::{Serialize, Serializer};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Migration state assigned to a point. Text outside the fixed table is kept
/// verbatim as `Other` so totals always match the number of records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusLabel {
    PendingMigration,
    Readying,
    Migrated,
    MigratedOnTime,
    MigratedOverdue,
    MigratedDateMissing,
    ToReschedule,
    Rescheduled,
    RescheduledPending,
    RescheduledOverdue,
    Overdue,
    StillOnTime,
    EnRoute,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusStyle {
    pub glyph: &'static str,
    pub color: &'static str,
}

const DEFAULT_STYLE: StatusStyle = StatusStyle {
    glyph: "📌",
    color: "gray",
};

pub const KNOWN_LABELS: [StatusLabel; 13] = [
    StatusLabel::PendingMigration,
    StatusLabel::Readying,
    StatusLabel::Migrated,
    StatusLabel::MigratedOnTime,
    StatusLabel::MigratedOverdue,
    StatusLabel::MigratedDateMissing,
    StatusLabel::ToReschedule,
    StatusLabel::Rescheduled,
    StatusLabel::RescheduledPending,
    StatusLabel::RescheduledOverdue,
    StatusLabel::Overdue,
    StatusLabel::StillOnTime,
    StatusLabel::EnRoute,
];

impl StatusLabel {
    /// Name as it appears in the source export.
    pub fn as_str(&self) -> &str {
        match self {
            StatusLabel::PendingMigration => "Pendiente Migrar",
            StatusLabel::Readying => "Alistamiento",
            StatusLabel::Migrated => "Migrado",
            StatusLabel::MigratedOnTime => "Migrado a Tiempo",
            StatusLabel::MigratedOverdue => "Migrado Vencido",
            StatusLabel::MigratedDateMissing => "Migrado (fecha faltante)",
            StatusLabel::ToReschedule => "Por Reprogramar",
            StatusLabel::Rescheduled => "Reprogramado",
            StatusLabel::RescheduledPending => "Reprogramado_Pendiente",
            StatusLabel::RescheduledOverdue => "Reprogramado_vencido",
            StatusLabel::Overdue => "Vencido",
            StatusLabel::StillOnTime => "Aun a tiempo",
            StatusLabel::EnRoute => "En Ruta",
            StatusLabel::Other(raw) => raw,
        }
    }

    pub fn style(&self) -> StatusStyle {
        let (glyph, color) = match self {
            StatusLabel::PendingMigration => ("🛬", "#394ae6"),
            StatusLabel::Readying => ("🛫", "#ffb703"),
            StatusLabel::Migrated | StatusLabel::MigratedOnTime => ("✅", "#00b300"),
            StatusLabel::MigratedOverdue
            | StatusLabel::MigratedDateMissing
            | StatusLabel::RescheduledOverdue => ("⚠️", "#ff8800"),
            StatusLabel::ToReschedule => ("✏️", "#03ffff"),
            StatusLabel::Rescheduled => ("🔁", "#cf88f0"),
            StatusLabel::RescheduledPending => ("⏳", "#cf88f0"),
            StatusLabel::Overdue => ("🔴", "#ff032d"),
            StatusLabel::StillOnTime => ("🕐", "#808080"),
            StatusLabel::EnRoute => ("🚚", "#1e90ff"),
            StatusLabel::Other(_) => return DEFAULT_STYLE,
        };
        StatusStyle { glyph, color }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, StatusLabel::Other(_))
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLabel::Other(raw) if raw.is_empty() => f.write_str("(sin estado)"),
            label => f.write_str(label.as_str()),
        }
    }
}

impl Serialize for StatusLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Upper-cased, accent-free form with `_` read as a space and runs of
/// whitespace collapsed.
fn lookup_key(raw: &str) -> String {
    let stripped: String = raw.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Maps free-text status to a label. Never fails: unmatched text becomes
/// `Other` holding the trimmed original, not the upper-cased lookup key.
pub fn normalize_status(raw: &str) -> StatusLabel {
    let key = lookup_key(raw);
    KNOWN_LABELS
        .iter()
        .find(|label| lookup_key(label.as_str()) == key)
        .cloned()
        .unwrap_or_else(|| StatusLabel::Other(raw.trim().to_string()))
}
