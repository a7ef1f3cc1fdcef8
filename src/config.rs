use std::env;
use std::path::PathBuf;

/// Settings loaded from environment variables. Command-line flags take
/// precedence over these where both exist.
#[derive(Debug, Clone)]
pub struct Config {
    // Source
    pub source_path: PathBuf,
    pub preferred_sheet: String,

    // Watch mode
    pub poll_interval_secs: u64,
    pub utc_offset_hours: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from("Resultado/estado_gestion_todos.xlsx"),
            preferred_sheet: "Detalle".to_string(),
            poll_interval_secs: 5,
            utc_offset_hours: -5,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            source_path: lookup("MIGRATION_DASHBOARD_SOURCE")
                .map(PathBuf::from)
                .unwrap_or(defaults.source_path),
            preferred_sheet: lookup("MIGRATION_DASHBOARD_SHEET")
                .filter(|sheet| !sheet.trim().is_empty())
                .unwrap_or(defaults.preferred_sheet),
            poll_interval_secs: lookup("MIGRATION_DASHBOARD_POLL_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.poll_interval_secs),
            utc_offset_hours: lookup("MIGRATION_DASHBOARD_UTC_OFFSET_HOURS")
                .and_then(|v| v.parse::<i32>().ok())
                .filter(|hours| (-12..=14).contains(hours))
                .unwrap_or(defaults.utc_offset_hours),
        }
    }
}
