use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::error::DashboardError;

/// What the caller last knew about the source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadState {
    pub last_modified: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadDecision {
    pub should_reload: bool,
    pub show_banner: bool,
    pub state: ReloadState,
}

/// The first observation loads quietly; any later change in modification
/// time reloads and announces it.
pub fn check_reload(previous: Option<SystemTime>, current: SystemTime) -> ReloadDecision {
    let state = ReloadState {
        last_modified: Some(current),
    };
    match previous {
        None => ReloadDecision {
            should_reload: true,
            show_banner: false,
            state,
        },
        Some(previous) if previous != current => ReloadDecision {
            should_reload: true,
            show_banner: true,
            state,
        },
        Some(_) => ReloadDecision {
            should_reload: false,
            show_banner: false,
            state,
        },
    }
}

pub fn modified_time(path: &Path) -> Result<SystemTime, DashboardError> {
    match std::fs::metadata(path) {
        Ok(metadata) => Ok(metadata.modified()?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(DashboardError::MissingSource(path.to_path_buf()))
        }
        Err(err) => Err(err.into()),
    }
}

pub fn banner(file_name: &str, modified: SystemTime, utc_offset_hours: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
        .unwrap_or_else(|| Utc.fix());
    let stamp = DateTime::<Utc>::from(modified).with_timezone(&offset);
    format!(
        "♻ File refreshed automatically: {} • {}",
        file_name,
        stamp.format("%Y-%m-%d %H:%M:%S")
    )
}
