use std::path::PathBuf;

use thiserror::Error;

/// Conditions that stop a render pass. Unparseable dates or identifiers are
/// never reported here; they load as `None` and drop out of the affected view.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("source file not found: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("the file has no data to show")]
    EmptyData,

    #[error("the file does not contain the column '{0}'")]
    MissingColumn(String),

    #[error("no points for package '{0}'")]
    NoPointsForPackage(String),

    #[error("unsupported source format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    /// Whether the condition comes from the data itself rather than from
    /// reading it. The CLI shows these as warnings instead of failures.
    pub fn is_data_condition(&self) -> bool {
        matches!(
            self,
            DashboardError::MissingSource(_)
                | DashboardError::EmptyData
                | DashboardError::MissingColumn(_)
                | DashboardError::NoPointsForPackage(_)
        )
    }

    /// The single line shown on stdout for a data condition.
    pub fn warning_line(&self) -> Option<String> {
        self.is_data_condition().then(|| format!("⚠ {}", self))
    }
}
