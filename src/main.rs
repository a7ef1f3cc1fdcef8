use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use migration_status_dashboard::config::Config;
use migration_status_dashboard::dashboard::{
    self, CutoffRequest, PackageSelection, RenderOptions, ALL_PACKAGES,
};
use migration_status_dashboard::error::DashboardError;
use migration_status_dashboard::models::{DateMode, Table, PACKAGE_COLUMN};
use migration_status_dashboard::{aggregate, loader, refresh, report};

#[derive(Parser)]
#[command(name = "migration-dashboard")]
#[command(about = "Migration status dashboard for logistics delivery points", long_about = None)]
struct Cli {
    /// Spreadsheet export to read (.xlsx, .xls, .ods or .csv)
    #[arg(long, global = true)]
    source: Option<PathBuf>,
    /// Sheet to prefer; the first sheet is used when it is missing
    #[arg(long, global = true)]
    sheet: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Scope {
    /// Logistics package, or "Todos" for all of them
    #[arg(long)]
    package: Option<String>,
    /// Count every historical row instead of each point's latest status
    #[arg(long)]
    all_history: bool,
}

impl Scope {
    fn options(&self, cutoff: Option<CutoffRequest>) -> RenderOptions {
        RenderOptions {
            package: PackageSelection::from_arg(self.package.as_deref()),
            latest_only: !self.all_history,
            cutoff,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the logistics packages in the export
    Packages,
    /// List the route days available as cutoffs
    Dates {
        #[arg(long)]
        package: Option<String>,
    },
    /// Show the status distribution of a package
    Summary {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        json: bool,
    },
    /// Show the status distribution up to or on a cutoff day
    ByDate {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        cutoff: NaiveDate,
        #[arg(long, value_enum, default_value_t = DateMode::Exact)]
        mode: DateMode,
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown report
    Report {
        #[command(flatten)]
        scope: Scope,
        /// Defaults to the latest route day in the export
        #[arg(long)]
        cutoff: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = DateMode::UpTo)]
        mode: DateMode,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Re-render the summary whenever the export changes on disk
    Watch {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "migration_status_dashboard=info,migration_dashboard=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(source) = cli.source {
        config.source_path = source;
    }
    if let Some(sheet) = cli.sheet {
        config.preferred_sheet = sheet;
    }

    match run(cli.command, &config) {
        Ok(()) => Ok(()),
        Err(err) => match err.warning_line() {
            Some(line) => {
                println!("{}", line);
                Ok(())
            }
            None => Err(err)
                .with_context(|| format!("failed to process {}", config.source_path.display())),
        },
    }
}

fn load(config: &Config) -> Result<Table, DashboardError> {
    loader::load_table(&config.source_path, &config.preferred_sheet)
}

fn run(command: Commands, config: &Config) -> Result<(), DashboardError> {
    match command {
        Commands::Packages => {
            let table = load(config)?;
            if !table.columns.has_package {
                return Err(DashboardError::MissingColumn(PACKAGE_COLUMN.to_string()));
            }
            println!("{}", ALL_PACKAGES);
            for package in aggregate::packages(&table.records) {
                println!("{}", package);
            }
        }
        Commands::Dates { package } => {
            let table = load(config)?;
            let records =
                dashboard::select_package(&table, &PackageSelection::from_arg(package.as_deref()))?;
            if !table.columns.has_date {
                println!("This file has no 'fecha_ruta' column.");
                return Ok(());
            }
            let dates = aggregate::available_dates(&records);
            if dates.is_empty() {
                println!("No dates available in 'fecha_ruta' for this file.");
            }
            for day in dates {
                println!("{}", report::display_day(day));
            }
        }
        Commands::Summary { scope, json } => {
            let table = load(config)?;
            let view = dashboard::render(&table, &scope.options(None))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", report::build_report(&view, None));
            }
        }
        Commands::ByDate {
            scope,
            cutoff,
            mode,
            json,
        } => {
            let table = load(config)?;
            let request = CutoffRequest {
                day: Some(cutoff),
                mode,
            };
            let view = dashboard::render(&table, &scope.options(Some(request)))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", report::build_report(&view, None));
            }
        }
        Commands::Report {
            scope,
            cutoff,
            mode,
            out,
        } => {
            let table = load(config)?;
            let request = CutoffRequest { day: cutoff, mode };
            let view = dashboard::render(&table, &scope.options(Some(request)))?;
            std::fs::write(&out, report::build_report(&view, None))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Watch {
            scope,
            interval_secs,
        } => {
            let interval = interval_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(config.poll_interval_secs);
            watch(config, &scope, Duration::from_secs(interval))?;
        }
    }

    Ok(())
}

/// Polls the export's modification time and re-renders on change. Only I/O
/// failures other than a missing file end the loop.
fn watch(config: &Config, scope: &Scope, interval: Duration) -> Result<(), DashboardError> {
    let source: &Path = &config.source_path;
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut state = refresh::ReloadState::default();
    let mut missing_reported = false;

    tracing::info!(
        "watching {} every {}s",
        source.display(),
        interval.as_secs()
    );

    loop {
        match refresh::modified_time(source) {
            Ok(modified) => {
                missing_reported = false;
                let decision = refresh::check_reload(state.last_modified, modified);
                state = decision.state;

                if decision.should_reload {
                    let banner = decision
                        .show_banner
                        .then(|| refresh::banner(&file_name, modified, config.utc_offset_hours));
                    let rendered = load(config)
                        .and_then(|table| dashboard::render(&table, &scope.options(None)));
                    match rendered {
                        Ok(view) => print!("{}", report::build_report(&view, banner.as_deref())),
                        Err(err) => {
                            tracing::debug!("render skipped: {}", err);
                            let line = err.warning_line();
                            println!("{}", line.unwrap_or_else(|| format!("⚠ {}", err)));
                        }
                    }
                }
            }
            Err(err) if err.is_data_condition() => {
                if !missing_reported {
                    println!("{}", err.warning_line().unwrap_or_default());
                    missing_reported = true;
                }
                state = refresh::ReloadState::default();
            }
            Err(err) => return Err(err),
        }

        std::thread::sleep(interval);
    }
}
