//! jobprofit CLI - Job profitability from timesheet, rev rec and quote workbooks
//!
//! Command-line interface for loading a workbook, building the fact tables
//! and reporting on margin, quote overruns and data quality.

mod commands;
mod session;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use jobprofit_core::AllocationMode;
use jobprofit_loader::LoadError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "jobprofit")]
#[command(author, version, about = "Job profitability fact tables from workbook exports", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Revenue allocation weight (overrides the config file)
    #[arg(long, value_enum, global = true)]
    alloc: Option<AllocArg>,

    /// Pipeline options file (TOML)
    #[arg(long, value_name = "FILE", global = true, env = "JOBPROFIT_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AllocArg {
    Hours,
    Cost,
}

impl From<AllocArg> for AllocationMode {
    fn from(arg: AllocArg) -> Self {
        match arg {
            AllocArg::Hours => AllocationMode::Hours,
            AllocArg::Cost => AllocationMode::Cost,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which sheet was detected for each role
    Sheets {
        /// Workbook path
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// KPIs, margin trend and the worst job-months
    Report {
        /// Workbook path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Number of loss-making job-months to list
        #[arg(short, default_value_t = 20)]
        n: usize,
    },

    /// Drill into a single job
    Job {
        /// Workbook path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Job number (cleaned the same way as the workbook's)
        #[arg(value_name = "JOB_NO")]
        job_no: String,
    },

    /// Quote vs actual: overruns, unquoted work, accuracy
    Quotes {
        /// Workbook path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Ignore tasks quoted below this many hours
        #[arg(long, default_value_t = 1.0)]
        min_quoted_hours: f64,

        /// Rows per list
        #[arg(short, default_value_t = 25)]
        n: usize,
    },

    /// Data-quality checks and unallocated revenue
    Qa {
        /// Workbook path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Rows shown per check
        #[arg(long, default_value_t = 200)]
        limit: usize,
    },

    /// Export every output table (xlsx, or JSON with --format json)
    Export {
        /// Workbook path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Job-task revenue under hours vs cost allocation
    Compare {
        /// Workbook path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Rows to list, largest difference first
        #[arg(short, default_value_t = 25)]
        n: usize,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = session::Settings {
        config: cli.config,
        alloc: cli.alloc.map(AllocationMode::from),
        format: cli.format,
    };

    let result = match cli.command {
        Commands::Sheets { file } => commands::sheets(&file, &settings),
        Commands::Report { file, n } => commands::report(&file, n, &settings),
        Commands::Job { file, job_no } => commands::job(&file, &job_no, &settings),
        Commands::Quotes {
            file,
            min_quoted_hours,
            n,
        } => commands::quotes(&file, min_quoted_hours, n, &settings),
        Commands::Qa { file, limit } => commands::qa(&file, limit, &settings),
        Commands::Export { file, output } => commands::export(&file, &output, &settings),
        Commands::Compare { file, n } => commands::compare(&file, n, &settings),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(LoadError::MissingTimesheet { sheets }) = err.downcast_ref::<LoadError>() {
                eprintln!("error: {err}");
                eprintln!("Detected sheets: {}", sheets.join(", "));
            } else {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
