//! Command-line entry point.
//!
//! Settings come from the environment and an optional `.env` file; every
//! flag below overrides its variable.

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{error, info};

use marc_items_csv::logging::{init_logging, LogConfig, LogFormat};
use marc_items_csv::{export, ConfigOverrides, ExportConfig, RecoveryMode};

#[derive(Parser)]
#[command(name = "marc-items-csv")]
#[command(version)]
#[command(about = "Export MARC item fields to a Koha-mapped CSV")]
struct Cli {
    /// MARC records file (ISO 2709, optionally gzipped) [env: RECORDS_FILE]
    #[arg(long, value_name = "PATH")]
    records: Option<PathBuf>,

    /// Koha MARC framework CSV export [env: KOHA_MARC_FRAMEWORK_FILE]
    #[arg(long, value_name = "PATH")]
    framework: Option<PathBuf>,

    /// Item CSV to write [env: OUTPUT_FILE]
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Error CSV to write [env: ERRORS_FILE]
    #[arg(short, long, value_name = "PATH")]
    errors: Option<PathBuf>,

    /// Item field tag, e.g. 952 or 995 [env: ITEM_FIELD_TAG]
    #[arg(short, long, value_name = "TAG")]
    tag: Option<String>,

    /// Add a <tag>$$<code> column per unmapped subfield [env: INCLUDE_UNMAPPED_FIELDS=1]
    #[arg(long, action = ArgAction::SetTrue)]
    include_unmapped: bool,

    /// How malformed records are decoded [env: RECOVERY_MODE]
    #[arg(long, value_enum)]
    recovery: Option<RecoveryArg>,

    /// Environment file to load before reading variables
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatArg,

    /// Prefix log lines with a timestamp
    #[arg(long)]
    timestamps: bool,

    /// Disable colored log output
    #[arg(long)]
    no_color: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum RecoveryArg {
    Strict,
    Lenient,
}

impl From<RecoveryArg> for RecoveryMode {
    fn from(arg: RecoveryArg) -> Self {
        match arg {
            RecoveryArg::Strict => RecoveryMode::Strict,
            RecoveryArg::Lenient => RecoveryMode::Lenient,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            records_file: self.records.clone(),
            framework_file: self.framework.clone(),
            output_file: self.output.clone(),
            errors_file: self.errors.clone(),
            item_field_tag: self.tag.clone(),
            // Absent flag leaves INCLUDE_UNMAPPED_FIELDS in charge.
            include_unmapped_fields: self.include_unmapped.then_some(true),
            recovery_mode: self.recovery.map(RecoveryMode::from),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("cannot load {}", path.display()))?;
        },
        None => {
            dotenvy::dotenv().ok();
        },
    }

    let log_config = LogConfig::from_verbosity(cli.verbose, cli.quiet)
        .with_format(cli.log_format.into())
        .with_timestamps(cli.timestamps)
        .with_ansi(!cli.no_color);
    init_logging(&log_config).context("cannot initialise logging")?;

    let config = ExportConfig::load(&cli.overrides()).context("invalid configuration")?;
    info!(
        records = %config.records_file.display(),
        framework = %config.framework_file.display(),
        tag = %config.item_field_tag,
        recovery = %config.recovery_mode,
        "Starting export"
    );

    let summary = export(&config).inspect_err(|e| error!(error = %e, "Export failed"))?;
    info!(
        records = summary.records_read,
        items = summary.rows_written,
        skipped = summary.skipped(),
        output = %config.output_file.display(),
        errors = %config.errors_file.display(),
        "Export complete"
    );
    Ok(())
}
