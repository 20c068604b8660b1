use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use schedule_table::{
    ACTIVITY_ID, ACTIVITY_NAME, Activity, ColumnLayout, ColumnSpec, ExportView, PageSelection,
    ReconstructOptions, Reconstruction, ReconstructionReport, export_csv, reconstruct_pdf,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "schedule2csv",
    version,
    about = "Rebuild activity schedules from positioned PDF text"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconstruct the schedule table and write it out.
    Extract(ExtractArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Quoted CSV of the selected view.
    Csv,
    /// Structured result as JSON.
    Json,
    /// Parsed durations and dates per activity as JSON.
    JsonTyped,
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Input PDF path.
    #[arg(short, long)]
    input: PathBuf,

    /// Output path.
    #[arg(short, long)]
    output: PathBuf,

    /// Page selection like 1-3,5.
    #[arg(long)]
    pages: Option<String>,

    /// Table view to export: flat or hierarchy.
    #[arg(long, default_value = "flat")]
    view: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Column band in format name:start-end. Repeatable; replaces the
    /// standard layout.
    #[arg(long = "column")]
    columns: Vec<String>,

    /// Column holding the activity identifier.
    #[arg(long, default_value = ACTIVITY_ID)]
    id_column: String,

    /// Column holding the activity name.
    #[arg(long, default_value = ACTIVITY_NAME)]
    name_column: String,

    /// Enable verbose warning output.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_layout(args: &ExtractArgs) -> Result<ColumnLayout> {
    if args.columns.is_empty() {
        return Ok(ColumnLayout::standard());
    }

    let columns = args
        .columns
        .iter()
        .map(|value| {
            ColumnSpec::from_str(value)
                .map_err(|error| anyhow!("invalid column: {error}"))
                .with_context(|| format!("failed to parse --column '{value}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    ColumnLayout::with_key_columns(columns, &args.id_column, &args.name_column)
        .context("failed to build column layout")
}

fn parse_options(args: &ExtractArgs) -> Result<ReconstructOptions> {
    let pages = args
        .pages
        .as_deref()
        .map(PageSelection::from_str)
        .transpose()
        .map_err(|error| anyhow!("invalid page selection: {error}"))
        .context("failed to parse --pages")?;

    let view = ExportView::from_str(&args.view)
        .map_err(|error| anyhow!(error))
        .context("failed to parse --view")?;

    Ok(ReconstructOptions {
        pages,
        columns: parse_layout(args)?,
        view,
    })
}

fn render(
    reconstruction: &Reconstruction,
    options: &ReconstructOptions,
    format: OutputFormat,
) -> Result<String> {
    let result = &reconstruction.result;
    let rendered = match format {
        OutputFormat::Csv => export_csv(result, options.view)?,
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::JsonTyped => {
            let activities = result
                .activities
                .iter()
                .map(Activity::from_row)
                .collect::<Vec<_>>();
            serde_json::to_string_pretty(&activities)?
        }
    };
    Ok(rendered)
}

fn log_report(report: &ReconstructionReport, verbose: bool) {
    if report.warnings.is_empty() {
        return;
    }

    eprintln!("warning: {} issue(s) detected", report.warnings.len());
    if verbose {
        for warning in &report.warnings {
            eprintln!(
                "  - {:?} page={:?} activity={:?} count={:?}: {}",
                warning.code, warning.page, warning.activity_id, warning.count, warning.message
            );
        }
    }
}

fn run_extract(args: &ExtractArgs) -> Result<ReconstructionReport> {
    let options = parse_options(args)?;
    let reconstruction = reconstruct_pdf(&args.input, &options).with_context(|| {
        format!(
            "failed to reconstruct schedule from '{}'",
            args.input.display()
        )
    })?;
    let rendered = render(&reconstruction, &options, args.format)?;
    std::fs::write(&args.output, rendered)
        .with_context(|| format!("failed to write '{}'", args.output.display()))?;
    Ok(reconstruction.report)
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("schedule_table=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Extract(args) => match run_extract(&args) {
            Ok(report) => {
                log_report(&report, args.verbose);
                if report.activity_count > 0 {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(2)
                }
            }
            Err(error) => {
                eprintln!("error: {error:#}");
                ExitCode::from(1)
            }
        },
    }
}
