use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use txt2utf8::{BatchDriver, BatchOutcome, Config, ConversionReport, Converter, DetectionPolicy};

#[derive(Parser, Debug)]
#[command(
    name = "txt2utf8",
    version,
    about = "TXT → UTF-8 converter",
    long_about = "Convert text files of unknown or mixed encoding into UTF-8 without a BOM.\n\n\
    A file input is converted on its own; a directory input converts every .txt \
    file under it in parallel.\n\n\
    USAGE EXAMPLES:\n  \
      # Convert one file into a directory\n  \
      txt2utf8 -i legacy/a.txt -o out/\n\n  \
      # Convert a tree with 16 workers, replacing earlier outputs\n  \
      txt2utf8 -i legacy -o out --workers 16 --overwrite\n\n  \
      # Refuse to guess on files that look binary\n  \
      txt2utf8 -i legacy -o out --strict --report summary.json"
)]
struct Cli {
    /// Path to a .txt file or a directory
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Output file or directory
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,

    /// Overwrite outputs that already exist
    #[arg(long)]
    overwrite: bool,

    /// Concurrent conversions in batch mode (values below 1 mean 1)
    #[arg(short, long, default_value_t = 8, allow_negative_numbers = true)]
    workers: i64,

    /// Do not scan subfolders
    #[arg(long)]
    no_recursive: bool,

    /// Fail on files whose encoding cannot be detected instead of guessing
    #[arg(long)]
    strict: bool,

    /// Mirror the input tree under the output directory
    #[arg(long)]
    preserve_structure: bool,

    /// Write a JSON summary of the batch to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Hide progress bars
    #[arg(long)]
    no_progress: bool,

    /// Verbose output (also prints the batch summary table)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let workers = usize::try_from(cli.workers.max(1)).unwrap_or(usize::MAX);
    let policy = if cli.strict {
        DetectionPolicy::Strict
    } else {
        DetectionPolicy::Lenient
    };

    let config = Config::builder()
        .input(&cli.input)
        .output(&cli.output)
        .overwrite(cli.overwrite)
        .workers(workers)
        .recursive(!cli.no_recursive)
        .policy(policy)
        .preserve_structure(cli.preserve_structure)
        .build()
        .context("Failed to build configuration")?;

    if cli.input.is_dir() {
        let outcome = run_batch(config, cli.no_progress)?;

        if let Some(path) = &cli.report {
            write_report(path, &outcome)?;
        }

        let summary = &outcome.summary;
        if cli.verbose > 0 {
            summary.print_summary();
        }
        println!(
            "Batch: {} ok, {} failed → {}",
            summary.succeeded,
            summary.failed,
            cli.output.display()
        );
        for failure in outcome.failures() {
            println!(
                "  - {}: {}",
                failure.path.display(),
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }

        return Ok(if summary.all_succeeded() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let report = run_single(&config, cli.no_progress).context("Conversion failed")?;
    println!(
        "OK: {} [{}] → {} ({}→{} bytes)",
        report
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        report.detected_encoding,
        report.output_path.display(),
        report.bytes_in,
        report.bytes_out
    );

    Ok(ExitCode::SUCCESS)
}

fn run_single(config: &Config, no_progress: bool) -> txt2utf8::Result<ConversionReport> {
    let total = std::fs::metadata(&config.input).map(|m| m.len()).unwrap_or(0);
    let bar = progress_bar(total, no_progress, "{msg} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec})");
    bar.set_message(
        config
            .input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    );

    let result = Converter::new(config).convert_with_progress(
        &config.input,
        &config.output,
        config.overwrite,
        &mut |read| bar.set_position(read),
    );

    bar.finish_and_clear();
    result
}

fn run_batch(config: Config, no_progress: bool) -> anyhow::Result<BatchOutcome> {
    let driver = BatchDriver::new(config).context("Failed to create batch driver")?;

    let bar = if no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} Converting: {pos} files done ({elapsed})") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    };

    let outcome = driver
        .run_with_observer(&|_| bar.inc(1))
        .context("Batch conversion failed")?;

    bar.finish_and_clear();
    Ok(outcome)
}

fn progress_bar(total: u64, hidden: bool, template: &str) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn write_report(path: &Path, outcome: &BatchOutcome) -> anyhow::Result<()> {
    let document = serde_json::json!({
        "summary": outcome.summary,
        "results": outcome.results,
        "generated_at": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    });

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report {}", path.display()))?;
    serde_json::to_writer_pretty(file, &document)
        .with_context(|| format!("Failed to write report {}", path.display()))?;

    tracing::info!("Wrote report to {}", path.display());
    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("txt2utf8=info"),
        1 => EnvFilter::new("txt2utf8=debug"),
        _ => EnvFilter::new("txt2utf8=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}
