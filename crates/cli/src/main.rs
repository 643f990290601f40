//! CLI tool for checking appointment patients against a status roster.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use roster_core::{
    BlobSource, CheckConfig, Controller, HtmlRenderer, MatchPolicy, MatchResult, ResultRenderer,
    RunOutcome, StatusChecker, StatusView, TextRenderer,
};
use roster_pdf::PdfTextExtractor;
use roster_xlsx::XlsxParser;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Check which patients on an appointment PDF are active in the roster.
#[derive(Parser, Debug)]
#[command(name = "patient-status")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Appointment document (.pdf)
    document: Option<PathBuf>,

    /// Patient roster workbook (.xlsx, .xls or .ods); first sheet is used
    roster: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write output to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name matching policy
    #[arg(long, value_enum, default_value_t = PolicyArg::Substring)]
    policy: PolicyArg,

    /// Extraction regex with a named group `name`
    #[arg(long)]
    pattern: Option<String>,

    /// Roster column holding the patient name
    #[arg(long, default_value = roster_core::config::DEFAULT_NAME_COLUMN)]
    name_column: String,

    /// Roster column holding the enrollment status
    #[arg(long, default_value = roster_core::config::DEFAULT_STATUS_COLUMN)]
    status_column: String,

    /// Uppercase and strip accents from extracted names
    #[arg(long)]
    normalize: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One `STATUS<TAB>name` line per patient
    Text,
    /// Result markup as shown on the status page
    Html,
    /// JSON array of `{extracted, name, status}`
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    /// Accent-insensitive containment, active status preferred
    Substring,
    /// Case-insensitive equality
    Exact,
}

impl From<PolicyArg> for MatchPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Substring => MatchPolicy::Substring,
            PolicyArg::Exact => MatchPolicy::Exact,
        }
    }
}

/// A file named on the command line.
struct FileInput {
    path: Option<PathBuf>,
}

impl BlobSource for FileInput {
    fn is_present(&self) -> bool {
        self.path.is_some()
    }

    async fn read(&self) -> roster_core::Result<Vec<u8>> {
        match &self.path {
            Some(path) => Ok(std::fs::read(path)?),
            None => Err(roster_core::Error::MissingInput("no file given".to_string())),
        }
    }

    fn reset(&mut self) {
        self.path = None;
    }
}

/// Collects rendered output; messages go to stderr.
struct TerminalView {
    verbose: bool,
    output: Option<String>,
}

impl StatusView for TerminalView {
    fn set_busy(&mut self, busy: bool) {
        if self.verbose && busy {
            eprintln!("Checking patients...");
        }
    }

    fn show_message(&mut self, message: &str) {
        eprintln!("{}", message);
    }

    fn show_markup(&mut self, markup: &str) {
        self.output = Some(markup.to_string());
    }

    fn clear(&mut self) {
        self.output = None;
    }
}

/// Renders results as pretty-printed JSON.
struct JsonRenderer;

impl ResultRenderer for JsonRenderer {
    fn render(&self, results: &[MatchResult]) -> String {
        match serde_json::to_string_pretty(results) {
            Ok(json) => format!("{}\n", json),
            Err(e) => {
                log::error!("Failed to serialize results: {}", e);
                "[]\n".to_string()
            }
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let config = build_config(&args);
    let checker = StatusChecker::new(PdfTextExtractor::new(), XlsxParser::new(), &config)
        .context("Invalid check configuration")?;

    if args.verbose {
        if let (Some(document), Some(roster)) = (&args.document, &args.roster) {
            eprintln!("Document: {}", document.display());
            eprintln!("Roster:   {}", roster.display());
        }
    }

    let view = TerminalView {
        verbose: args.verbose,
        output: None,
    };
    let controller = Controller::new(
        FileInput {
            path: args.document.clone(),
        },
        FileInput {
            path: args.roster.clone(),
        },
        view,
        checker,
    );
    let mut controller = match args.format {
        OutputFormat::Text => controller.with_renderer(TextRenderer::new()),
        OutputFormat::Html => controller.with_renderer(HtmlRenderer::new()),
        OutputFormat::Json => controller.with_renderer(JsonRenderer),
    };

    let outcome = futures::executor::block_on(controller.run());

    match outcome {
        RunOutcome::Completed(results) => {
            if args.verbose {
                let found = results.iter().filter(|r| r.status.is_found()).count();
                eprintln!("  {} patients, {} found in roster", results.len(), found);
            }

            let output = controller.into_view().output.unwrap_or_default();
            match &args.output {
                Some(path) => {
                    write_output(path, &output)?;
                    if args.verbose {
                        eprintln!("Written to: {}", path.display());
                    }
                }
                None => print!("{}", output),
            }
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::MissingInput => Ok(ExitCode::from(2)),
        RunOutcome::Failed(e) => {
            if args.verbose {
                eprintln!("  {}", e);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn build_config(args: &Args) -> CheckConfig {
    let mut config = CheckConfig::new()
        .with_policy(args.policy.into())
        .with_name_column(&args.name_column)
        .with_status_column(&args.status_column)
        .with_normalize_extracted(args.normalize);

    if let Some(pattern) = &args.pattern {
        config = config.with_pattern(pattern);
    }

    config
}

/// Write output to a file.
fn write_output(path: &Path, content: &str) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}
