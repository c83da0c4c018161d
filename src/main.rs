//! PDF toolkit CLI application.
//!
//! Each subcommand runs one operation and prints exactly one JSON object on
//! stdout. Failures, including malformed command lines, are reported in the
//! same JSON shape with `success: false`. Logs go to stderr.

use anyhow::{Context, Result};
use clap::error::ErrorKind as ClapErrorKind;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use pdf_toolkit::{
    EncryptionStrength, Operation, OperationResult, OperationRunner, OutOfRangePolicy,
    RunnerConfig, ToolkitError, UpdateConfig,
};

/// PDF Toolkit
///
/// Merge, split, reorganise, rotate, compress, watermark, protect and
/// convert PDF documents. Every command prints a single JSON result.
#[derive(Parser)]
#[command(name = "pdf-toolkit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// How page numbers outside the document are handled
    #[arg(long, global = true, value_name = "reject|skip", default_value = "reject")]
    out_of_range: OutOfRangePolicy,

    /// Resolution of pdf-to-image output
    #[arg(long, global = true, value_name = "DPI", default_value_t = 300)]
    dpi: u32,

    /// Cipher used by protect
    #[arg(
        long,
        global = true,
        value_name = "aes256|aes128|rc4-128",
        default_value = "aes256"
    )]
    encryption: EncryptionStrength,

    /// JSON manifest whose "version" field names the running version
    #[arg(long, global = true, value_name = "FILE", env = "APP_MANIFEST")]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge PDFs in order
    Merge {
        /// JSON array of input paths, e.g. '["a.pdf","b.pdf"]'
        inputs: String,
        output: PathBuf,
    },

    /// Extract pages, in the given order, into a new PDF
    Split {
        input: PathBuf,
        /// Comma-separated one-based pages and ranges, e.g. "3,1-2"
        pages: String,
        output: PathBuf,
    },

    /// Reorder pages and drop some of them
    Organize {
        input: PathBuf,
        /// Full page order, e.g. "3,1,2"
        order: String,
        /// Pages to delete (may be empty)
        delete: String,
        output: PathBuf,
    },

    /// Rotate pages
    Rotate {
        input: PathBuf,
        /// JSON object mapping pages to angles, e.g. '{"1": 90}'
        rotations: String,
        output: PathBuf,
    },

    /// Re-save with stream compression and garbage collection
    Compress { input: PathBuf, output: PathBuf },

    /// Stamp semi-transparent text on every page
    Watermark {
        input: PathBuf,
        output: PathBuf,
        /// JSON options: {"text", "orientation", "size"}
        options: Option<String>,
    },

    /// Encrypt with a password
    Protect {
        input: PathBuf,
        output: PathBuf,
        password: String,
    },

    /// Build a PDF with one page per image
    ImageToPdf {
        /// Comma-separated image paths (png, jpg, jpeg)
        images: String,
        output: PathBuf,
    },

    /// Render every page to page_N.png
    PdfToImage { input: PathBuf, output_dir: PathBuf },

    /// Render preview images
    Preview {
        input: PathBuf,
        /// Zero-based page index, or -1 for thumbnails of every page
        #[arg(allow_negative_numbers = true)]
        page: i64,
        output_dir: PathBuf,
    },

    /// Check a JSON feed for a newer release
    CheckUpdate {
        url: String,
        /// Running version (falls back to APP_VERSION, then the manifest)
        current_version: Option<String>,
        /// Request timeout in seconds
        timeout: Option<u64>,
    },

    /// Extract or replace document text
    EditText {
        #[command(subcommand)]
        action: EditTextAction,
    },
}

#[derive(Subcommand)]
enum EditTextAction {
    /// Print the plain text of the document
    Extract { input: PathBuf },

    /// Replace text occurrences page by page
    Replace {
        input: PathBuf,
        /// JSON array of {"page", "oldText", "newText", "size"}
        replacements: String,
        output: PathBuf,
    },
}

impl Cli {
    fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::default()
            .with_out_of_range(self.out_of_range)
            .with_raster_dpi(self.dpi)
            .with_encryption(self.encryption)
    }
}

/// Maps a parsed subcommand to the library operation it runs.
fn build_operation(command: Commands, manifest: Option<PathBuf>) -> Operation {
    match command {
        Commands::Merge { inputs, output } => Operation::Merge { inputs, output },
        Commands::Split {
            input,
            pages,
            output,
        } => Operation::Split {
            input,
            pages,
            output,
        },
        Commands::Organize {
            input,
            order,
            delete,
            output,
        } => Operation::Organize {
            input,
            order,
            delete,
            output,
        },
        Commands::Rotate {
            input,
            rotations,
            output,
        } => Operation::Rotate {
            input,
            rotations,
            output,
        },
        Commands::Compress { input, output } => Operation::Compress { input, output },
        Commands::Watermark {
            input,
            output,
            options,
        } => Operation::Watermark {
            input,
            output,
            options: options.unwrap_or_default(),
        },
        Commands::Protect {
            input,
            output,
            password,
        } => Operation::Protect {
            input,
            output,
            password,
        },
        Commands::ImageToPdf { images, output } => Operation::ImageToPdf { images, output },
        Commands::PdfToImage { input, output_dir } => Operation::PdfToImage { input, output_dir },
        Commands::Preview {
            input,
            page,
            output_dir,
        } => Operation::Preview {
            input,
            page,
            output_dir,
        },
        Commands::CheckUpdate {
            url,
            current_version,
            timeout,
        } => Operation::CheckUpdate {
            url,
            current_version: UpdateConfig::from_env(current_version, manifest).current_version(),
            timeout: timeout.map(Duration::from_secs),
        },
        Commands::EditText { action } => match action {
            EditTextAction::Extract { input } => Operation::ExtractText { input },
            EditTextAction::Replace {
                input,
                replacements,
                output,
            } => Operation::ReplaceText {
                input,
                replacements,
                output,
            },
        },
    }
}

/// Converts a clap usage error into an in-band failure.
fn usage_failure(err: &clap::Error) -> OperationResult {
    let rendered = err.to_string();
    let reason = rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .to_string();
    OperationResult::failure(&ToolkitError::InvalidArguments {
        parameter: "arguments".to_string(),
        reason,
    })
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn emit(result: &OperationResult) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", result.to_json()).context("Failed to write result to stdout")?;
    stdout.flush().context("Failed to flush stdout")
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => err.exit(),
            _ => return emit(&usage_failure(&err)),
        },
    };

    init_tracing(cli.verbose);
    let runner = OperationRunner::with_mupdf(cli.runner_config());
    let operation = build_operation(cli.command, cli.manifest);
    let result = runner.run(operation);
    emit(&result)
}
