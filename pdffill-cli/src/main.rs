use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pdffill::{FillRequest, FormDocument};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "pdffill",
    about = "Inspect and fill PDF form fields",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the form fields of a PDF as JSON
    Fields {
        /// Input PDF file
        input: PathBuf,

        /// User password for encrypted files
        #[arg(long)]
        password: Option<String>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Fill form fields and write a new PDF
    Fill {
        /// Input PDF file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Field values as a JSON object (e.g. '{"name": "Jane"}')
        #[arg(long, conflicts_with = "values_file")]
        values: Option<String>,

        /// File containing the field values JSON object
        #[arg(long)]
        values_file: Option<PathBuf>,

        /// User password for encrypted files
        #[arg(long)]
        password: Option<String>,

        /// Keep the form interactive instead of flattening it
        #[arg(long)]
        no_flatten: bool,
    },

    /// Get information about the form of a PDF file
    Info {
        /// Input PDF file
        input: PathBuf,

        /// User password for encrypted files
        #[arg(long)]
        password: Option<String>,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fields {
            input,
            password,
            pretty,
        } => {
            let bytes = read_pdf(&input)?;
            let fields = pdffill::inspect(&bytes, password.as_deref())
                .with_context(|| format!("Failed to read form fields of {}", input.display()))?;

            let json = if pretty {
                serde_json::to_string_pretty(&fields)?
            } else {
                serde_json::to_string(&fields)?
            };
            println!("{json}");
        }

        Commands::Fill {
            input,
            output,
            values,
            values_file,
            password,
            no_flatten,
        } => {
            let values = match (values, values_file) {
                (Some(values), _) => values,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read values file {}", path.display()))?,
                (None, None) => bail!("Provide field values with --values or --values-file"),
            };
            let request = FillRequest::from_json(&values, !no_flatten)?;
            debug!("Filling {} values", request.values.len());

            let bytes = read_pdf(&input)?;
            let filled = pdffill::fill(&bytes, password.as_deref(), &request)
                .with_context(|| format!("Failed to fill {}", input.display()))?;

            fs::write(&output, &filled.bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            let report = &filled.report;
            println!("✓ Filled PDF written to: {}", output.display());
            println!("Applied: {}", report.applied.len());
            for name in &report.applied {
                println!("  {name}");
            }
            if !report.skipped.is_empty() {
                println!("Skipped: {}", report.skipped.len());
                for name in &report.skipped {
                    println!("  {name}");
                }
            }
            if report.flattened {
                println!("Form flattened");
            }
        }

        Commands::Info { input, password } => {
            let bytes = read_pdf(&input)?;
            let form = FormDocument::open(&bytes, password.as_deref())
                .with_context(|| format!("Failed to open {}", input.display()))?;
            let fields = form.inspect_fields();

            println!("PDF Information for: {}", input.display());
            println!("==========================================");
            println!("Pages: {}", form.page_count());
            println!(
                "AcroForm: {}",
                if form.has_acro_form() { "Yes" } else { "No" }
            );
            println!("Fields: {}", fields.len());
            for field in &fields {
                let page = field
                    .page
                    .map(|page| page.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("  {} ({}, page {})", field.name, field.kind, page);
            }
        }
    }

    Ok(())
}

fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if !pdffill::is_pdf(&bytes) {
        bail!("{} is not a PDF file", path.display());
    }
    Ok(bytes)
}
