//! Command-line interface for strata borehole chart extraction.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use strata::{ExtractorConfig, StrataExtractor};

#[derive(Parser)]
#[command(
    name = "strata",
    version,
    about = "Extract geological layer sequences from borehole strata charts",
    long_about = "Converts spreadsheet (.xlsx/.xls/.csv) and PDF boring logs into \
                  normalized, depth-ordered, confidence-annotated layer records."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (same as RUST_LOG=debug)
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract layers from a chart file
    Extract {
        /// The chart to extract (.xlsx, .xls, .csv, .pdf)
        file: PathBuf,

        /// Configuration file (.toml or .json)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// List supported file types
    Formats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Summary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Extract {
            file,
            config,
            output,
            pretty,
        } => extract(file, config, output, pretty).await,
        Commands::Formats => {
            let types = strata::supported_file_types();
            println!("excel: {}", types.excel.join(", "));
            println!("pdf:   {}", types.pdf.join(", "));
            Ok(())
        }
    }
}

async fn extract(
    file: PathBuf,
    config: Option<PathBuf>,
    output: OutputFormat,
    pretty: bool,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => ExtractorConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ExtractorConfig::default(),
    };

    tracing::debug!(file = %file.display(), "starting extraction");
    let extractor = StrataExtractor::new(config);
    let result = extractor
        .extract_file(&file)
        .await
        .with_context(|| format!("extraction failed for {}", file.display()))?;

    match output {
        OutputFormat::Json => {
            let json = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{}", json);
        }
        OutputFormat::Summary => print_summary(&result),
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(result: &strata::ExtractionResult) {
    println!(
        "{} ({} confidence, score {:.2})",
        if result.success { "extracted" } else { "incomplete" },
        result.confidence.level,
        result.confidence.score
    );

    if let Some(layers) = &result.data {
        for layer in layers {
            println!(
                "  {:>7.2} - {:>7.2} ft  {:<24} [{}]{}",
                layer.start_depth,
                layer.end_depth,
                layer.material,
                layer.confidence,
                layer
                    .original_color
                    .as_deref()
                    .map(|c| format!(" color={}", c))
                    .unwrap_or_default()
            );
        }
    }

    for error in &result.errors {
        println!("  error: {}", error);
    }
    for warning in &result.warnings {
        println!("  warning: {}", warning);
    }
    if let Some(guidance) = &result.user_guidance {
        println!("  next: {}", guidance);
    }
}
