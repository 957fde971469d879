//! VDAT Reconciliation - Main Entry Point

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use pipeline::{export, init_logging, ImageInput, Pipeline, RunConfig, RunInputs, TabularInput};
use tracing::info;

#[derive(Parser)]
#[command(name = "vdat-reconcile")]
#[command(about = "Merge shipping manifests into a deduplicated VDAT import file")]
#[command(version)]
struct Cli {
    /// Spreadsheet or CSV manifest (repeatable)
    #[arg(long = "sheet", value_name = "FILE")]
    sheets: Vec<PathBuf>,

    /// Photograph of a paper manifest
    #[arg(long, value_name = "FILE")]
    image: Option<PathBuf>,

    /// File holding pasted text, `-` for stdin
    #[arg(long, value_name = "FILE")]
    text: Option<PathBuf>,

    /// TOML run configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the customer name or code
    #[arg(long)]
    customer: Option<String>,

    /// Override the port of arrival name or code
    #[arg(long)]
    poa: Option<String>,

    /// Override the voyage/batch reference
    #[arg(long)]
    batch_ref: Option<String>,

    /// Brand for image and text records that name none
    #[arg(long)]
    fallback_brand: Option<String>,

    /// Directory the VDAT file is written to
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

fn read_text(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        return std::io::read_to_string(std::io::stdin()).context("reading text from stdin");
    }
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs).context("installing log subscriber")?;

    info!("=== VDAT Reconcile v{} ===", env!("CARGO_PKG_VERSION"));

    let mut config = RunConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(customer) = cli.customer {
        config.run.customer = customer;
    }
    if let Some(poa) = cli.poa {
        config.run.poa = poa;
    }
    if cli.batch_ref.is_some() {
        config.run.batch_ref = cli.batch_ref;
    }
    if cli.fallback_brand.is_some() {
        config.run.fallback_brand = cli.fallback_brand;
    }

    if cli.sheets.is_empty() && cli.image.is_none() && cli.text.is_none() {
        bail!("nothing to reconcile: pass --sheet, --image or --text");
    }

    let inputs = RunInputs {
        tabular: cli.sheets.into_iter().map(TabularInput::File).collect(),
        image: cli.image.map(ImageInput::File),
        text: cli.text.as_deref().map(read_text).transpose()?,
    };

    let pipeline = Pipeline::new(config)?;
    let report = pipeline.run(inputs).await?;

    let now = Local::now().naive_local();
    let rows = report.vdat_rows(now.date());
    fs::create_dir_all(&cli.out).with_context(|| format!("creating {}", cli.out.display()))?;
    let path = cli
        .out
        .join(export::file_name(&report.customer_code, &report.poa_code, now));
    let file = fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    export::write_csv(file, &rows)?;

    info!(
        "Wrote {} rows to {} (batch {}, sheet '{}')",
        rows.len(),
        path.display(),
        report.batch_ref,
        export::sheet_name(&report.batch_ref)
    );
    println!("{}", serde_json::to_string_pretty(&report.summary)?);

    Ok(())
}
