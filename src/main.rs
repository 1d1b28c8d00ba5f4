// ==============================================================================
// main.rs - Genotype Windows Entry Point
// ==============================================================================
// Description: Command-line front end for windowed genotype comparison
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genotype_windows::output::sink_for;
use genotype_windows::{
    ComparisonRequest, ComparisonService, Dataset, DatasetRegistry, Identity, RawRequest, Settings,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Authenticated user, unlocks restricted datasets
    #[arg(long, env = "GTW_USER", global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List datasets visible to --user (JSON)
    Datasets,

    /// List the sample identifiers of a dataset (JSON)
    Samples {
        dataset: String,
    },

    /// Compare one reference sample against variant samples
    Compare {
        /// Reference sample, "<dataset>:<sample>"
        #[arg(long)]
        reference: String,

        /// Variant sample, "<dataset>:<sample>" (repeatable)
        #[arg(long = "variant")]
        variants: Vec<String>,

        /// Window size; non-positive values use the default
        #[arg(long, allow_negative_numbers = true)]
        bin: Option<i64>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a JSON array of requests concurrently, one output file each
    Batch {
        requests: PathBuf,

        #[arg(long)]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries window output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genotype_windows=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let identity = cli.user.clone().map(Identity);

    let registry = DatasetRegistry::from_manifest(&cli.settings.manifest)
        .with_context(|| format!("Failed to load dataset manifest {:?}", cli.settings.manifest))?;
    let service = Arc::new(ComparisonService::new(Arc::new(registry), cli.settings.clone()));

    match cli.command {
        Command::Datasets => {
            let datasets = service.registry().list(identity.as_ref());
            let datasets: Vec<&Dataset> = datasets.iter().map(|d| d.as_ref()).collect();
            print_json(&datasets)
        }
        Command::Samples { dataset } => {
            let dataset = service
                .registry()
                .lookup(&dataset, identity.as_ref())
                .with_context(|| format!("Dataset not available: {}", dataset))?;
            print_json(&dataset.samples)
        }
        Command::Compare {
            reference,
            variants,
            bin,
            output,
        } => {
            let request = ComparisonRequest::parse(&reference, &variants, bin)?;
            run_compare(service, request, identity, output).await
        }
        Command::Batch { requests, out_dir } => run_batch(service, &requests, &out_dir, identity).await,
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

async fn run_compare(
    service: Arc<ComparisonService>,
    request: ComparisonRequest,
    identity: Option<Identity>,
    output: Option<PathBuf>,
) -> Result<()> {
    let summary = match output {
        Some(path) => service
            .compare_to_file(request, identity, path.clone())
            .await
            .with_context(|| format!("Comparison into {:?} failed", path))?,
        None => tokio::task::spawn_blocking(move || {
            let settings = service.settings();
            let mut sink = sink_for(settings.format, BufWriter::new(io::stdout()), &settings.source)?;
            service
                .compare(&request, identity.as_ref(), &mut sink)
                .context("Comparison failed")
        })
        .await??,
    };

    info!(
        "Wrote {} window(s) from {} record(s)",
        summary.windows, summary.records
    );
    Ok(())
}

async fn run_batch(
    service: Arc<ComparisonService>,
    requests: &Path,
    out_dir: &Path,
    identity: Option<Identity>,
) -> Result<()> {
    let text = std::fs::read_to_string(requests)
        .with_context(|| format!("Failed to read batch file {:?}", requests))?;
    let raw: Vec<RawRequest> =
        serde_json::from_str(&text).with_context(|| format!("Invalid batch file {:?}", requests))?;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {:?}", out_dir))?;

    let extension = service.settings().format.extension();
    let total = raw.len();
    let mut failed = 0usize;
    let mut tasks = JoinSet::new();

    for (i, raw) in raw.iter().enumerate() {
        let name = raw.name.clone().unwrap_or_else(|| format!("request-{}", i + 1));
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            error!("[{}] Invalid output name", name);
            failed += 1;
            continue;
        }

        let request = match ComparisonRequest::try_from(raw) {
            Ok(request) => request,
            Err(e) => {
                error!("[{}] {}", name, e);
                failed += 1;
                continue;
            }
        };

        let identity = raw.user.clone().map(Identity).or_else(|| identity.clone());
        let path = out_dir.join(format!("{}.{}", name, extension));
        let service = Arc::clone(&service);
        tasks.spawn(async move { (name, service.compare_to_file(request, identity, path).await) });
    }

    while let Some(joined) = tasks.join_next().await {
        let (name, result) = joined.context("Batch task panicked")?;
        match result {
            Ok(summary) => info!("[{}] {} window(s)", name, summary.windows),
            Err(e) => {
                error!("[{}] {}", name, e);
                failed += 1;
            }
        }
    }

    info!("Batch finished: {} of {} request(s) succeeded", total - failed, total);
    if failed > 0 {
        bail!("{} of {} comparison(s) failed", failed, total);
    }
    Ok(())
}
