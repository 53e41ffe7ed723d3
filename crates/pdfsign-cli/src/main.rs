//! pdfsign: queue PDF documents for remote signing.
//!
//! Configuration comes from PDFSIGN_* variables (a `.env` file is honored).
//! The bearer token is read from PDFSIGN_TOKEN, the signer's name from
//! PDFSIGN_FULL_NAME.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use pdfsign_api_client::SigningClient;
use pdfsign_cli::{parse_annotation, parse_placement, summarize, truncate_description};
use pdfsign_core::models::{annotation_types, PlacementMode, SourceFile};
use pdfsign_core::{auth_channel, AuthContext, SigningConfig};
use pdfsign_infra::{create_zip_archive, init_telemetry, write_to_dir, LogFormat};
use pdfsign_processing::{count_existing_signatures, pdf};
use pdfsign_worker::{strategy_for, StepOutcome, TracingNotifier, UploadOrchestrator};

#[derive(Parser)]
#[command(name = "pdfsign", about = "Queue PDF documents for remote signing")]
struct Cli {
    /// Log output format: pretty or json
    #[arg(long, global = true, default_value = "pretty")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign one or more PDF documents
    Sign {
        /// Documents to sign, processed in the given order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Manual placement for every document (camelCase JSON as captured by the canvas)
        #[arg(long)]
        placement: Option<String>,
        /// Annotation row as <type>=<value> or <type>@<organization>=<value>; repeatable
        #[arg(long = "annotation")]
        annotations: Vec<String>,
        /// Directory for the signed documents
        #[arg(long, default_value = "signed")]
        out: PathBuf,
        /// Additionally write all signed documents into this ZIP file
        #[arg(long)]
        zip: Option<PathBuf>,
    },
    /// Show whether a document already carries signatures
    Inspect {
        /// Path to the PDF
        file: PathBuf,
    },
    /// List the registered annotation types
    AnnotationTypes,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn auth_from_env() -> anyhow::Result<AuthContext> {
    let token = std::env::var("PDFSIGN_TOKEN").context("PDFSIGN_TOKEN must be set")?;
    let person_id = std::env::var("PDFSIGN_PERSON_ID").unwrap_or_default();
    let full_name = std::env::var("PDFSIGN_FULL_NAME").unwrap_or_default();
    Ok(AuthContext::new(token, person_id).with_full_name(full_name))
}

async fn sign(
    files: Vec<PathBuf>,
    placement: Option<String>,
    annotations: Vec<String>,
    out: PathBuf,
    zip: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = SigningConfig::from_env().context("Failed to load signing configuration")?;
    let placement = placement.as_deref().map(parse_placement).transpose()?;
    let rows = annotations
        .iter()
        .map(|a| parse_annotation(a))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let (_auth_tx, auth_rx) = auth_channel(auth_from_env()?);
    let client = SigningClient::new(&config).context("Failed to create signing client")?;
    let orchestrator = Arc::new(UploadOrchestrator::new(
        config.clone(),
        Arc::new(client),
        strategy_for(config.flow),
        Arc::new(TracingNotifier),
        auth_rx,
    ));

    for path in &files {
        let file = SourceFile::from_path(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let key = orchestrator
            .add_file(file)
            .await
            .with_context(|| format!("Rejected {}", path.display()))?;

        let mut queue = orchestrator.queue().await;
        if let Some(placement) = &placement {
            queue.set_placement_mode(key, PlacementMode::Manual);
            queue.set_placement(key, Some(placement.clone()));
        }
        if !rows.is_empty() {
            queue.set_annotation_rows(key, rows.clone());
        }
    }

    orchestrator.start().await?;
    let handle = orchestrator.spawn();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut prompted: Option<String> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                orchestrator.cancel().await;
                break;
            }
            _ = tokio::time::sleep(config.poll_interval()) => {}
        }

        let status = orchestrator.status().await;
        eprintln!("{}", summarize(&status));

        if let Some(url) = status.challenge_url.filter(|u| prompted.as_ref() != Some(u)) {
            println!("Confirm the signature at: {}", url);
            println!("Then paste the completion message:");
            prompted = Some(url);

            let line = stdin
                .next_line()
                .await
                .context("Failed to read completion message")?
                .ok_or_else(|| anyhow!("stdin closed while a challenge was open"))?;
            match orchestrator.handle_bridge_json(&line).await {
                Ok(StepOutcome::Ignored(reason)) => {
                    eprintln!("Message ignored: {}", reason);
                    prompted = None;
                }
                Ok(outcome) => tracing::debug!(outcome = ?outcome, "Bridge message handled"),
                Err(e) => {
                    eprintln!("Invalid completion message: {}", e);
                    prompted = None;
                }
            }
        }

        if orchestrator.is_idle().await {
            break;
        }
    }
    handle.shutdown().await;

    let blockers = orchestrator.placement_blockers().await;
    if !blockers.is_empty() {
        eprintln!("Manual placement required for: {}", blockers.join(", "));
    }

    let signed = orchestrator.signed_files().await;
    if !signed.is_empty() {
        for path in write_to_dir(&signed, &out)? {
            println!("{}", path.display());
        }
        if let Some(zip) = zip {
            let archive = create_zip_archive(&signed)?;
            std::fs::write(&zip, archive)
                .with_context(|| format!("Failed to write {}", zip.display()))?;
            println!("{}", zip.display());
        }
    }

    let errors = orchestrator.error_files().await;
    for error in &errors {
        eprintln!(
            "FAILED {} [{}, status {}]: {}",
            error.file.name,
            error.stage,
            error.status,
            truncate_description(&error.description, 120)
        );
    }

    if !errors.is_empty() || !blockers.is_empty() {
        anyhow::bail!(
            "{} document(s) failed, {} blocked",
            errors.len(),
            blockers.len()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format: LogFormat = cli.log_format.parse()?;
    init_telemetry(format).map_err(|e| anyhow!("Failed to initialize tracing: {}", e))?;

    match cli.command {
        Commands::Sign {
            files,
            placement,
            annotations,
            out,
            zip,
        } => sign(files, placement, annotations, out, zip).await?,
        Commands::Inspect { file } => {
            let source = SourceFile::from_path(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let signatures = count_existing_signatures(&source.bytes);
            let pages = pdf::page_count(&source.bytes).ok();
            print_json(&serde_json::json!({
                "file": source.name,
                "size": source.size(),
                "pages": pages,
                "existing_signatures": signatures,
                "needs_placement": signatures > 0,
            }))?;
        }
        Commands::AnnotationTypes => print_json(&annotation_types())?,
    }

    Ok(())
}
