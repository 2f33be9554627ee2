use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use folio_api::models::portfolio::Portfolio;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use folio_client::api::ApiClient;
use folio_client::form::FormSession;
use folio_client::view::{ViewSession, ViewState, DEFAULT_REFRESH_INTERVAL};

#[derive(Parser)]
#[command(name = "folio", about = "Build, share and export portfolios")]
struct Cli {
    /// Folio API origin.
    #[arg(long, env = "FOLIO_API_URL", default_value = "http://localhost:5000")]
    api_url: String,

    /// Origin the shareable view is served from.
    #[arg(long, env = "FOLIO_PUBLIC_URL", default_value = "http://localhost:3000")]
    public_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save a draft JSON file and print its share link. The assigned id is written back.
    Save { draft: PathBuf },
    /// Print a stored portfolio as JSON.
    Show { id: String },
    /// Poll a portfolio and print every refresh.
    Watch {
        id: String,
        #[arg(long, default_value_t = DEFAULT_REFRESH_INTERVAL.as_secs())]
        interval_secs: u64,
    },
    /// Upload a certificate image and append it to a draft file.
    Upload { draft: PathBuf, image: PathBuf },
    /// Download a stored certificate.
    Download {
        filename: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Export a stored portfolio to PDF.
    Export {
        id: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Print every stored portfolio.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio_client=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api = ApiClient::new(&cli.api_url)?;

    match cli.command {
        Command::Save { draft } => {
            let mut form = FormSession::from_draft(api, &cli.public_url, read_draft(&draft).await?);
            let outcome = form.save().await?;
            if !outcome.verified {
                warn!("Portfolio saved but could not be verified. Please try viewing again.");
            }
            write_draft(&draft, form.draft()).await?;
            println!("id: {}", outcome.id);
            println!("share: {}", outcome.share_url);
        }
        Command::Show { id } => {
            let portfolio = ViewSession::new(api, id).load().await?;
            println!("{}", serde_json::to_string_pretty(&portfolio)?);
        }
        Command::Watch { id, interval_secs } => {
            let view = ViewSession::new(api, id);
            let mut watcher = view.watch(Duration::from_secs(interval_secs.max(1)));
            while let Some(state) = watcher.changed().await {
                match state {
                    ViewState::Loaded(p) => println!("{}", serde_json::to_string(&p)?),
                    ViewState::Failed(message) => warn!("{message}"),
                    ViewState::Loading => {}
                }
            }
        }
        Command::Upload { draft, image } => {
            let mut form = FormSession::from_draft(api, &cli.public_url, read_draft(&draft).await?);
            let certificate = form.upload_certificate(&image).await?;
            write_draft(&draft, form.draft()).await?;
            info!("Certificate uploaded successfully!");
            println!("{}", certificate.url);
        }
        Command::Download { filename, out } => {
            let path = ViewSession::new(api, "")
                .download_certificate(&filename, None, &out)
                .await?;
            println!("{}", path.display());
        }
        Command::Export { id, out } => {
            let view = ViewSession::new(api, id);
            let portfolio = view.load().await?;
            let path = view.export_pdf(&portfolio, &out).await?;
            println!("{}", path.display());
        }
        Command::List => {
            let all = api.list().await?;
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
    }

    Ok(())
}

/// A missing draft file starts an empty portfolio.
async fn read_draft(path: &Path) -> Result<Portfolio> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("{} is not a valid portfolio draft", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Portfolio::default()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

async fn write_draft(path: &Path, portfolio: &Portfolio) -> Result<()> {
    let json = serde_json::to_vec_pretty(portfolio)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
