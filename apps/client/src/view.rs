//! Read-only view of a shared portfolio: load, poll, preview, download, export.

use std::path::{Path, PathBuf};
use std::time::Duration;

use folio_api::models::portfolio::Portfolio;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::export::{pdf_file_name, populated_sections, render_pdf, Section};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// What the view currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Loaded(Portfolio),
    Failed(String),
}

/// Data for the inline certificate preview.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificatePreview {
    pub name: String,
    pub image_url: String,
}

pub struct ViewSession {
    api: ApiClient,
    id: String,
}

impl ViewSession {
    pub fn new(api: ApiClient, id: impl Into<String>) -> Self {
        Self { api, id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn load(&self) -> Result<Portfolio, ClientError> {
        if self.id.is_empty() {
            return Err(ClientError::Validation("Portfolio ID is missing".to_string()));
        }
        self.api.fetch(&self.id).await
    }

    /// Fetches now and then every `interval` until the returned watcher is dropped.
    ///
    /// Fetches run one after another inside a single task, so a slow response
    /// delays the next tick rather than racing it.
    pub fn watch(&self, interval: Duration) -> Watcher {
        let (tx, rx) = watch::channel(ViewState::Loading);
        let session = ViewSession::new(self.api.clone(), self.id.clone());

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let next = match session.load().await {
                    Ok(portfolio) => ViewState::Loaded(portfolio),
                    Err(e) => ViewState::Failed(e.to_string()),
                };
                debug!(id = %session.id, "portfolio refreshed");
                if tx.send(next).is_err() {
                    break;
                }
            }
        });

        Watcher { rx, task }
    }

    pub fn sections(portfolio: &Portfolio) -> Vec<Section> {
        populated_sections(portfolio)
    }

    pub fn certificate_preview(
        &self,
        portfolio: &Portfolio,
        index: usize,
    ) -> Option<CertificatePreview> {
        portfolio.certificates.get(index).map(|cert| CertificatePreview {
            name: cert.name.clone(),
            image_url: self.api.asset_url(&cert.url),
        })
    }

    /// Saves a certificate into `dest_dir` under its display name, falling
    /// back to the stored filename.
    pub async fn download_certificate(
        &self,
        filename: &str,
        name: Option<&str>,
        dest_dir: &Path,
    ) -> Result<PathBuf, ClientError> {
        let bytes = self.api.download_certificate(filename).await?;
        let target = dest_dir.join(local_file_name(name.unwrap_or(filename), filename));
        tokio::fs::write(&target, bytes).await?;
        info!("Certificate saved to {}", target.display());
        Ok(target)
    }

    /// Writes the paginated PDF of `portfolio` into `dest_dir`.
    pub async fn export_pdf(
        &self,
        portfolio: &Portfolio,
        dest_dir: &Path,
    ) -> Result<PathBuf, ClientError> {
        let snapshot = portfolio.clone();
        let bytes = tokio::task::spawn_blocking(move || render_pdf(&snapshot))
            .await
            .map_err(|e| ClientError::Io(std::io::Error::other(e)))??;

        let target = dest_dir.join(pdf_file_name(portfolio));
        tokio::fs::write(&target, bytes).await?;
        info!("PDF saved to {}", target.display());
        Ok(target)
    }
}

/// Last path component of `name`, or `fallback` if that is empty.
fn local_file_name(name: &str, fallback: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Handle to a running poll. Dropping it stops polling.
pub struct Watcher {
    rx: watch::Receiver<ViewState>,
    task: JoinHandle<()>,
}

impl Watcher {
    pub fn current(&self) -> ViewState {
        self.rx.borrow().clone()
    }

    /// Waits for the next refresh. `None` once polling has stopped.
    pub async fn changed(&mut self) -> Option<ViewState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
