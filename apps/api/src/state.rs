use std::sync::Arc;

use crate::store::PortfolioStore;
use crate::uploads::CertificateStorage;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable record store. Default: `MemoryStore`; `JsonDirStore` when `STORE_DIR` is set.
    pub store: Arc<dyn PortfolioStore>,
    pub certificates: CertificateStorage,
}
