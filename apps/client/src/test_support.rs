use std::sync::Arc;

use folio_api::routes::build_router;
use folio_api::state::AppState;
use folio_api::store::MemoryStore;
use folio_api::uploads::{CertificateStorage, DEFAULT_MAX_UPLOAD_BYTES};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use crate::api::ApiClient;

/// A real Folio API bound to an ephemeral localhost port.
pub struct TestServer {
    pub api: ApiClient,
    pub uploads: TempDir,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let uploads = TempDir::new().unwrap();
        let state = AppState {
            store: Arc::new(MemoryStore::new()),
            certificates: CertificateStorage::open(uploads.path(), DEFAULT_MAX_UPLOAD_BYTES)
                .unwrap(),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        Self {
            api: ApiClient::new(format!("http://{addr}")).unwrap(),
            uploads,
            task,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
