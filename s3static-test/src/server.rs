//! Test server management

use s3static_core::ServeConfig;
use s3static_serve::{
    storage::{EphemeralStorage, ObjectStore},
    S3Static,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

/// An in-process s3static server on a random local port
pub struct TestServer {
    handle: JoinHandle<()>,
    base_url: String,
    storage: Option<Arc<EphemeralStorage>>,
}

impl TestServer {
    /// Start a server over a fresh in-memory store
    pub async fn start(bucket_path: &str) -> Result<Self, TestError> {
        let storage = Arc::new(EphemeralStorage::new());
        let mut server = Self::start_with_store(bucket_path, storage.clone()).await?;
        server.storage = Some(storage);
        Ok(server)
    }

    /// Start a server over any store
    pub async fn start_with_store(
        bucket_path: &str,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self, TestError> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| TestError::StartFailed(e.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|e| TestError::StartFailed(e.to_string()))?;

        let app = S3Static::new(ServeConfig::new(bucket_path), store).router();

        info!(addr = %addr, "Starting s3static test server");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Test server stopped");
            }
        });

        Ok(Self {
            handle,
            base_url: format!("http://{}", addr),
            storage: None,
        })
    }

    /// Get the base URL
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// The in-memory store, when the server was started with one
    ///
    /// # Panics
    ///
    /// Panics if the server was started with a caller-supplied store.
    pub fn storage(&self) -> &EphemeralStorage {
        self.storage
            .as_deref()
            .expect("server was started with a custom store")
    }

    /// Get a client for this server
    pub fn client(&self) -> crate::StaticClient {
        crate::StaticClient::new(self.base_url.clone())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Errors that can occur with test server
#[derive(Debug)]
pub enum TestError {
    StartFailed(String),
    ClientError(String),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::StartFailed(msg) => write!(f, "Failed to start server: {}", msg),
            TestError::ClientError(msg) => write!(f, "Client error: {}", msg),
        }
    }
}

impl std::error::Error for TestError {}

impl From<reqwest::Error> for TestError {
    fn from(e: reqwest::Error) -> Self {
        TestError::ClientError(e.to_string())
    }
}
