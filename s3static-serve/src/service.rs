//! s3static service

use axum::Router;
use s3static_core::ServeConfig;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{handle_request, ServeState};
use crate::storage::{EphemeralStorage, ObjectStore};

/// Static file service over one object store
pub struct S3Static {
    state: Arc<ServeState>,
}

impl S3Static {
    /// Create a service over `store`
    pub fn new(config: ServeConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            state: Arc::new(ServeState { store, config }),
        }
    }

    /// Create a service backed by an in-memory store
    pub fn ephemeral(config: ServeConfig) -> (Self, Arc<EphemeralStorage>) {
        let storage = Arc::new(EphemeralStorage::new());
        (Self::new(config, storage.clone()), storage)
    }

    /// Build the router; every path and method goes to the same handler
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(handle_request)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }
}
