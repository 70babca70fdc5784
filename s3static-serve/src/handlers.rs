//! HTTP request handler: classify a resolved path and answer it

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use s3static_core::{ServeConfig, ServeError};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::content::serve_content;
use crate::listing::format_listing;
use crate::resolver::{resolve, ResolvedRequest};
use crate::storage::{ObjectInfo, ObjectStore, StoreError};

/// Shared state for the handler
///
/// Immutable after construction; the store handle is the only shared
/// resource and is safe for concurrent use.
pub struct ServeState {
    pub store: Arc<dyn ObjectStore>,
    pub config: ServeConfig,
}

/// What a prefix listing says about a path
#[derive(Debug, PartialEq, Eq)]
pub enum Classification {
    NotFound,
    Directory(Vec<ObjectInfo>),
    File,
}

impl Classification {
    /// Classify listing results for `full_path`.
    ///
    /// No entries is a miss; a single entry equal to the path is a file;
    /// anything else is a directory.
    pub fn from_listing(objects: Vec<ObjectInfo>, full_path: &str) -> Self {
        let exact = matches!(objects.as_slice(), [only] if only.key == full_path);
        if objects.is_empty() {
            Self::NotFound
        } else if exact {
            Self::File
        } else {
            Self::Directory(objects)
        }
    }
}

/// Fallback handler serving every path of the bucket tree
pub async fn handle_request(
    State(state): State<Arc<ServeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let resolved = match resolve(uri.path(), state.config.bucket_path.as_str()) {
        Ok(resolved) => resolved,
        Err(e) => {
            debug!(
                path = e.resource.as_deref().unwrap_or_default(),
                error = %e,
                "Rejecting malformed request path"
            );
            return error_response(&e);
        }
    };

    debug!(
        method = %method,
        full_path = %resolved.full_path,
        directory = resolved.is_explicit_directory,
        "Static request"
    );

    match respond(&state, &method, &headers, &resolved).await {
        Ok(response) => response,
        Err(e) => {
            debug!(
                resource = e.resource.as_deref().unwrap_or_default(),
                status = e.http_status(),
                error = %e,
                "Request failed"
            );
            error_response(&e)
        }
    }
}

/// Classify `resolved` against the store and build the response
pub async fn respond(
    state: &ServeState,
    method: &Method,
    headers: &HeaderMap,
    resolved: &ResolvedRequest,
) -> Result<Response, ServeError> {
    let full_path = resolved.full_path.as_str();

    match classify(state.store.as_ref(), full_path).await? {
        Classification::NotFound => Err(ServeError::not_found(full_path)),
        Classification::Directory(_) if !resolved.is_explicit_directory => {
            Ok(redirect(&resolved.directory_location()))
        }
        Classification::Directory(objects) => Ok(listing(&objects, full_path)),
        Classification::File => {
            let object = state.store.get_object(full_path).await.map_err(|e| {
                error!(key = %full_path, error = %e, "Fetching object failed");
                ServeError::fetch_failed(e.to_string()).with_resource(full_path)
            })?;
            Ok(serve_content(method, headers, object))
        }
    }
}

/// List `full_path` and classify the result.
///
/// Only an unreachable store is an error. Any other listing failure cannot
/// be told apart from an empty prefix and is classified as not found.
pub async fn classify(store: &dyn ObjectStore, full_path: &str) -> Result<Classification, ServeError> {
    let objects = match store.list_objects(full_path).await {
        Ok(objects) => objects,
        Err(StoreError::Unavailable(message)) => {
            error!(prefix = %full_path, error = %message, "Store unreachable while listing");
            return Err(ServeError::store_unavailable(message).with_resource(full_path));
        }
        Err(e) => {
            warn!(prefix = %full_path, error = %e, "Listing failed, answering as not found");
            Vec::new()
        }
    };

    Ok(Classification::from_listing(objects, full_path))
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

fn listing(objects: &[ObjectInfo], full_path: &str) -> Response {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        )],
        Body::from(format_listing(objects, full_path)),
    )
        .into_response()
}

/// Map an error to its status with an empty body
pub fn error_response(err: &ServeError) -> Response {
    StatusCode::from_u16(err.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EphemeralStorage;
    use s3static_core::ErrorCode;

    fn entry(key: &str) -> ObjectInfo {
        ObjectInfo::prefix(key)
    }

    #[test]
    fn test_classify_empty_is_not_found() {
        assert_eq!(Classification::from_listing(vec![], "a"), Classification::NotFound);
    }

    #[test]
    fn test_classify_exact_single_match_is_file() {
        assert_eq!(
            Classification::from_listing(vec![entry("docs/a.txt")], "docs/a.txt"),
            Classification::File
        );
    }

    #[test]
    fn test_classify_single_child_is_directory() {
        let objects = vec![entry("docs/")];
        assert_eq!(
            Classification::from_listing(objects.clone(), "docs"),
            Classification::Directory(objects)
        );
    }

    #[test]
    fn test_classify_exact_match_among_many_is_directory() {
        let objects = vec![entry("docs"), entry("docs/")];
        assert_eq!(
            Classification::from_listing(objects.clone(), "docs"),
            Classification::Directory(objects)
        );
    }

    #[test]
    fn test_classify_root_listing() {
        let objects = vec![entry("index.html")];
        assert_eq!(
            Classification::from_listing(objects.clone(), ""),
            Classification::Directory(objects)
        );
    }

    #[tokio::test]
    async fn test_classify_against_store() {
        let store = EphemeralStorage::new();
        store.put_object("site/index.html", "home", None);
        store.put_object("site/docs/a.md", "a", None);

        assert_eq!(classify(&store, "site/index.html").await.unwrap(), Classification::File);
        assert!(matches!(
            classify(&store, "site/docs").await.unwrap(),
            Classification::Directory(_)
        ));
        assert_eq!(classify(&store, "site/nope").await.unwrap(), Classification::NotFound);
    }

    #[test]
    fn test_error_response_status() {
        let response = error_response(&ServeError::malformed_request("bad escape"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_response(&ServeError::new(ErrorCode::StoreUnavailable, "down"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
