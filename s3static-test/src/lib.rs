//! Test utilities for s3static
//!
//! Provides utilities for end-to-end testing:
//! - Start the service on a random local port over any store
//! - Seed an in-memory store
//! - Issue requests without following redirects
//!
//! ## Usage
//!
//! ```rust,no_run
//! use s3static_test::TestServer;
//!
//! #[tokio::test]
//! async fn test_static() {
//!     let server = TestServer::start("").await.unwrap();
//!     server.storage().put_object("index.html", "<h1>hi</h1>", None);
//!
//!     let response = server.client().get("/index.html").await.unwrap();
//!     assert_eq!(response.status, 200);
//! }
//! ```

pub mod client;
pub mod server;

pub use client::{StaticClient, TestResponse};
pub use server::{TestError, TestServer};

/// Timeout for a single client request
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
