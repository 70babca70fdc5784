//! Static file serving out of an S3-compatible bucket
//!
//! Request paths are resolved to object keys, classified as file, directory
//! or missing from a single prefix listing, and answered with the object
//! content, an HTML listing, a redirect or an error status.

pub mod content;
pub mod handlers;
pub mod listing;
pub mod resolver;
pub mod service;
pub mod storage;

pub use handlers::ServeState;
pub use resolver::{resolve, ResolvedRequest};
pub use service::S3Static;
