//! Core types for s3static
//!
//! This crate provides the error taxonomy and the immutable startup
//! configuration shared by the server and the binary.

pub mod config;
pub mod error;
pub mod path;

pub use config::{BucketPath, ConfigError, ServeConfig, StoreConfig};
pub use error::{ErrorCode, ServeError};
pub use path::clean;
