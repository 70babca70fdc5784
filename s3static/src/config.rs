//! Command line and environment configuration

use clap::Parser;
use s3static_core::{ConfigError, ServeConfig, StoreConfig};

/// Flags override environment variables, which override defaults
#[derive(Parser, Debug, Clone)]
#[command(name = "s3static")]
#[command(about = "Serve an S3-compatible bucket as a static file tree", long_about = None)]
pub struct Args {
    /// AWS S3 compatible server endpoint
    #[arg(long, default_value = "", env = "S3_ENDPOINT")]
    pub endpoint: String,

    /// Bucket name with static files
    #[arg(long, default_value = "", env = "S3_BUCKET")]
    pub bucket: String,

    /// Bucket path to serve static files from
    #[arg(long, alias = "bucketPath", default_value = "", env = "S3_BUCKET_PATH")]
    pub bucket_path: String,

    /// Access key for server
    #[arg(long, alias = "accessKey", default_value = "", env = "S3_ACCESS_KEY")]
    pub access_key: String,

    /// Secret key for server
    #[arg(long, alias = "secretKey", default_value = "", env = "S3_SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Bind to a specific ADDRESS:PORT, ADDRESS can be an IP or hostname
    #[arg(long, default_value = "127.0.0.1:8080", env = "S3_ADDRESS")]
    pub address: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "S3_LOG_LEVEL")]
    pub log_level: String,
}

/// Validated startup configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub address: String,
    pub serve: ServeConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Validate `args`; nothing is bound or connected yet
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let store = StoreConfig::new(
            &args.endpoint,
            &args.bucket,
            args.access_key.clone(),
            args.secret_key.clone(),
        )?;

        Ok(Self {
            address: args.address.clone(),
            serve: ServeConfig::new(&args.bucket_path),
            store,
        })
    }
}
