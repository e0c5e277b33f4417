//! Configuration management for tinyimg.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `TINYIMG_` prefix:
//!
//! - `TINYIMG_HOST` - Server bind address (default: 0.0.0.0)
//! - `TINYIMG_PORT` - Server port (default: 8080)
//! - `TINYIMG_OUTPUT_DIR` - Where converted files are written (default: ./output)
//! - `TINYIMG_PUBLIC_URL` - Base URL used in returned image links
//! - `TINYIMG_JPEG_QUALITY` - JPEG quality (default: 80)
//! - `TINYIMG_PNG_COMPRESSION` - fast, default or best (default: best)
//! - `TINYIMG_ENCODE_TIMEOUT` - Per-format encode deadline in seconds
//! - `TINYIMG_MAX_UPLOAD_BYTES` - Upload body limit (default: 10 MB)
//! - `TINYIMG_RATE_LIMIT` / `TINYIMG_RATE_BURST` - Per-client token bucket
//! - `TINYIMG_VISITOR_IDLE` / `TINYIMG_VISITOR_SWEEP` - Idle client eviction
//! - `TINYIMG_S3_BUCKET` - Upload converted files to this bucket
//! - `TINYIMG_S3_ENDPOINT`, `TINYIMG_S3_REGION`, `TINYIMG_S3_PREFIX`,
//!   `TINYIMG_S3_PRESIGN_TTL` - S3 settings
//! - `TINYIMG_CORS_ORIGINS` - Allowed origins, comma separated
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use tinyimg::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Listening on {}", config.bind_address());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::codec::{EncodeOptions, PngCompression, DEFAULT_JPEG_QUALITY};
use crate::limit::{
    RateLimiterConfig, DEFAULT_BURST, DEFAULT_IDLE_TIMEOUT, DEFAULT_RATE_PER_SEC,
    DEFAULT_SWEEP_INTERVAL,
};
use crate::storage::DEFAULT_PRESIGN_TTL_SECS;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Default upload body limit (10 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

// =============================================================================
// CLI Arguments
// =============================================================================

/// tinyimg - converts uploaded images to several compressed formats at once.
#[derive(Parser, Debug, Clone)]
#[command(name = "tinyimg")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TINYIMG_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TINYIMG_PORT")]
    pub port: u16,

    /// Directory converted files are written to.
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR, env = "TINYIMG_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Base URL clients reach this server at, used in returned image links.
    ///
    /// Defaults to `http://<host>:<port>`.
    #[arg(long, env = "TINYIMG_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Maximum accepted upload size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "TINYIMG_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    // =========================================================================
    // Encoding Configuration
    // =========================================================================
    /// JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "TINYIMG_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// PNG compression effort.
    #[arg(long, value_enum, default_value_t = PngCompression::Best, env = "TINYIMG_PNG_COMPRESSION")]
    pub png_compression: PngCompression,

    /// Per-format encode deadline in seconds. No deadline when unset.
    #[arg(long, env = "TINYIMG_ENCODE_TIMEOUT")]
    pub encode_timeout_secs: Option<u64>,

    // =========================================================================
    // Rate Limit Configuration
    // =========================================================================
    /// Sustained requests per second allowed per client.
    #[arg(long, default_value_t = DEFAULT_RATE_PER_SEC, env = "TINYIMG_RATE_LIMIT")]
    pub rate_limit_per_sec: f64,

    /// Burst size allowed per client.
    #[arg(long, default_value_t = DEFAULT_BURST, env = "TINYIMG_RATE_BURST")]
    pub rate_limit_burst: u32,

    /// Seconds after which an idle client is forgotten.
    #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT.as_secs(), env = "TINYIMG_VISITOR_IDLE")]
    pub visitor_idle_secs: u64,

    /// Seconds between idle client sweeps.
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs(), env = "TINYIMG_VISITOR_SWEEP")]
    pub visitor_sweep_secs: u64,

    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// Upload converted files to this S3 bucket and return presigned links.
    ///
    /// When unset, files are served from the output directory.
    #[arg(long, env = "TINYIMG_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, R2, etc.).
    #[arg(long, env = "TINYIMG_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "TINYIMG_S3_REGION")]
    pub s3_region: String,

    /// Key prefix inside the bucket.
    #[arg(long, env = "TINYIMG_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Lifetime of presigned links in seconds.
    #[arg(long, default_value_t = DEFAULT_PRESIGN_TTL_SECS, env = "TINYIMG_S3_PRESIGN_TTL")]
    pub s3_presign_ttl: u64,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "TINYIMG_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }

        if !(self.rate_limit_per_sec.is_finite() && self.rate_limit_per_sec > 0.0) {
            return Err("rate_limit_per_sec must be a positive number".to_string());
        }
        if self.rate_limit_burst == 0 {
            return Err("rate_limit_burst must be greater than 0".to_string());
        }
        if self.visitor_sweep_secs == 0 {
            return Err("visitor_sweep_secs must be greater than 0".to_string());
        }

        if self.encode_timeout_secs == Some(0) {
            return Err("encode_timeout_secs must be greater than 0".to_string());
        }

        if matches!(&self.s3_bucket, Some(bucket) if bucket.is_empty()) {
            return Err(
                "S3 bucket name must not be empty. Unset --s3-bucket or TINYIMG_S3_BUCKET \
                 to serve files locally"
                    .to_string(),
            );
        }
        if self.s3_bucket.is_some() && self.s3_presign_ttl == 0 {
            return Err("s3_presign_ttl must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL used when building links to locally served files.
    pub fn public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = match self.host.as_str() {
                    "0.0.0.0" | "::" => "localhost",
                    host => host,
                };
                format!("http://{}:{}", host, self.port)
            }
        }
    }

    /// Encoder quality settings.
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            jpeg_quality: self.jpeg_quality,
            png_compression: self.png_compression,
        }
    }

    /// Per-format encode deadline, if any.
    pub fn encode_timeout(&self) -> Option<Duration> {
        self.encode_timeout_secs.map(Duration::from_secs)
    }

    /// Rate limiter settings.
    pub fn limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            rate: self.rate_limit_per_sec,
            burst: self.rate_limit_burst,
            idle_timeout: Duration::from_secs(self.visitor_idle_secs),
            sweep_interval: Duration::from_secs(self.visitor_sweep_secs),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
