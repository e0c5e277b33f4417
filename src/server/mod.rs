//! HTTP server layer for tinyimg.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │  POST /upload  GET /image  POST /download-all  GET /stats       │
//! │  GET /health                                                    │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │  throttle   │  │        routes           │  │
//! │  │ (requests)  │  │ (per-IP     │  │  (router config)        │  │
//! │  │             │  │  buckets)   │  │                         │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;
pub mod throttle;

pub use handlers::{
    download_all_handler, health_handler, image_handler, is_safe_file_name, stats_handler,
    upload_handler, AppState, DownloadAllRequest, ErrorResponse, HealthResponse,
    ImageQueryParams, UploadResponse,
};
pub use routes::{create_router, RouterConfig};
pub use throttle::{client_identity, rate_limit_middleware, UNKNOWN_CLIENT};
