//! HTTP front end for the refmatch lookup engine.
//!
//! One shared [`matcher::LookupEngine`] serves both single lookups and whole
//! file runs through the batch pipeline.
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Endpoints
//!
//! - `GET /` - API information
//! - `GET /health` - liveness check
//! - `GET /ready` - readiness check with index size, load counters and cache counters
//! - `POST /lookup` - `{"search_string": "..."}` to a match result
//! - `POST /process-file` - `{"input_file_path": "...", "search_columns": [...]}`
//!   runs the pipeline and replaces the file with its processed form
//!
//! Errors use the envelope `{"error": {"code": "...", "message": "..."}}`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
