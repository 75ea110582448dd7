use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use matcher::LookupEngine;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Lookup engine shared by every request and every pipeline worker
    pub engine: Arc<LookupEngine>,
}

impl ServerState {
    /// Open the configured index and load the reference file into it.
    ///
    /// Without a `lookup_file` the index is opened as-is, which serves an
    /// existing redb store built by an earlier run.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let index_cfg = config.index.to_index_config();
        let engine = match &config.lookup_file {
            Some(path) => refmatch::build_engine(index_cfg, config.cache, path).map_err(
                |err| ServerError::Config(format!("failed to build lookup engine: {err}")),
            )?,
            None => {
                let index = index::PrefixIndex::new(index_cfg)?;
                LookupEngine::with_index_arc(Arc::new(index), config.cache)
            }
        };

        Ok(Self::with_engine(config, Arc::new(engine)))
    }

    /// Wrap an already-built engine, e.g. one preloaded by a test.
    pub fn with_engine(config: ServerConfig, engine: Arc<LookupEngine>) -> Self {
        Self {
            config: Arc::new(config),
            engine,
        }
    }
}

/// Server metadata for health checks
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub uptime_seconds: u64,
}
