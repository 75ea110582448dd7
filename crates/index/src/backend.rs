use crate::IndexError;
use std::collections::BTreeMap;
use std::ops::{Bound, ControlFlow};
use std::sync::RwLock;

/// Visitor invoked once per key found by [`IndexBackend::scan_prefix`].
///
/// Returning `ControlFlow::Break(())` stops the scan early.
pub type KeyVisitor<'a> = dyn FnMut(&str) -> Result<ControlFlow<()>, IndexError> + 'a;

/// Trait for an ordered key-value storage backend for the prefix index.
/// This allows for different storage implementations (e.g., in-memory, Redb).
///
/// Implementations must iterate keys in ascending byte order; the lookup
/// engine's first-match policy depends on it.
pub trait IndexBackend: Send + Sync {
    /// Insert or overwrite many keys in one atomic transaction.
    fn batch_put(&self, entries: &[(String, Vec<u8>)]) -> Result<(), IndexError>;
    /// Check whether a key is present.
    fn contains(&self, key: &str) -> Result<bool, IndexError>;
    /// Visit every key starting with `prefix`, in ascending key order.
    fn scan_prefix(&self, prefix: &str, visitor: &mut KeyVisitor<'_>) -> Result<(), IndexError>;
    /// Number of stored keys.
    fn len(&self) -> Result<u64, IndexError>;
    /// Flush any buffered writes to the backend.
    fn flush(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

/// Configuration for selecting and building a backend.
///
/// # Example
/// ```
/// use index::BackendConfig;
///
/// // In-memory (for testing)
/// let config = BackendConfig::in_memory();
///
/// // Redb (durable)
/// let config = BackendConfig::redb("/data/lookup.redb");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BackendConfig {
    /// Use Redb for storage. The `path` is the file path for the database.
    ///
    /// Requires the `backend-redb` feature (enabled by default).
    Redb { path: String },
    /// Use an in-memory ordered map. Useful for tests and one-off runs.
    #[default]
    InMemory,
}

impl BackendConfig {
    /// Create an in-memory backend configuration.
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    /// Create a Redb backend configuration.
    pub fn redb<P: Into<String>>(path: P) -> Self {
        BackendConfig::Redb { path: path.into() }
    }

    /// Build the backend based on the configuration.
    ///
    /// Opening a durable store that cannot be created or read yields
    /// [`IndexError::StoreUnavailable`].
    pub fn build(&self) -> Result<Box<dyn IndexBackend>, IndexError> {
        match self {
            BackendConfig::InMemory => Ok(Box::new(InMemoryBackend::new())),
            BackendConfig::Redb { path } => {
                #[cfg(feature = "backend-redb")]
                {
                    Ok(Box::new(RedbBackend::open(path)?))
                }
                #[cfg(not(feature = "backend-redb"))]
                {
                    let _ = path;
                    Err(IndexError::unavailable(
                        "redb backend disabled at compile time",
                    ))
                }
            }
        }
    }
}

/// An in-memory backend using a `RwLock` around a `BTreeMap`.
///
/// The map is ordered so prefix scans behave exactly like the durable store.
pub struct InMemoryBackend {
    keys: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBackend for InMemoryBackend {
    fn batch_put(&self, entries: &[(String, Vec<u8>)]) -> Result<(), IndexError> {
        // A single write lock is held for the entire batch insert.
        let mut guard = self
            .keys
            .write()
            .map_err(|_| IndexError::io("poisoned lock"))?;
        for (key, value) in entries {
            guard.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, IndexError> {
        let guard = self
            .keys
            .read()
            .map_err(|_| IndexError::io("poisoned lock"))?;
        Ok(guard.contains_key(key))
    }

    fn scan_prefix(&self, prefix: &str, visitor: &mut KeyVisitor<'_>) -> Result<(), IndexError> {
        let guard = self
            .keys
            .read()
            .map_err(|_| IndexError::io("poisoned lock"))?;
        let bucket = guard
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(k, _)| k);
        for key in bucket {
            if !key.starts_with(prefix) {
                break;
            }
            if visitor(key)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    fn len(&self) -> Result<u64, IndexError> {
        let guard = self
            .keys
            .read()
            .map_err(|_| IndexError::io("poisoned lock"))?;
        Ok(guard.len() as u64)
    }
}

/// The Redb backend implementation.
#[cfg(feature = "backend-redb")]
pub mod redb;

#[cfg(feature = "backend-redb")]
pub use redb::RedbBackend;

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(backend: &dyn IndexBackend, prefix: &str) -> Vec<String> {
        let mut keys = Vec::new();
        backend
            .scan_prefix(prefix, &mut |key| {
                keys.push(key.to_string());
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();
        keys
    }

    #[test]
    fn in_memory_scan_is_ordered_and_bounded() {
        let backend = InMemoryBackend::new();
        backend
            .batch_put(&[
                ("abd:abdul".to_string(), vec![1]),
                ("abc:abc corp".to_string(), vec![1]),
                ("abc:abc".to_string(), vec![1]),
                ("abe:abe".to_string(), vec![1]),
            ])
            .unwrap();

        assert_eq!(collect(&backend, "abc:"), vec!["abc:abc", "abc:abc corp"]);
        assert!(collect(&backend, "zzz:").is_empty());
        assert_eq!(backend.len().unwrap(), 4);
    }

    #[test]
    fn in_memory_scan_stops_on_break() {
        let backend = InMemoryBackend::new();
        backend
            .batch_put(&[
                ("jan:jane".to_string(), vec![1]),
                ("jan:janet".to_string(), vec![1]),
            ])
            .unwrap();

        let mut seen = 0;
        backend
            .scan_prefix("jan:", &mut |_| {
                seen += 1;
                Ok(ControlFlow::Break(()))
            })
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    fn in_memory_contains() {
        let backend = InMemoryBackend::new();
        backend
            .batch_put(&[("doe:doe".to_string(), vec![1])])
            .unwrap();
        assert!(backend.contains("doe:doe").unwrap());
        assert!(!backend.contains("doe:does").unwrap());
    }
}
