//! Route orchestration.
//!
//! A route operation draws a fresh weighted ordering of the configured
//! backends, then walks the candidates: construct, `prepare`, and on the
//! first ready backend, `store`. A failed readiness probe falls through
//! to the next candidate; a failed write does not.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::registry::BackendRegistry;
use crate::selector::order_backends;
use crate::traits::FileSource;

/// Environment variable naming the configuration file for [`route_store`].
pub const CONFIG_ENV: &str = "DEPOT_CONFIG_FILE";

/// Routes files to configured backends.
///
/// Holds only read-only state, so one router serves arbitrarily many
/// concurrent route operations.
pub struct StorageRouter {
    registry: Arc<BackendRegistry>,
    config: Arc<Config>,
}

impl StorageRouter {
    /// Create a router over a registry and a configuration snapshot.
    pub fn new(registry: Arc<BackendRegistry>, config: Arc<Config>) -> Self {
        Self { registry, config }
    }

    /// The configuration snapshot this router serves.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Store `file` on the first backend that accepts it and return the
    /// URI it can be fetched from.
    ///
    /// # Errors
    ///
    /// - [`StoreError::BackendUnavailable`] when every candidate fails
    ///   its readiness probe, or the configured route deadline elapses.
    /// - [`StoreError::StoreFailure`] when the chosen backend's write
    ///   fails; the remaining candidates are not attempted.
    /// - [`StoreError::Config`] when a candidate cannot be constructed.
    #[instrument(skip(self, file), fields(file = %file.basename()))]
    pub async fn route_store(&self, file: &FileSource) -> Result<String> {
        match self.config.route_timeout {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.try_candidates(file)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!("route deadline {:?} elapsed", deadline);
                        Err(StoreError::BackendUnavailable)
                    }
                }
            }
            None => self.try_candidates(file).await,
        }
    }

    async fn try_candidates(&self, file: &FileSource) -> Result<String> {
        let ordered = order_backends(&self.config.backends, &mut rand::rng());

        for descriptor in ordered {
            let mut backend = self
                .registry
                .construct(&descriptor.kind, Arc::clone(&descriptor))?;

            let ready =
                match tokio::time::timeout(self.config.connect_timeout, backend.prepare()).await {
                    Ok(ready) => ready?,
                    Err(_) => {
                        warn!(
                            backend = %descriptor.name,
                            "prepare timed out after {:?}",
                            self.config.connect_timeout
                        );
                        false
                    }
                };

            if !ready {
                debug!(backend = %descriptor.name, "not ready, trying next candidate");
                continue;
            }

            debug!(backend = %descriptor.name, "backend selected");
            return backend.store(file).await;
        }

        Err(StoreError::BackendUnavailable)
    }
}

/// Store a file using the configuration named by [`CONFIG_ENV`].
///
/// This is the process-boundary entry point; fails with a configuration
/// error when the variable is unset or the file is unreadable.
pub async fn route_store(file: &FileSource) -> Result<String> {
    let path = std::env::var(CONFIG_ENV).map_err(|_| {
        StoreError::Config(format!("{CONFIG_ENV} environment variable not set"))
    })?;
    store_with_config(Path::new(&path), file).await
}

/// Store a file using an explicit configuration file.
pub async fn store_with_config(config_path: &Path, file: &FileSource) -> Result<String> {
    let registry = Arc::new(BackendRegistry::builtin());
    let config = Config::load(config_path, &registry)?;
    let router = StorageRouter::new(registry, Arc::new(config));
    router.route_store(file).await
}
