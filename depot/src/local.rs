//! Local filesystem backend.
//!
//! The default backend type: writes into a local directory and serves
//! the file back under the configured base URI.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, instrument};

use crate::config::BackendDescriptor;
use crate::error::{Result, StoreError};
use crate::registry::AttrField;
use crate::traits::{Backend, FileSource};

/// Backend writing to a local directory. Registry tag `local`.
#[derive(Debug)]
pub struct LocalBackend {
    descriptor: Arc<BackendDescriptor>,
}

impl LocalBackend {
    /// Extra attributes read from the config section: none.
    pub const SCHEMA: &'static [AttrField] = &[];

    /// Create a backend bound to `descriptor`.
    pub fn new(descriptor: Arc<BackendDescriptor>) -> Self {
        Self { descriptor }
    }

    fn dest(&self) -> PathBuf {
        PathBuf::from(&self.descriptor.dest)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    /// Ready when the destination is an existing, writable directory.
    #[instrument(skip(self), fields(backend = %self.descriptor.name))]
    async fn prepare(&mut self) -> Result<bool> {
        let dest = self.dest();
        match fs::metadata(&dest).await {
            Ok(meta) if meta.is_dir() => {
                if meta.permissions().readonly() {
                    debug!("destination {:?} is read-only", dest);
                    Ok(false)
                } else {
                    Ok(true)
                }
            }
            Ok(_) => {
                debug!("destination {:?} is not a directory", dest);
                Ok(false)
            }
            Err(e) => {
                debug!("destination {:?} unavailable: {}", dest, e);
                Ok(false)
            }
        }
    }

    #[instrument(skip(self, file), fields(backend = %self.descriptor.name, file = %file.basename()))]
    async fn store(&mut self, file: &FileSource) -> Result<String> {
        let dest = self.dest();
        let final_name = self
            .descriptor
            .name_policy
            .resolve(file.basename(), |candidate| dest.join(candidate).exists())?;
        let target = dest.join(&final_name);

        debug!("writing {} bytes to {:?}", file.len(), target);
        fs::write(&target, file.data())
            .await
            .map_err(|source| StoreError::StoreFailure {
                backend: self.descriptor.name.clone(),
                source,
            })?;

        Ok(self.descriptor.public_uri(&final_name))
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
