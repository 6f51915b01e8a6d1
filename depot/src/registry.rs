//! Backend type registry.
//!
//! Maps a configuration type tag to a constructor and an attribute
//! schema. Registration happens explicitly at process startup —
//! [`BackendRegistry::builtin`] wires up the bundled types — never as a
//! side effect of defining a backend.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::BackendDescriptor;
use crate::error::{Result, StoreError};
use crate::local::LocalBackend;
use crate::sftp::SftpBackend;
use crate::traits::Backend;

/// One attribute a backend type reads from its config section.
///
/// A field without a default is required.
#[derive(Debug, Clone, Copy)]
pub struct AttrField {
    /// Config key name
    pub name: &'static str,
    /// Value used when the config section omits the key
    pub default: Option<&'static str>,
}

/// Constructor for a backend type, bound to a descriptor per route attempt.
pub type BackendCtor =
    Box<dyn Fn(Arc<BackendDescriptor>) -> Result<Box<dyn Backend>> + Send + Sync>;

struct RegisteredType {
    ctor: BackendCtor,
    schema: &'static [AttrField],
}

/// Registry of available backend types.
///
/// Populated once at startup and read-only afterwards, so it can be
/// shared freely across concurrent route operations.
pub struct BackendRegistry {
    types: HashMap<String, RegisteredType>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Create a registry with the bundled `local` and `sftp` types.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            "local",
            Box::new(|descriptor| Ok(Box::new(LocalBackend::new(descriptor)) as Box<dyn Backend>)),
            LocalBackend::SCHEMA,
        );
        registry.register(
            "sftp",
            Box::new(|descriptor| {
                Ok(Box::new(SftpBackend::new(descriptor)?) as Box<dyn Backend>)
            }),
            SftpBackend::SCHEMA,
        );
        registry
    }

    /// Record a backend type under `tag`.
    ///
    /// A second registration for the same tag replaces the first.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        ctor: BackendCtor,
        schema: &'static [AttrField],
    ) {
        self.types
            .insert(tag.into(), RegisteredType { ctor, schema });
    }

    /// Instantiate a fresh backend bound to `descriptor`.
    pub fn construct(
        &self,
        tag: &str,
        descriptor: Arc<BackendDescriptor>,
    ) -> Result<Box<dyn Backend>> {
        let registered = self
            .types
            .get(tag)
            .ok_or_else(|| StoreError::Config(format!("unknown backend type '{tag}'")))?;
        (registered.ctor)(descriptor)
    }

    /// The attribute schema registered for `tag`.
    pub fn schema(&self, tag: &str) -> Option<&'static [AttrField]> {
        self.types.get(tag).map(|t| t.schema)
    }

    /// Whether `tag` is registered.
    pub fn contains(&self, tag: &str) -> bool {
        self.types.contains_key(tag)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
