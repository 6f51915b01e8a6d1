//! Configuration loading.
//!
//! Depot is configured from a TOML file. The reserved `[default]` section
//! carries process-wide settings; every other section describes one
//! backend instance.
//!
//! # Example
//!
//! ```toml
//! [default]
//! plugins = []
//! connect_timeout_secs = 30
//!
//! [mirror1]
//! type = "local"
//! dest = "/srv/files"
//! base_uri = "http://files.example/"
//! name_policy = "preserve"
//! structure = ""
//! priority = 0
//! weight = 10
//!
//! [offsite]
//! type = "sftp"
//! dest = "/var/uploads"
//! base_uri = "http://offsite.example/u/"
//! name_policy = "random"
//! structure = ""
//! priority = 1
//! host = "sftp.example"
//! user = "uploader"
//! password = "hunter2"
//! ```
//!
//! Backend sections must supply `type`, `dest`, `base_uri`, `name_policy`
//! and `structure`; `priority` and `weight` default to 0. Any further
//! fields are read according to the schema the named backend type
//! registered (see [`BackendRegistry::schema`]); schema fields without a
//! default are required.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::naming::NamingPolicy;
use crate::registry::BackendRegistry;

/// Section name reserved for process-wide settings.
pub const RESERVED_SECTION: &str = "default";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// One configured storage target.
///
/// Descriptors are built once at configuration-load time and are never
/// mutated afterwards; concurrent route operations share them behind
/// [`Arc`] and each works on its own ordered copy of the list.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    /// Unique identifier (the config section name)
    pub name: String,
    /// Registry type tag (`local`, `sftp`, ...)
    pub kind: String,
    /// Backend-local directory or prefix to write under
    pub dest: String,
    /// Public URI prefix returned to callers
    pub base_uri: String,
    /// Strategy for deriving a collision-free file name
    pub name_policy: NamingPolicy,
    /// Opaque backend-specific layout hint; unused by the router
    pub structure: String,
    /// SRV priority: lower sorts first
    pub priority: u32,
    /// SRV weight among backends sharing a priority
    pub weight: u32,
    extra: HashMap<String, String>,
}

impl BackendDescriptor {
    /// Create a descriptor with empty fields and zero priority/weight.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            dest: String::new(),
            base_uri: String::new(),
            name_policy: NamingPolicy::Preserve,
            structure: String::new(),
            priority: 0,
            weight: 0,
            extra: HashMap::new(),
        }
    }

    /// Set the destination path.
    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = dest.into();
        self
    }

    /// Set the public URI prefix.
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    /// Set the naming policy.
    pub fn with_name_policy(mut self, policy: NamingPolicy) -> Self {
        self.name_policy = policy;
        self
    }

    /// Set the layout hint.
    pub fn with_structure(mut self, structure: impl Into<String>) -> Self {
        self.structure = structure.into();
        self
    }

    /// Set the SRV priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the SRV weight.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Attach a backend-type-specific attribute.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Look up a backend-type-specific attribute.
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    /// Look up an attribute the backend cannot operate without.
    pub fn require_extra(&self, key: &str) -> Result<&str> {
        self.extra(key).ok_or_else(|| {
            StoreError::Config(format!("[{}] missing required field '{}'", self.name, key))
        })
    }

    /// Public URI for a stored file's basename.
    ///
    /// The configured prefix is normalized to end with exactly one `/`.
    pub fn public_uri(&self, basename: &str) -> String {
        if self.base_uri.ends_with('/') {
            format!("{}{}", self.base_uri, basename)
        } else {
            format!("{}/{}", self.base_uri, basename)
        }
    }
}

/// An immutable configuration snapshot.
#[derive(Debug, Clone)]
pub struct Config {
    /// Plugin identifiers listed in `[default]`. Recorded for operators;
    /// extending Depot means registering the type at startup instead of
    /// loading modules at run time.
    pub plugins: Vec<String>,
    /// Bound on each candidate's `prepare` call
    pub connect_timeout: Duration,
    /// Optional deadline for a whole route operation
    pub route_timeout: Option<Duration>,
    /// Configured backends, in file order
    pub backends: Vec<Arc<BackendDescriptor>>,
}

impl Config {
    /// Load configuration from a file.
    ///
    /// The registry supplies per-type schemas for extra attributes and is
    /// consulted to reject unknown type tags at load time.
    pub fn load(path: impl AsRef<Path>, registry: &BackendRegistry) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::parse(&text, registry)
    }

    /// Parse configuration from TOML text.
    pub fn parse(text: &str, registry: &BackendRegistry) -> Result<Self> {
        let table: toml::Table = text.parse()?;

        let mut config = Config {
            plugins: Vec::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            route_timeout: None,
            backends: Vec::new(),
        };

        for (section, value) in table {
            let entries = value.as_table().ok_or_else(|| {
                StoreError::Config(format!("section '{section}' is not a table"))
            })?;

            if section == RESERVED_SECTION {
                config.read_defaults(entries)?;
                continue;
            }

            let descriptor = parse_backend(&section, entries, registry)?;
            debug!(
                backend = %descriptor.name,
                kind = %descriptor.kind,
                priority = descriptor.priority,
                weight = descriptor.weight,
                "configured backend"
            );
            config.backends.push(Arc::new(descriptor));
        }

        Ok(config)
    }

    fn read_defaults(&mut self, entries: &toml::Table) -> Result<()> {
        if let Some(value) = entries.get("plugins") {
            let list = value.as_array().ok_or_else(|| {
                StoreError::Config(format!("[{RESERVED_SECTION}] 'plugins' must be an array"))
            })?;
            for item in list {
                let name = item.as_str().ok_or_else(|| {
                    StoreError::Config(format!(
                        "[{RESERVED_SECTION}] 'plugins' entries must be strings"
                    ))
                })?;
                self.plugins.push(name.to_string());
            }
            if !self.plugins.is_empty() {
                debug!(plugins = ?self.plugins, "plugin list recorded (not loaded at run time)");
            }
        }

        if let Some(secs) = read_seconds(entries, "connect_timeout_secs")? {
            self.connect_timeout = secs;
        }
        self.route_timeout = read_seconds(entries, "route_timeout_secs")?;

        Ok(())
    }
}

fn read_seconds(entries: &toml::Table, key: &str) -> Result<Option<Duration>> {
    match entries.get(key) {
        None => Ok(None),
        Some(value) => {
            let secs = value.as_integer().filter(|s| *s > 0).ok_or_else(|| {
                StoreError::Config(format!(
                    "[{RESERVED_SECTION}] '{key}' must be a positive integer"
                ))
            })?;
            Ok(Some(Duration::from_secs(secs as u64)))
        }
    }
}

fn parse_backend(
    section: &str,
    entries: &toml::Table,
    registry: &BackendRegistry,
) -> Result<BackendDescriptor> {
    let kind = required_str(section, entries, "type")?;
    let schema = registry.schema(&kind).ok_or_else(|| {
        StoreError::Config(format!("[{section}] unknown backend type '{kind}'"))
    })?;

    let policy_tag = required_str(section, entries, "name_policy")?;
    let name_policy = NamingPolicy::from_tag(&policy_tag).ok_or_else(|| {
        StoreError::Config(format!(
            "[{section}] unknown name_policy '{policy_tag}' (expected random, preserve or preserve_ext)"
        ))
    })?;

    let mut descriptor = BackendDescriptor::new(section, kind)
        .with_dest(required_str(section, entries, "dest")?)
        .with_base_uri(required_str(section, entries, "base_uri")?)
        .with_name_policy(name_policy)
        .with_structure(required_str(section, entries, "structure")?)
        .with_priority(non_negative(section, entries, "priority")?)
        .with_weight(non_negative(section, entries, "weight")?);

    for field in schema {
        match entries.get(field.name) {
            Some(value) => {
                descriptor =
                    descriptor.with_extra(field.name, scalar_string(section, field.name, value)?);
            }
            None => match field.default {
                Some(default) => descriptor = descriptor.with_extra(field.name, default),
                None => {
                    return Err(StoreError::Config(format!(
                        "[{section}] missing required field '{}'",
                        field.name
                    )));
                }
            },
        }
    }

    Ok(descriptor)
}

fn required_str(section: &str, entries: &toml::Table, key: &str) -> Result<String> {
    match entries.get(key) {
        Some(value) => Ok(value
            .as_str()
            .ok_or_else(|| {
                StoreError::Config(format!("[{section}] '{key}' must be a string"))
            })?
            .to_string()),
        None => Err(StoreError::Config(format!(
            "[{section}] missing required field '{key}'"
        ))),
    }
}

fn non_negative(section: &str, entries: &toml::Table, key: &str) -> Result<u32> {
    match entries.get(key) {
        None => Ok(0),
        Some(value) => {
            let raw = value.as_integer().ok_or_else(|| {
                StoreError::Config(format!("[{section}] '{key}' must be an integer"))
            })?;
            u32::try_from(raw).map_err(|_| {
                StoreError::Config(format!("[{section}] '{key}' must be non-negative"))
            })
        }
    }
}

/// Extra attributes are carried as strings; bare integers (a numeric
/// `port`, say) are accepted and stringified.
fn scalar_string(section: &str, key: &str, value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        _ => Err(StoreError::Config(format!(
            "[{section}] '{key}' must be a string or integer"
        ))),
    }
}
