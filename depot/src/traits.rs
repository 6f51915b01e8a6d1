//! Core backend trait definition.
//!
//! A `Backend` is a live storage target bound to one configured
//! [`BackendDescriptor`](crate::BackendDescriptor). Instances are created
//! per route attempt, driven through the two-phase `prepare`/`store`
//! protocol, and discarded once the attempt completes.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, StoreError};

/// An incoming file: a display name plus its bytes.
///
/// The router never inspects the bytes; it only forwards them to the
/// backend that wins selection.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    data: Bytes,
}

impl FileSource {
    /// Create a file source from an in-memory payload.
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Read a file from the local filesystem.
    ///
    /// The display name is the path's final component.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                StoreError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} has no file name", path.display()),
                ))
            })?;
        let data = tokio::fs::read(path).await?;
        Ok(Self::new(name, data))
    }

    /// The display name as given.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The display name with any directory components stripped.
    pub fn basename(&self) -> &str {
        self.name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.name)
    }

    /// The file contents.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A configured storage target exposing the two-phase store protocol.
///
/// # Contract
///
/// `prepare` is always called first. It returns `Ok(false)` for ordinary
/// unavailability (unreachable host, missing directory, rejected
/// credentials) and reserves `Err` for programmer or configuration
/// errors. A backend that acquires a resource during `prepare` (an SFTP
/// session, say) owns it and must release it on every exit path of the
/// subsequent `store` call, or on drop if `store` never runs.
///
/// `store` resolves the final name through the descriptor's naming
/// policy, writes all bytes, and returns the public URI for the stored
/// file. Write failures are terminal for the route operation.
#[async_trait]
pub trait Backend: Send {
    /// Probe readiness, acquiring any connection the write will need.
    async fn prepare(&mut self) -> Result<bool>;

    /// Write the file and return the URI it can be fetched from.
    async fn store(&mut self, file: &FileSource) -> Result<String>;

    /// Short identifier for this backend type.
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_basename_plain() {
        let file = FileSource::new("note.txt", &b"hi"[..]);
        assert_eq!(file.basename(), "note.txt");
    }

    #[test]
    fn test_basename_strips_directories() {
        let file = FileSource::new("/var/uploads/note.txt", &b"hi"[..]);
        assert_eq!(file.basename(), "note.txt");

        let file = FileSource::new("C:\\uploads\\note.txt", &b"hi"[..]);
        assert_eq!(file.basename(), "note.txt");
    }

    #[test]
    fn test_len() {
        let file = FileSource::new("note.txt", &b"hello"[..]);
        assert_eq!(file.len(), 5);
        assert!(!file.is_empty());
    }

    #[tokio::test]
    async fn test_open_reads_name_and_bytes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("payload.bin");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"payload bytes").unwrap();

        let file = FileSource::open(&path).await.unwrap();
        assert_eq!(file.name(), "payload.bin");
        assert_eq!(file.data().as_ref(), b"payload bytes");
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = FileSource::open(dir.path().join("missing.bin")).await;
        assert!(matches!(result.unwrap_err(), StoreError::Io(_)));
    }
}
