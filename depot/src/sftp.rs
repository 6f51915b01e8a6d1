//! SFTP backend.
//!
//! Writes over an SSH session established during `prepare`. libssh2 is a
//! blocking library, so every session operation runs inside
//! [`tokio::task::spawn_blocking`]; the session moves into the blocking
//! task and back between the two phases.
//!
//! # Configuration
//!
//! ```toml
//! [offsite]
//! type = "sftp"
//! dest = "/var/uploads"
//! base_uri = "http://offsite.example/u/"
//! name_policy = "random"
//! structure = ""
//! priority = 1
//! host = "sftp.example"
//! port = 22
//! user = "uploader"
//! password = "hunter2"
//! ```

use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ssh2::{Session, Sftp};
use tokio::task;
use tracing::{debug, instrument};

use crate::config::BackendDescriptor;
use crate::error::{Result, StoreError};
use crate::registry::AttrField;
use crate::traits::{Backend, FileSource};

/// Hard cap on the TCP dial; the router's configured connect timeout
/// gives up sooner, this bounds the blocking thread itself.
const DIAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend writing over SFTP. Registry tag `sftp`.
pub struct SftpBackend {
    descriptor: Arc<BackendDescriptor>,
    host: String,
    port: u16,
    user: String,
    password: String,
    conn: Option<SftpConn>,
}

/// A live session; dropping it closes the transport, so a connection
/// acquired by `prepare` is released even when `store` never runs.
struct SftpConn {
    session: Session,
    sftp: Sftp,
}

impl SftpBackend {
    /// Extra attributes read from the config section.
    pub const SCHEMA: &'static [AttrField] = &[
        AttrField {
            name: "host",
            default: None,
        },
        AttrField {
            name: "port",
            default: Some("22"),
        },
        AttrField {
            name: "user",
            default: None,
        },
        AttrField {
            name: "password",
            default: None,
        },
    ];

    /// Create a backend bound to `descriptor`.
    ///
    /// Fails with a configuration error when a required attribute is
    /// missing or the port is not a valid TCP port.
    pub fn new(descriptor: Arc<BackendDescriptor>) -> Result<Self> {
        let host = descriptor.require_extra("host")?.to_string();
        let user = descriptor.require_extra("user")?.to_string();
        let password = descriptor.require_extra("password")?.to_string();
        let port = descriptor
            .require_extra("port")?
            .parse::<u16>()
            .map_err(|_| {
                StoreError::Config(format!(
                    "[{}] 'port' must be a TCP port number",
                    descriptor.name
                ))
            })?;
        Ok(Self {
            descriptor,
            host,
            port,
            user,
            password,
            conn: None,
        })
    }
}

#[async_trait]
impl Backend for SftpBackend {
    /// Connect, authenticate and open the SFTP channel.
    ///
    /// Any transport or authentication failure is ordinary
    /// unavailability: logged, reported as `Ok(false)`.
    #[instrument(skip(self), fields(backend = %self.descriptor.name, host = %self.host))]
    async fn prepare(&mut self) -> Result<bool> {
        let host = self.host.clone();
        let port = self.port;
        let user = self.user.clone();
        let password = self.password.clone();

        let dialed = task::spawn_blocking(move || dial(&host, port, &user, &password))
            .await
            .map_err(|e| StoreError::Io(io::Error::other(e)))?;

        match dialed {
            Ok(Some(conn)) => {
                debug!("sftp session established");
                self.conn = Some(conn);
                Ok(true)
            }
            Ok(None) => {
                debug!("authentication rejected");
                Ok(false)
            }
            Err(e) => {
                debug!("sftp unavailable: {}", e);
                Ok(false)
            }
        }
    }

    #[instrument(skip(self, file), fields(backend = %self.descriptor.name, file = %file.basename()))]
    async fn store(&mut self, file: &FileSource) -> Result<String> {
        let conn = self.conn.take().ok_or_else(|| {
            StoreError::Io(io::Error::other("store called before successful prepare"))
        })?;
        let descriptor = Arc::clone(&self.descriptor);
        let desired = file.basename().to_string();
        let data = file.data().clone();

        task::spawn_blocking(move || {
            let result = write_remote(&conn, &descriptor, &desired, &data);
            // teardown on success and failure alike
            let _ = conn.session.disconnect(None, "done", None);
            result
        })
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e)))?
    }

    fn backend_name(&self) -> &'static str {
        "sftp"
    }
}

/// Establish and authenticate a session.
///
/// `Ok(None)` means the server rejected the credentials.
fn dial(host: &str, port: u16, user: &str, password: &str) -> io::Result<Option<SftpConn>> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{host} does not resolve")))?;
    let tcp = TcpStream::connect_timeout(&addr, DIAL_TIMEOUT)?;

    let mut session = Session::new().map_err(io::Error::other)?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(io::Error::other)?;
    session
        .userauth_password(user, password)
        .map_err(io::Error::other)?;
    if !session.authenticated() {
        return Ok(None);
    }

    let sftp = session.sftp().map_err(io::Error::other)?;
    Ok(Some(SftpConn { session, sftp }))
}

fn write_remote(
    conn: &SftpConn,
    descriptor: &BackendDescriptor,
    desired: &str,
    data: &[u8],
) -> Result<String> {
    let final_name = descriptor.name_policy.resolve(desired, |candidate| {
        let probe = remote_path(&descriptor.dest, candidate);
        conn.sftp.stat(Path::new(&probe)).is_ok()
    })?;
    let target = remote_path(&descriptor.dest, &final_name);

    debug!(
        backend = %descriptor.name,
        "writing {} bytes to {}",
        data.len(),
        target
    );
    let mut remote = conn
        .sftp
        .create(Path::new(&target))
        .map_err(|e| store_failure(descriptor, io::Error::other(e)))?;
    remote
        .write_all(data)
        .map_err(|e| store_failure(descriptor, e))?;

    Ok(descriptor.public_uri(&final_name))
}

fn store_failure(descriptor: &BackendDescriptor, source: io::Error) -> StoreError {
    StoreError::StoreFailure {
        backend: descriptor.name.clone(),
        source,
    }
}

/// Remote trees are unix-style; join with `/` regardless of the host OS.
fn remote_path(dest: &str, name: &str) -> String {
    format!("{}/{}", dest.trim_end_matches('/'), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingPolicy;

    fn descriptor() -> BackendDescriptor {
        BackendDescriptor::new("offsite", "sftp")
            .with_dest("/var/uploads/")
            .with_base_uri("http://offsite.example/u/")
            .with_name_policy(NamingPolicy::Random)
            .with_extra("host", "sftp.example")
            .with_extra("port", "22")
            .with_extra("user", "uploader")
            .with_extra("password", "hunter2")
    }

    #[test]
    fn test_new_reads_attributes() {
        let backend = SftpBackend::new(Arc::new(descriptor())).unwrap();
        assert_eq!(backend.host, "sftp.example");
        assert_eq!(backend.port, 22);
        assert_eq!(backend.user, "uploader");
        assert_eq!(backend.backend_name(), "sftp");
    }

    #[test]
    fn test_new_rejects_missing_host() {
        let desc = BackendDescriptor::new("offsite", "sftp")
            .with_dest("/var/uploads")
            .with_base_uri("http://offsite.example/u/")
            .with_extra("port", "22")
            .with_extra("user", "uploader")
            .with_extra("password", "hunter2");
        let err = SftpBackend::new(Arc::new(desc)).err().unwrap();
        assert!(err.is_config());
        assert!(err.to_string().contains("'host'"));
    }

    #[test]
    fn test_new_rejects_bad_port() {
        let desc = descriptor().with_extra("port", "not-a-port");
        let err = SftpBackend::new(Arc::new(desc)).err().unwrap();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_remote_path_joins_with_single_slash() {
        assert_eq!(remote_path("/var/uploads/", "f.txt"), "/var/uploads/f.txt");
        assert_eq!(remote_path("/var/uploads", "f.txt"), "/var/uploads/f.txt");
    }

    #[tokio::test]
    async fn test_store_before_prepare_is_an_error() {
        let mut backend = SftpBackend::new(Arc::new(descriptor())).unwrap();
        let file = FileSource::new("note.txt", &b"x"[..]);
        let err = backend.store(&file).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[tokio::test]
    async fn test_prepare_unreachable_host_is_unavailable() {
        // RFC 5737 TEST-NET address: connect fails fast, never succeeds
        let desc = descriptor().with_extra("host", "192.0.2.1").with_extra("port", "2222");
        let mut backend = SftpBackend::new(Arc::new(desc)).unwrap();
        let ready = tokio::time::timeout(Duration::from_secs(40), backend.prepare())
            .await
            .expect("dial must be bounded")
            .unwrap();
        assert!(!ready);
    }
}
