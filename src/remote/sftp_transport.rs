use std::io::{Read, Seek, SeekFrom};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use log::{debug, warn};
use ssh2::{ErrorCode, FileStat, Session, Sftp};

use super::transport::{RemoteFs, RemoteSession, Transport};
use super::types::{Credentials, DirEntry, Endpoint, FileInfo};
use crate::error_handling::types::TransportError;

// libssh2 session error codes
const LIBSSH2_ERROR_SOCKET_SEND: i32 = -7;
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_SOCKET_DISCONNECT: i32 = -13;
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;
const LIBSSH2_ERROR_SOCKET_RECV: i32 = -43;

// SFTP status codes
const SFTP_NO_SUCH_FILE: i32 = 2;
const SFTP_PERMISSION_DENIED: i32 = 3;
const SFTP_NO_SUCH_PATH: i32 = 10;

fn map_ssh_error(err: ssh2::Error) -> TransportError {
    let message = err.message().to_string();
    match err.code() {
        ErrorCode::Session(LIBSSH2_ERROR_AUTHENTICATION_FAILED) => {
            TransportError::AuthenticationFailed(message)
        }
        ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => TransportError::Timeout(message),
        ErrorCode::Session(
            LIBSSH2_ERROR_SOCKET_DISCONNECT | LIBSSH2_ERROR_SOCKET_SEND | LIBSSH2_ERROR_SOCKET_RECV,
        ) => TransportError::ConnectionReset(message),
        ErrorCode::SFTP(SFTP_NO_SUCH_FILE | SFTP_NO_SUCH_PATH) => TransportError::NotFound(message),
        ErrorCode::SFTP(SFTP_PERMISSION_DENIED) => TransportError::PermissionDenied(message),
        _ => TransportError::Protocol(message),
    }
}

fn file_info(stat: &FileStat) -> FileInfo {
    FileInfo {
        size: stat.size.unwrap_or(0),
        mod_time: stat
            .mtime
            .and_then(|t| DateTime::from_timestamp(t as i64, 0)),
        is_dir: stat.is_dir(),
    }
}

/// SFTP over libssh2. Every blocking call runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct SftpTransport {
    connect_timeout: Duration,
}

impl SftpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

struct SftpHandle {
    session: Session,
    sftp: Sftp,
}

fn open_handle(
    endpoint: Endpoint,
    credentials: Credentials,
    timeout: Duration,
) -> Result<SftpHandle, TransportError> {
    let addr = (endpoint.bare_host(), endpoint.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| TransportError::NotFound(format!("no address for {}", endpoint)))?;
    let tcp = TcpStream::connect_timeout(&addr, timeout)?;

    let mut session = Session::new().map_err(map_ssh_error)?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
    session.handshake().map_err(map_ssh_error)?;
    session
        .userauth_password(&credentials.username, &credentials.password)
        .map_err(map_ssh_error)?;
    if !session.authenticated() {
        return Err(TransportError::AuthenticationFailed(format!(
            "{} was not accepted by {}",
            credentials.username, endpoint
        )));
    }
    let sftp = session.sftp().map_err(map_ssh_error)?;
    Ok(SftpHandle { session, sftp })
}

#[async_trait]
impl Transport for SftpTransport {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Arc<dyn RemoteSession>, TransportError> {
        let endpoint = endpoint.clone();
        let credentials = credentials.clone();
        let timeout = self.connect_timeout;
        let label = endpoint.to_string();

        let handle = tokio::task::spawn_blocking(move || open_handle(endpoint, credentials, timeout))
            .await
            .map_err(|e| TransportError::Io(format!("connect task failed: {}", e)))??;

        debug!("SFTP session established with {}", label);
        Ok(Arc::new(SftpSession {
            handle: Arc::new(Mutex::new(Some(handle))),
            label,
        }))
    }

    fn name(&self) -> &'static str {
        "sftp"
    }
}

pub struct SftpSession {
    handle: Arc<Mutex<Option<SftpHandle>>>,
    label: String,
}

impl SftpSession {
    /// Runs `op` against the SFTP channel on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T, TransportError>
    where
        T: Send + 'static,
        F: FnOnce(&Sftp) -> Result<T, TransportError> + Send + 'static,
    {
        let handle = self.handle.clone();
        tokio::task::spawn_blocking(move || {
            let guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            match guard.as_ref() {
                Some(h) => op(&h.sftp),
                None => Err(TransportError::ConnectionReset("session closed".to_string())),
            }
        })
        .await
        .map_err(|e| TransportError::Io(format!("sftp task failed: {}", e)))?
    }
}

#[async_trait]
impl RemoteFs for SftpSession {
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, TransportError> {
        let path = path.to_string();
        self.blocking(move |sftp| {
            let entries = sftp.readdir(Path::new(&path)).map_err(map_ssh_error)?;
            let mut out: Vec<DirEntry> = entries
                .into_iter()
                .filter_map(|(p, stat)| {
                    let name = p.file_name()?.to_string_lossy().into_owned();
                    if name == "." || name == ".." {
                        return None;
                    }
                    Some(DirEntry {
                        name,
                        info: file_info(&stat),
                    })
                })
                .collect();
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
        .await
    }

    async fn stat(&self, path: &str) -> Result<FileInfo, TransportError> {
        let path = path.to_string();
        self.blocking(move |sftp| {
            let stat = sftp.stat(Path::new(&path)).map_err(map_ssh_error)?;
            Ok(file_info(&stat))
        })
        .await
    }
}

#[async_trait]
impl RemoteSession for SftpSession {
    async fn read_range(
        &self,
        path: &str,
        offset: u64,
        max_len: Option<u64>,
    ) -> Result<Vec<u8>, TransportError> {
        let path = path.to_string();
        self.blocking(move |sftp| {
            let mut file = sftp.open(Path::new(&path)).map_err(map_ssh_error)?;
            file.seek(SeekFrom::Start(offset))?;
            let mut buf = Vec::new();
            match max_len {
                Some(len) => {
                    file.take(len).read_to_end(&mut buf)?;
                }
                None => {
                    file.read_to_end(&mut buf)?;
                }
            }
            Ok(buf)
        })
        .await
    }

    async fn working_dir(&self) -> Result<String, TransportError> {
        self.blocking(|sftp| {
            let dir = sftp.realpath(Path::new(".")).map_err(map_ssh_error)?;
            Ok(dir.to_string_lossy().into_owned())
        })
        .await
    }

    async fn close(&self) {
        let handle = self.handle.clone();
        let label = self.label.clone();
        let result = tokio::task::spawn_blocking(move || {
            let taken = handle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(h) = taken {
                drop(h.sftp);
                if let Err(e) = h.session.disconnect(None, "closing", None) {
                    debug!("Disconnect from {} reported: {}", label, e);
                }
            }
        })
        .await;
        if let Err(e) = result {
            warn!("Closing SFTP session {} failed: {}", self.label, e);
        }
    }
}
