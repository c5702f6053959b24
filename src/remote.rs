//! Remote file-transfer abstraction.
//!
//! The ingestion core never talks to a protocol library directly. It sees a
//! [`Transport`] that opens [`RemoteSession`]s, and sessions expose the small
//! set of operations the resolver and coordinator need: list, stat, ranged
//! read and a working-directory probe. Every stat-like answer is a
//! [`FileInfo`].
//!
//! Implementations:
//! - `local_transport`: a directory on the local disk (mirrors, development)
//! - `memory`: scripted in-memory tree with failure injection
//! - `sftp_transport`: SFTP over `ssh2`, behind the `sftp` feature

pub mod local_transport;
pub mod memory;
#[cfg(feature = "sftp")]
pub mod sftp_transport;
pub mod transport;
pub mod types;

pub use local_transport::LocalTransport;
pub use memory::MemoryTransport;
#[cfg(feature = "sftp")]
pub use sftp_transport::SftpTransport;
pub use transport::{RemoteFs, RemoteSession, Transport};
pub use types::{Credentials, DirEntry, Endpoint, FileInfo, SourceDescriptor};

/// Joins a remote directory and a child name with a single `/`.
pub fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if dir.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Last segment of a remote path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
