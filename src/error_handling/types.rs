use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    SourcesInvalid(String),
    BadPath(String),
    NotInRange(String),
    UnsupportedTransport(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::SourcesInvalid(e) => write!(f, "Sources configuration error: {}", e),
            ConfigError::BadPath(e) => write!(f, "Path error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::UnsupportedTransport(e) => write!(f, "Unsupported transport: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failures reported by a transport implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout(String),
    ConnectionReset(String),
    AuthenticationFailed(String),
    NotFound(String),
    PermissionDenied(String),
    Io(String),
    Protocol(String),
}

impl TransportError {
    /// Timeouts, resets and plain I/O failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout(_) | TransportError::ConnectionReset(_) | TransportError::Io(_)
        )
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, TransportError::AuthenticationFailed(_))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout(e) => write!(f, "Transport timeout: {}", e),
            TransportError::ConnectionReset(e) => write!(f, "Connection reset: {}", e),
            TransportError::AuthenticationFailed(e) => write!(f, "Authentication failed: {}", e),
            TransportError::NotFound(e) => write!(f, "Remote path not found: {}", e),
            TransportError::PermissionDenied(e) => write!(f, "Permission denied: {}", e),
            TransportError::Io(e) => write!(f, "Transport IO error: {}", e),
            TransportError::Protocol(e) => write!(f, "Transport protocol error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => TransportError::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                TransportError::PermissionDenied(err.to_string())
            }
            std::io::ErrorKind::TimedOut => TransportError::Timeout(err.to_string()),
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                TransportError::ConnectionReset(err.to_string())
            }
            _ => TransportError::Io(err.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum ConnectionError {
    AuthenticationFailed(String),
    RetriesExhausted { attempts: u32, last_error: TransportError },
    OperationInProgress { source_id: String, operation: String, path: String },
    SessionDead(String),
    Transport(TransportError),
}

impl ConnectionError {
    pub fn is_authentication(&self) -> bool {
        match self {
            ConnectionError::AuthenticationFailed(_) => true,
            ConnectionError::Transport(e) => e.is_authentication(),
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::AuthenticationFailed(e) => write!(f, "Authentication failed: {}", e),
            ConnectionError::RetriesExhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "Connection failed after {} attempt(s): {}",
                attempts, last_error
            ),
            ConnectionError::OperationInProgress {
                source_id,
                operation,
                path,
            } => write!(
                f,
                "Operation {} already in progress for source {} on {}",
                operation, source_id, path
            ),
            ConnectionError::SessionDead(e) => write!(f, "Session is dead: {}", e),
            ConnectionError::Transport(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<TransportError> for ConnectionError {
    fn from(err: TransportError) -> Self {
        if err.is_authentication() {
            ConnectionError::AuthenticationFailed(err.to_string())
        } else {
            ConnectionError::Transport(err)
        }
    }
}

#[derive(Debug)]
pub enum ResolveError {
    NotFound { attempted: Vec<String> },
    Traversal(String),
    Transport(TransportError),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound { attempted } => write!(
                f,
                "No remote target found after {} attempt(s): [{}]",
                attempted.len(),
                attempted.join(", ")
            ),
            ResolveError::Traversal(e) => write!(f, "Path escapes the source root: {}", e),
            ResolveError::Transport(e) => write!(f, "Transport error during resolution: {}", e),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<TransportError> for ResolveError {
    fn from(err: TransportError) -> Self {
        ResolveError::Transport(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidTimestamp(String),
    TooFewFields { line: usize, count: usize },
    Malformed { line: usize, reason: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidTimestamp(e) => write!(f, "Unrecognised timestamp: '{}'", e),
            ParseError::TooFewFields { line, count } => {
                write!(f, "Line {} has too few fields ({})", line, count)
            }
            ParseError::Malformed { line, reason } => {
                write!(f, "Line {} is malformed: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed,
    WriteFailed,
    ReadFailed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed => write!(f, "Storage connection failed"),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum IngestError {
    UnknownSource(String),
    MissingCredentials(String),
    SourceDisabled(String),
    Connection(ConnectionError),
    Resolve(ResolveError),
    Storage(StorageError),
    TimedOut(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::UnknownSource(e) => write!(f, "Unknown source: {}", e),
            IngestError::MissingCredentials(e) => write!(f, "Missing credentials for source {}", e),
            IngestError::SourceDisabled(e) => write!(f, "Source disabled: {}", e),
            IngestError::Connection(e) => write!(f, "Connection error: {}", e),
            IngestError::Resolve(e) => write!(f, "Resolution error: {}", e),
            IngestError::Storage(e) => write!(f, "Storage error: {}", e),
            IngestError::TimedOut(e) => write!(f, "Scan timed out: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<ConnectionError> for IngestError {
    fn from(err: ConnectionError) -> Self {
        IngestError::Connection(err)
    }
}

impl From<ResolveError> for IngestError {
    fn from(err: ResolveError) -> Self {
        IngestError::Resolve(err)
    }
}

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        IngestError::Storage(err)
    }
}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    StorageError(StorageError),
    IngestError(IngestError),
    WebError(WebError),
    InitializationFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::IngestError(e) => write!(f, "Ingest error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web error: {}", e),
            ControllerError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}

impl From<IngestError> for ControllerError {
    fn from(err: IngestError) -> Self {
        ControllerError::IngestError(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::WebError(err)
    }
}
