use crate::mirror::helpers::display_path;

/// Structured errors for the mirror run. Connection-stage failures come first,
/// then failures that can surface mid-walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorError {
    /// `host:port` did not resolve to any socket address
    NoAddress(String),
    /// TCP connect to `addr` failed or timed out.
    ConnectFailed { addr: String, msg: String },
    SessionCreateFailed(String),
    HandshakeFailed(String),
    AuthenticationFailed { addr: String, user: String },
    /// Transport-level failure: broken session, socket error, short read.
    Connection(String),
    /// Remote path does not exist.
    NotFound(String),
    /// Remote path exists but access was denied.
    PermissionDenied(String),
    /// Remote entry whose name is not valid UTF-8 (lossy rendering kept).
    InvalidName(String),
    /// Local filesystem failure, keeps the local path and the io error message.
    LocalIo { path: std::path::PathBuf, msg: String },
    DepthLimitExceeded { path: String, limit: usize },
    /// Only produced in strict mode.
    CountMismatch { remote: u64, local: u64 },
}

impl std::fmt::Display for MirrorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use MirrorError::*;
        match self {
            NoAddress(addr) => write!(f, "cannot resolve address: {}", addr),
            ConnectFailed { addr, msg } => write!(f, "cannot connect to {}: {}", addr, msg),
            SessionCreateFailed(addr) => write!(f, "cannot create SSH session: {}", addr),
            HandshakeFailed(addr) => write!(f, "SSH handshake failed: {}", addr),
            AuthenticationFailed { addr, user } => {
                write!(f, "authentication failed for {}@{}, please verify your credentials", user, addr)
            }
            Connection(msg) => write!(f, "connection error: {}", msg),
            NotFound(p) => write!(f, "remote path not found: {}", p),
            PermissionDenied(p) => write!(f, "permission denied on remote path: {}", p),
            InvalidName(p) => write!(f, "remote entry name is not valid UTF-8: {}", p),
            LocalIo { path, msg } => {
                write!(f, "local I/O error: {}: {}", display_path(path), msg)
            }
            DepthLimitExceeded { path, limit } => {
                write!(f, "directory depth limit {} exceeded at: {}", limit, path)
            }
            CountMismatch { remote, local } => {
                write!(f, "incomplete mirror: {} remote files, {} local files", remote, local)
            }
        }
    }
}

impl std::error::Error for MirrorError {}

impl MirrorError {
    /// Build a `LocalIo` from a path and any displayable error.
    pub fn local(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        MirrorError::LocalIo { path: path.to_path_buf(), msg: err.to_string() }
    }

    /// Whether the failure happened while establishing the session, i.e.
    /// before any listing or transfer could begin.
    pub fn is_connection_stage(&self) -> bool {
        use MirrorError::*;
        match self {
            NoAddress(_)
            | ConnectFailed { .. }
            | SessionCreateFailed(_)
            | HandshakeFailed(_)
            | AuthenticationFailed { .. } => true,
            Connection(_)
            | NotFound(_)
            | PermissionDenied(_)
            | InvalidName(_)
            | LocalIo { .. }
            | DepthLimitExceeded { .. }
            | CountMismatch { .. } => false,
        }
    }

    /// Map an ssh2 error for `path` onto the taxonomy using the SFTP status code.
    pub fn from_ssh2(path: &str, err: ssh2::Error) -> Self {
        // LIBSSH2_FX_NO_SUCH_FILE = 2, LIBSSH2_FX_PERMISSION_DENIED = 3, LIBSSH2_FX_NO_SUCH_PATH = 10
        match err.code() {
            ssh2::ErrorCode::SFTP(2) | ssh2::ErrorCode::SFTP(10) => {
                MirrorError::NotFound(path.to_string())
            }
            ssh2::ErrorCode::SFTP(3) => MirrorError::PermissionDenied(path.to_string()),
            _ => MirrorError::Connection(format!("{}: {}", path, err)),
        }
    }
}
