use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("permission denied")]
    PermissionDenied,

    #[error("key not found")]
    KeyNotFound,

    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("namespace already exists: {0}")]
    NamespaceAlreadyExists(String),

    #[error("role not found: {0}")]
    RoleNotFound(String),

    #[error("role already exists: {0}")]
    RoleAlreadyExists(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("user already exists: {0}")]
    UserAlreadyExists(String),

    #[error("invalid permissions: {0}")]
    InvalidPerms(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("timeout")]
    Timeout,

    #[error("buffer overflow")]
    BufferOverflow,

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Renders the stable, externally-visible `[error] <message>` payload.
    pub fn wire_message(&self) -> String {
        match self {
            DbError::AuthenticationRequired => "authentication required".to_string(),
            DbError::AuthenticationFailed => "authentication failed".to_string(),
            DbError::PermissionDenied => "permission denied".to_string(),
            DbError::KeyNotFound => "key not found".to_string(),
            DbError::NamespaceNotFound(n) => format!("namespace not found: {n}"),
            DbError::NamespaceAlreadyExists(n) => format!("namespace already exists: {n}"),
            DbError::RoleNotFound(n) => format!("role not found: {n}"),
            DbError::RoleAlreadyExists(n) => format!("role already exists: {n}"),
            DbError::UserNotFound(n) => format!("user not found: {n}"),
            DbError::UserAlreadyExists(n) => format!("user already exists: {n}"),
            DbError::InvalidPerms(m) => format!("invalid permissions: {m}"),
            DbError::ParseError(m) => format!("parse error: {m}"),
            // The payload carries debugging context for logs, but the wire
            // text is the bare kind name, same as `KeyNotFound`'s -- spec.md
            // §8 property 8 requires a slave-rejected `SET` to read exactly
            // `[error] invalid operation`.
            DbError::InvalidOperation(_) => "invalid operation".to_string(),
            DbError::Timeout => "timeout".to_string(),
            DbError::BufferOverflow => "buffer overflow".to_string(),
            DbError::Cancelled => "cancelled".to_string(),
            DbError::Internal(m) => format!("internal error: {m}"),
            DbError::Io(e) => format!("internal error: {e}"),
        }
    }
}
