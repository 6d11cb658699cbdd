use thiserror::Error;

/// Classification of an embedding-provider failure (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    RateLimit,
    Auth,
    Network,
    Timeout,
    Server,
    ClientInput,
}

impl ProviderErrorKind {
    /// `Auth` and `ClientInput` fail immediately; everything else retries.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Auth | Self::ClientInput)
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Server => "server",
            Self::ClientInput => "client_input",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum ZiriError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("provider error ({kind}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        message: String,
    },

    #[error("memory limit exceeded: {0}")]
    MemoryLimitExceeded(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage corrupt: {0}")]
    Corrupt(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("provider mismatch: query embedded at {queried} dims, index stores {indexed}")]
    ProviderMismatch { indexed: usize, queried: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Internal(String),
}

impl ZiriError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn provider(kind: ProviderErrorKind, msg: impl Into<String>) -> Self {
        Self::Provider {
            kind,
            message: msg.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// Maps the taxonomy of spec §7 to the process exit codes of spec §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Input(_) => 2,
            Self::Provider { .. } => 3,
            Self::Corrupt(_) | Self::DimensionMismatch { .. } | Self::ProviderMismatch { .. } | Self::Io(_) => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_taxonomy() {
        assert_eq!(ZiriError::input("bad path").exit_code(), 2);
        assert_eq!(
            ZiriError::provider(ProviderErrorKind::Auth, "no key").exit_code(),
            3
        );
        assert_eq!(ZiriError::corrupt("bad json").exit_code(), 4);
        assert_eq!(ZiriError::Cancelled.exit_code(), 1);
        let io_err: ZiriError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert_eq!(io_err.exit_code(), 4);
    }

    #[test]
    fn retryable_kinds() {
        assert!(!ProviderErrorKind::Auth.is_retryable());
        assert!(!ProviderErrorKind::ClientInput.is_retryable());
        assert!(ProviderErrorKind::RateLimit.is_retryable());
        assert!(ProviderErrorKind::Network.is_retryable());
    }
}
