use thiserror::Error;

/// Main error type for murex operations
#[derive(Error, Debug)]
pub enum MurexError {
    #[error("format error: {0}")]
    Format(String),

    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for murex operations
pub type Result<T> = std::result::Result<T, MurexError>;

impl MurexError {
    pub fn format(msg: impl Into<String>) -> Self {
        MurexError::Format(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        MurexError::Corrupt(msg.into())
    }

    /// Check if this error means the on-disk data itself is bad, as opposed
    /// to an environmental failure that could succeed on retry.
    pub fn is_data_error(&self) -> bool {
        matches!(self, MurexError::Format(_) | MurexError::Corrupt(_))
    }
}
