//! Error types shared by every Veil component.

use thiserror::Error;

/// Errno values relayed to callers of intercepted operations.
pub mod errno {
    pub const ENOENT: i32 = 2;
    pub const ENOMEM: i32 = 12;
    pub const EACCES: i32 = 13;
    pub const EFAULT: i32 = 14;
    pub const ENOTDIR: i32 = 20;
    pub const EINVAL: i32 = 22;
    pub const ENAMETOOLONG: i32 = 36;
    pub const EALREADY: i32 = 114;
}

/// Errors produced by table, token and control operations.
///
/// Every variant except [`VeilError::FatalInvariant`] is an ordinary,
/// recoverable result returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VeilError {
    /// Malformed or empty input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The entry is already present.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The entry is not present.
    #[error("not found: {0}")]
    NotFound(String),

    /// Allocation failed or a table is at capacity.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Copying from caller-controlled memory faulted.
    #[error("faulty address: {0:#x}")]
    FaultyAddress(u64),

    /// Token verification failed.
    #[error("access denied")]
    AccessDenied,

    /// Interception state is corrupted.
    #[error("fatal invariant violation: {0}")]
    FatalInvariant(String),
}

impl VeilError {
    /// The negative errno this error is reported as.
    ///
    /// `FatalInvariant` never reaches a caller; it maps to `EINVAL` only so
    /// the function stays total.
    pub fn errno(&self) -> i32 {
        -match self {
            VeilError::InvalidArgument(_) => errno::EINVAL,
            VeilError::AlreadyExists(_) => errno::EALREADY,
            VeilError::NotFound(_) => errno::ENOENT,
            VeilError::OutOfMemory(_) => errno::ENOMEM,
            VeilError::FaultyAddress(_) => errno::EFAULT,
            VeilError::AccessDenied => errno::EACCES,
            VeilError::FatalInvariant(_) => errno::EINVAL,
        }
    }

    /// Symbolic errno name, for log lines.
    pub fn errname(&self) -> &'static str {
        match self {
            VeilError::InvalidArgument(_) | VeilError::FatalInvariant(_) => "EINVAL",
            VeilError::AlreadyExists(_) => "EALREADY",
            VeilError::NotFound(_) => "ENOENT",
            VeilError::OutOfMemory(_) => "ENOMEM",
            VeilError::FaultyAddress(_) => "EFAULT",
            VeilError::AccessDenied => "EACCES",
        }
    }
}

/// Result type for Veil operations.
pub type Result<T> = std::result::Result<T, VeilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(VeilError::InvalidArgument("x".into()).errno(), -22);
        assert_eq!(VeilError::AlreadyExists("x".into()).errno(), -114);
        assert_eq!(VeilError::NotFound("x".into()).errno(), -2);
        assert_eq!(VeilError::OutOfMemory("x".into()).errno(), -12);
        assert_eq!(VeilError::FaultyAddress(0x10).errno(), -14);
        assert_eq!(VeilError::AccessDenied.errno(), -13);
    }

    #[test]
    fn test_access_denied_message_is_opaque() {
        assert_eq!(VeilError::AccessDenied.to_string(), "access denied");
    }
}
