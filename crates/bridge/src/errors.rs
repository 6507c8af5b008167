use nix::errno::Errno;
use std::fmt;
use std::io;
use thiserror::Error;

/// Kind of SysV object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Region,
    Gate,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Region => f.write_str("shared memory"),
            Resource::Gate => f.write_str("semaphore"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    // Setup: fatal at startup.
    #[error("{resource} with key {key} already exists")]
    AlreadyExists { resource: Resource, key: i32 },

    #[error("{resource} with key {key} does not exist")]
    NotFound { resource: Resource, key: i32 },

    #[error("System limit reached for {resource} with key {key}: {errno}")]
    SystemLimit {
        resource: Resource,
        key: i32,
        errno: Errno,
    },

    #[error("Permission denied for {resource} with key {key}")]
    PermissionDenied { resource: Resource, key: i32 },

    #[error("Attaching shared memory with key {key} failed: {errno}")]
    AttachFailed { key: i32, errno: Errno },

    // Steady state.
    #[error("Semaphore wait interrupted by signal")]
    Interrupted,

    #[error("{resource} with key {key} was removed")]
    Removed { resource: Resource, key: i32 },

    #[error("{op} on {resource} with key {key} failed: {errno}")]
    OperationFailed {
        op: &'static str,
        resource: Resource,
        key: i32,
        errno: Errno,
    },

    // Protocol.
    #[error("Payload of {len} bytes exceeds channel capacity of {capacity} bytes")]
    PayloadTooLarge { len: usize, capacity: usize },

    #[error("Invalid length field: {0:?}")]
    InvalidLength(String),

    #[error("Length {value} does not fit in {capacity} bytes")]
    LengthOverflow { value: usize, capacity: usize },

    #[error("Digest mismatch: expected {expected}, received {received}")]
    DigestMismatch { expected: String, received: String },

    #[error("Timed out waiting for digest reply")]
    DigestTimeout,

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl BridgeError {
    /// Classify a failed create/open call.
    pub(crate) fn from_setup(resource: Resource, key: i32, errno: Errno) -> Self {
        match errno {
            Errno::EEXIST => BridgeError::AlreadyExists { resource, key },
            Errno::ENOENT => BridgeError::NotFound { resource, key },
            Errno::EACCES | Errno::EPERM => BridgeError::PermissionDenied { resource, key },
            _ => BridgeError::SystemLimit {
                resource,
                key,
                errno,
            },
        }
    }

    /// Classify a failed operation on an existing object.
    pub(crate) fn from_operation(
        op: &'static str,
        resource: Resource,
        key: i32,
        errno: Errno,
    ) -> Self {
        match errno {
            Errno::EINTR => BridgeError::Interrupted,
            Errno::EIDRM | Errno::EINVAL => BridgeError::Removed { resource, key },
            _ => BridgeError::OperationFailed {
                op,
                resource,
                key,
                errno,
            },
        }
    }
}
