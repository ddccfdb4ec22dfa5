//! Error kinds surfaced by the driver and the image builder.

use thiserror::Error;

/// Errors returned by any fallible operation in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A read or write against the underlying device was short, or the
    /// device itself reported a failure.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// The image's magic number does not match [`crate::layout::MAGIC`].
    #[error("bad magic number: expected {expected:#x}, found {found:#x}")]
    BadMagic { expected: u64, found: u64 },

    /// The image's block size does not match [`crate::layout::BLOCK_SIZE`].
    #[error("unsupported block size: expected {expected}, found {found}")]
    BadBlockSize { expected: u64, found: u64 },

    /// The requested inode number has no record in the inode store.
    #[error("inode {0} not found")]
    NotFound(u64),

    /// An inode record's mode has neither the directory nor the
    /// regular-file bit set.
    #[error("inode {0} has an unrecognized mode")]
    UnknownMode(u64),

    /// The free-block bitmap is exhausted, or the object-count limit
    /// (`MAX_OBJECTS`) has been reached.
    #[error("no space left on device")]
    NoSpace,

    /// A write would extend past the single data block owned by a file.
    #[error("write would exceed the file's single data block (4096 bytes)")]
    FileTooLarge,

    /// A directory-only operation was invoked on a non-directory inode.
    #[error("operation requires a directory")]
    NotDir,

    /// Copying to/from the caller's buffer failed.
    ///
    /// Kept for interface parity with the original kernel-module host,
    /// which separates kernel and user address spaces; this crate's
    /// read/write take plain slices, so this variant is unreachable here.
    #[error("user-memory copy failed")]
    UserCopyFailed,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
