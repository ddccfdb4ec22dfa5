//! In-memory inode handles.
//!
//! An [`Inode`] pairs the persistent on-disk record (the "shadow") with the
//! metadata a mounted session attaches to it: its number and timestamps.
//! Timestamps are not part of the on-disk format (§3 of the format does not
//! reserve space for them) — they are populated at construction time the
//! way the original driver's `get_inode` fills them in for the VFS host,
//! and are not persisted.

use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::layout::{Mode, RawInode};

/// A mounted inode: its number, its persistent record, and the timestamps
/// a session attaches to it.
#[derive(Clone, Debug)]
pub struct Inode {
    number: u64,
    record: RawInode,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl Inode {
    pub(crate) fn from_record(number: u64, record: RawInode) -> Result<Self> {
        if !record.mode.is_dir() && !record.mode.is_reg() {
            return Err(Error::UnknownMode(number));
        }
        let now = SystemTime::now();
        Ok(Self {
            number,
            record,
            atime: now,
            mtime: now,
            ctime: now,
        })
    }

    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.record.mode
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.record.mode.is_dir()
    }

    #[must_use]
    pub fn is_reg(&self) -> bool {
        self.record.mode.is_reg()
    }

    #[must_use]
    pub fn data_block_number(&self) -> u64 {
        self.record.data_block_number
    }

    /// The file's size in bytes. Only meaningful on a regular file; the
    /// union arm otherwise holds `dir_children_count`.
    ///
    /// # Panics
    ///
    /// Panics if called on a directory inode — reading the wrong union arm
    /// is a programming error, not a disk-content error.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        assert!(self.is_reg(), "file_size() called on a directory inode");
        self.record.size_or_count
    }

    pub(crate) fn set_file_size(&mut self, size: u64) {
        assert!(self.is_reg(), "set_file_size() called on a directory inode");
        self.record.size_or_count = size;
    }

    /// The number of entries stored in the directory's data block. Only
    /// meaningful on a directory inode.
    ///
    /// # Panics
    ///
    /// Panics if called on a regular-file inode.
    #[must_use]
    pub fn dir_children_count(&self) -> u64 {
        assert!(self.is_dir(), "dir_children_count() called on a regular file inode");
        self.record.size_or_count
    }

    pub(crate) fn set_dir_children_count(&mut self, count: u64) {
        assert!(self.is_dir(), "set_dir_children_count() called on a regular file inode");
        self.record.size_or_count = count;
    }

    pub(crate) fn record(&self) -> RawInode {
        self.record
    }
}
