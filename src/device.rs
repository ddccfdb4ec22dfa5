//! The block I/O gateway: a thin abstraction over a raw block device.
//!
//! Every block is read into an owned buffer, mutated in place, explicitly
//! marked dirty, and explicitly synced. Release happens for free: the
//! buffer is an ordinary Rust value, so it is reclaimed as soon as it goes
//! out of scope on every exit path, including early returns and `?`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use log::{debug, error};

use crate::error::{Error, Result};
use crate::layout::BLOCK_SIZE;

/// A block, read from the device into memory.
///
/// `mark_dirty` only flips a flag; the actual write happens when the
/// caller passes the block back to [`BlockDevice::sync`].
pub struct Block {
    number: u64,
    buf: [u8; BLOCK_SIZE],
    dirty: bool,
}

impl Block {
    fn new(number: u64, buf: [u8; BLOCK_SIZE]) -> Self {
        Self {
            number,
            buf,
            dirty: false,
        }
    }

    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.buf
    }

    /// Marks this buffer as mutated. Does not touch the device; call
    /// [`BlockDevice::sync`] to persist it.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mutable access to the buffer's bytes. Does not itself mark the
    /// block dirty — callers that mutate through this must still call
    /// [`Block::mark_dirty`].
    pub fn bytes_mut(&mut self) -> &mut [u8; BLOCK_SIZE] {
        &mut self.buf
    }
}

/// A raw block device: something blocks can be read from and written to,
/// one 4096-byte unit at a time.
pub trait BlockDevice {
    /// Reads block `number` into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the device returns fewer than `BLOCK_SIZE`
    /// bytes or otherwise fails.
    fn read_block(&mut self, number: u64) -> Result<Block>;

    /// Persists `block` to the device if it is dirty, then clears the
    /// dirty flag. A no-op if the block was never mutated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on a short or failed write.
    fn sync(&mut self, block: &mut Block) -> Result<()>;
}

/// A block device backed by a single file on the host filesystem — either
/// a sparse regular file standing in for a disk image, or a path to a raw
/// block device.
pub struct FileBlockDevice {
    file: File,
}

impl FileBlockDevice {
    #[must_use]
    pub fn new(file: File) -> Self {
        Self { file }
    }

    fn offset_of(number: u64) -> u64 {
        number * BLOCK_SIZE as u64
    }
}

impl BlockDevice for FileBlockDevice {
    fn read_block(&mut self, number: u64) -> Result<Block> {
        self.file.seek(SeekFrom::Start(Self::offset_of(number)))?;
        let mut buf = [0u8; BLOCK_SIZE];
        self.file.read_exact(&mut buf).map_err(|e| {
            error!(target: "assoofs", "short read on block {number}: {e}");
            Error::Io(e)
        })?;
        debug!(target: "assoofs", "read block {number}");
        Ok(Block::new(number, buf))
    }

    fn sync(&mut self, block: &mut Block) -> Result<()> {
        if !block.dirty {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(Self::offset_of(block.number)))?;
        self.file.write_all(&block.buf).map_err(|e| {
            error!(target: "assoofs", "short write on block {}: {e}", block.number);
            Error::Io(e)
        })?;
        self.file.flush()?;
        block.dirty = false;
        debug!(target: "assoofs", "synced block {}", block.number);
        Ok(())
    }
}
