//! The mounted filesystem driver.
//!
//! A [`Filesystem`] owns the block device and the in-memory superblock for
//! one mount session. Every mutating operation takes `&mut self`: the spec
//! this driver implements assumes a host that serializes entry into each
//! top-level operation (§5), so here the borrow checker plays the role the
//! host's per-superblock lock would play in a concurrent host. A caller
//! that does need concurrent access wraps a `Filesystem` in its own
//! `Mutex`.

use log::{debug, info, warn};

use crate::device::BlockDevice;
use crate::dir::{DirEntry, DirIter};
use crate::error::{Error, Result};
use crate::inode::Inode;
use crate::layout::{
    Mode, RawDirEntry, RawInode, RawSuperblock, BLOCK_SIZE, DIR_ENTRIES_PER_BLOCK, DIR_ENTRY_SIZE,
    INODE_RECORD_SIZE, INODE_STORE_BLOCK, MAGIC, MAX_OBJECTS, ROOT_DIR_BLOCK, ROOT_INODE_NUMBER,
    SUPERBLOCK_BLOCK,
};

/// A mounted filesystem session.
pub struct Filesystem<D> {
    device: D,
    superblock: RawSuperblock,
}

impl<D: BlockDevice> Filesystem<D> {
    /// Mounts the image on `device`: reads and validates its superblock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadMagic`] or [`Error::BadBlockSize`] if the image
    /// is not a valid instance of this format, or [`Error::Io`] if the
    /// device fails to read block 0.
    pub fn mount(mut device: D) -> Result<Self> {
        let block = device.read_block(SUPERBLOCK_BLOCK)?;
        let superblock: RawSuperblock = *bytemuck::from_bytes(block.bytes());
        if superblock.magic != MAGIC {
            warn!(target: "assoofs", "mount rejected: bad magic {:#x}", superblock.magic);
            return Err(Error::BadMagic {
                expected: MAGIC,
                found: superblock.magic,
            });
        }
        if superblock.block_size != BLOCK_SIZE as u64 {
            warn!(
                target: "assoofs",
                "mount rejected: bad block size {}",
                superblock.block_size
            );
            return Err(Error::BadBlockSize {
                expected: BLOCK_SIZE as u64,
                found: superblock.block_size,
            });
        }
        info!(
            target: "assoofs",
            "mounted: inodes_count={} free_blocks={:#018x}",
            superblock.inodes_count, superblock.free_blocks
        );
        Ok(Self { device, superblock })
    }

    /// The number of inodes currently stored in the inode store.
    #[must_use]
    pub fn inodes_count(&self) -> u64 {
        self.superblock.inodes_count
    }

    /// Loads the root directory's inode (number 1).
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Filesystem::inode`].
    pub fn root(&mut self) -> Result<Inode> {
        self.inode(ROOT_INODE_NUMBER)
    }

    /// Loads the inode numbered `inode_no`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record with this number exists,
    /// or [`Error::UnknownMode`] if the record's mode is neither a
    /// directory nor a regular file.
    pub fn inode(&mut self, inode_no: u64) -> Result<Inode> {
        let record = self.get_inode_record(inode_no)?;
        Inode::from_record(inode_no, record)
    }

    fn get_inode_record(&mut self, inode_no: u64) -> Result<RawInode> {
        let block = self.device.read_block(INODE_STORE_BLOCK)?;
        for i in 0..self.superblock.inodes_count {
            let off = i as usize * INODE_RECORD_SIZE;
            let record: RawInode =
                *bytemuck::from_bytes(&block.bytes()[off..off + INODE_RECORD_SIZE]);
            if record.inode_no == inode_no {
                return Ok(record);
            }
        }
        Err(Error::NotFound(inode_no))
    }

    fn save_superblock(&mut self) -> Result<()> {
        let mut block = self.device.read_block(SUPERBLOCK_BLOCK)?;
        block
            .bytes_mut()
            .copy_from_slice(bytemuck::bytes_of(&self.superblock));
        block.mark_dirty();
        self.device.sync(&mut block)
    }

    /// Allocates a free data block (lowest set bit of the bitmap first, in
    /// the range `2..64`) and persists the updated superblock. Bits 0 and 1
    /// are never handed out: they are reserved for the superblock and the
    /// inode store, and the allocator enforces that itself rather than
    /// relying on a fresh image's bitmap happening to have them clear.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSpace`] if no bit is set in that range.
    fn alloc_block(&mut self) -> Result<u64> {
        for bit in 2..64 {
            if self.superblock.free_blocks & (1 << bit) != 0 {
                self.superblock.free_blocks &= !(1 << bit);
                self.save_superblock()?;
                debug!(target: "assoofs", "allocated block {bit}");
                return Ok(bit);
            }
        }
        Err(Error::NoSpace)
    }

    fn add_inode_record(&mut self, record: RawInode) -> Result<()> {
        if self.superblock.inodes_count + 2 >= MAX_OBJECTS {
            return Err(Error::NoSpace);
        }
        let mut block = self.device.read_block(INODE_STORE_BLOCK)?;
        let off = self.superblock.inodes_count as usize * INODE_RECORD_SIZE;
        block.bytes_mut()[off..off + INODE_RECORD_SIZE].copy_from_slice(bytemuck::bytes_of(&record));
        block.mark_dirty();
        self.device.sync(&mut block)?;
        self.superblock.inodes_count += 1;
        self.save_superblock()?;
        debug!(target: "assoofs", "appended inode {} to the store", record.inode_no);
        Ok(())
    }

    fn save_inode_record(&mut self, record: RawInode) -> Result<()> {
        let mut block = self.device.read_block(INODE_STORE_BLOCK)?;
        let mut found = false;
        for i in 0..self.superblock.inodes_count {
            let off = i as usize * INODE_RECORD_SIZE;
            let existing: RawInode =
                *bytemuck::from_bytes(&block.bytes()[off..off + INODE_RECORD_SIZE]);
            if existing.inode_no == record.inode_no {
                block.bytes_mut()[off..off + INODE_RECORD_SIZE]
                    .copy_from_slice(bytemuck::bytes_of(&record));
                found = true;
                break;
            }
        }
        if !found {
            return Err(Error::NotFound(record.inode_no));
        }
        block.mark_dirty();
        self.device.sync(&mut block)
    }

    fn read_dir_entries(&mut self, dir: &Inode) -> Result<Vec<RawDirEntry>> {
        if !dir.is_dir() {
            return Err(Error::NotDir);
        }
        let block = self.device.read_block(dir.data_block_number())?;
        let count = dir.dir_children_count() as usize;
        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let off = i * DIR_ENTRY_SIZE;
            let entry: RawDirEntry =
                *bytemuck::from_bytes(&block.bytes()[off..off + DIR_ENTRY_SIZE]);
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Looks up `name` in `dir`'s entries.
    ///
    /// Returns `Ok(None)` on a miss rather than mutating an opaque dentry:
    /// there is no VFS host here to mediate through (§6 of the expanded
    /// spec), so the resolved inode — the only observable outcome of the
    /// original `lookup` — is simply returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotDir`] if `dir` is not a directory.
    pub fn lookup(&mut self, dir: &Inode, name: &str) -> Result<Option<Inode>> {
        let entries = self.read_dir_entries(dir)?;
        for entry in entries {
            if entry.name() == name {
                return self.inode(entry.inode_no).map(Some);
            }
        }
        Ok(None)
    }

    /// Iterates over the entries of a directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotDir`] if `dir` is not a directory.
    pub fn iterate(&mut self, dir: &Inode) -> Result<DirIter> {
        let entries = self
            .read_dir_entries(dir)?
            .into_iter()
            .map(|e| DirEntry {
                name: e.name().to_string(),
                inode_no: e.inode_no,
            })
            .collect();
        Ok(DirIter::new(entries))
    }

    fn add_dirent(&mut self, dir: &mut Inode, name: &str, inode_no: u64) -> Result<()> {
        let children = dir.dir_children_count() as usize;
        if (children + 1) * DIR_ENTRY_SIZE > BLOCK_SIZE {
            return Err(Error::NoSpace);
        }
        let mut block = self.device.read_block(dir.data_block_number())?;
        let off = children * DIR_ENTRY_SIZE;
        let entry = RawDirEntry::new(name, inode_no);
        block.bytes_mut()[off..off + DIR_ENTRY_SIZE].copy_from_slice(bytemuck::bytes_of(&entry));
        block.mark_dirty();
        self.device.sync(&mut block)?;
        dir.set_dir_children_count(children as u64 + 1);
        self.save_inode_record(dir.record())
    }

    fn create_object(&mut self, dir: &mut Inode, name: &str, mode: Mode) -> Result<Inode> {
        if self.superblock.inodes_count >= MAX_OBJECTS - 2 {
            return Err(Error::NoSpace);
        }
        let new_ino = self.superblock.inodes_count + 1;
        let data_block = self.alloc_block().map_err(|e| {
            warn!(
                target: "assoofs",
                "create({name}) failed after inode number {new_ino} was reserved: {e}"
            );
            e
        })?;
        let record = RawInode {
            mode,
            inode_no: new_ino,
            data_block_number: data_block,
            size_or_count: 0,
        };
        self.add_inode_record(record).map_err(|e| {
            warn!(
                target: "assoofs",
                "create({name}) failed after block {data_block} was allocated: {e}"
            );
            e
        })?;
        self.add_dirent(dir, name, new_ino).map_err(|e| {
            warn!(
                target: "assoofs",
                "create({name}) left inode {new_ino} allocated but unlinked: {e}"
            );
            e
        })?;
        self.inode(new_ino)
    }

    /// Creates a new regular file named `name` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSpace`] if the object-count limit or the
    /// free-block bitmap is exhausted. On failure, partial state from
    /// earlier steps (a reserved inode number, an allocated block) is not
    /// rolled back — see the design notes on `create`/`mkdir`.
    pub fn create(&mut self, dir: &mut Inode, name: &str, mode: Mode) -> Result<Inode> {
        self.create_object(dir, name, Mode::reg(mode.permissions()))
    }

    /// Creates a new directory named `name` inside `dir`.
    ///
    /// # Errors
    ///
    /// Same as [`Filesystem::create`].
    pub fn mkdir(&mut self, dir: &mut Inode, name: &str, mode: Mode) -> Result<Inode> {
        self.create_object(dir, name, Mode::dir(mode.permissions()))
    }

    /// Reads up to `buf.len()` bytes from `file` starting at `pos`.
    ///
    /// Returns `0` once `pos` reaches the file's size.
    ///
    /// # Panics
    ///
    /// Panics if `file` is a directory, the same way a directory's
    /// operations table has no `read` entry on the original host.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the underlying device.
    pub fn read(&mut self, file: &Inode, pos: u64, buf: &mut [u8]) -> Result<usize> {
        assert!(file.is_reg(), "read() called on a directory inode");
        let size = file.file_size();
        if pos >= size {
            return Ok(0);
        }
        let block = self.device.read_block(file.data_block_number())?;
        let n = ((size - pos) as usize).min(buf.len());
        let start = pos as usize;
        buf[..n].copy_from_slice(&block.bytes()[start..start + n]);
        Ok(n)
    }

    /// Writes `buf` into `file`'s single data block starting at `pos`,
    /// then sets the file's size to `pos + buf.len()`.
    ///
    /// # Panics
    ///
    /// Panics if `file` is a directory (see [`Filesystem::read`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileTooLarge`] if `pos + buf.len()` would exceed
    /// one block; the data block is left untouched in that case.
    pub fn write(&mut self, file: &mut Inode, pos: u64, buf: &[u8]) -> Result<usize> {
        assert!(file.is_reg(), "write() called on a directory inode");
        let end = pos
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= BLOCK_SIZE as u64)
            .ok_or(Error::FileTooLarge)?;
        let mut block = self.device.read_block(file.data_block_number())?;
        let start = pos as usize;
        block.bytes_mut()[start..end as usize].copy_from_slice(buf);
        block.mark_dirty();
        self.device.sync(&mut block)?;
        file.set_file_size(end);
        self.save_inode_record(file.record())?;
        Ok(buf.len())
    }
}

const _: () = assert!(DIR_ENTRIES_PER_BLOCK >= 15);
const _: () = assert!(ROOT_DIR_BLOCK == 2);

#[cfg(test)]
mod tests {
    use crate::device::FileBlockDevice;
    use crate::layout::MAX_OBJECTS;
    use crate::mkfs;

    use super::*;

    fn mounted() -> Filesystem<FileBlockDevice> {
        let file = tempfile::tempfile().unwrap();
        file.set_len(MAX_OBJECTS * BLOCK_SIZE as u64).unwrap();
        let mut device = FileBlockDevice::new(file);
        mkfs::format(&mut device).unwrap();
        Filesystem::mount(device).unwrap()
    }

    #[test]
    fn alloc_block_skips_reserved_blocks() {
        let mut fs = mounted();
        // blocks 0 and 1 are never scanned (superblock, inode store); 2 and
        // 3 are already taken by mkfs (root dir, welcome file).
        let first = fs.alloc_block().unwrap();
        assert_eq!(first, 4);
        let second = fs.alloc_block().unwrap();
        assert_eq!(second, 5);
    }

    #[test]
    fn alloc_block_fails_once_exhausted() {
        let mut fs = mounted();
        for _ in 4..64 {
            fs.alloc_block().unwrap();
        }
        assert!(matches!(fs.alloc_block(), Err(Error::NoSpace)));
    }

    #[test]
    fn lookup_on_a_file_fails_with_not_dir() {
        let mut fs = mounted();
        let mut root = fs.root().unwrap();
        let file = fs.create(&mut root, "f", Mode::reg(0o644)).unwrap();
        assert!(matches!(fs.lookup(&file, "x"), Err(Error::NotDir)));
    }
}
