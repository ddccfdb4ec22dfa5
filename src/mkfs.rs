//! Image building: formats a fresh, empty filesystem image.
//!
//! This is the logic behind the `mkassoofs` binary, factored out so tests
//! can build scratch images without shelling out to it.

use log::info;

use crate::device::BlockDevice;
use crate::error::Result;
use crate::layout::{
    Mode, RawDirEntry, RawInode, RawSuperblock, BLOCK_SIZE, DIR_ENTRY_SIZE, INODE_STORE_BLOCK,
    ROOT_DIR_BLOCK, ROOT_INODE_NUMBER, SUPERBLOCK_BLOCK,
};

/// The contents of the single file a freshly formatted image starts with.
pub const WELCOME_FILENAME: &str = "README.txt";
pub const WELCOME_BODY: &[u8] =
    b"Hola mundo, os saludo desde un sistema de ficheros ASSOOFS.\n";

const WELCOME_INODE_NUMBER: u64 = 2;
const WELCOME_DATA_BLOCK: u64 = 3;

/// Formats `device` with a fresh image: a superblock, a root directory
/// containing one file (`README.txt`), and that file's data block.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::error::Error::Io) if any block write fails.
pub fn format<D: BlockDevice>(device: &mut D) -> Result<()> {
    let superblock = RawSuperblock::fresh();
    let mut sb_block = device.read_block(SUPERBLOCK_BLOCK)?;
    sb_block
        .bytes_mut()
        .copy_from_slice(bytemuck::bytes_of(&superblock));
    sb_block.mark_dirty();
    device.sync(&mut sb_block)?;
    info!(target: "assoofs", "wrote superblock");

    let root = RawInode {
        mode: Mode::dir(0o755),
        inode_no: ROOT_INODE_NUMBER,
        data_block_number: ROOT_DIR_BLOCK,
        size_or_count: 1,
    };
    let welcome = RawInode {
        mode: Mode::reg(0o644),
        inode_no: WELCOME_INODE_NUMBER,
        data_block_number: WELCOME_DATA_BLOCK,
        size_or_count: WELCOME_BODY.len() as u64,
    };
    let mut inode_block = device.read_block(INODE_STORE_BLOCK)?;
    inode_block.bytes_mut().fill(0);
    inode_block.bytes_mut()[0..32].copy_from_slice(bytemuck::bytes_of(&root));
    inode_block.bytes_mut()[32..64].copy_from_slice(bytemuck::bytes_of(&welcome));
    inode_block.mark_dirty();
    device.sync(&mut inode_block)?;
    info!(target: "assoofs", "wrote inode store: root + {WELCOME_FILENAME}");

    let mut dir_block = device.read_block(ROOT_DIR_BLOCK)?;
    dir_block.bytes_mut().fill(0);
    let entry = RawDirEntry::new(WELCOME_FILENAME, WELCOME_INODE_NUMBER);
    dir_block.bytes_mut()[0..DIR_ENTRY_SIZE].copy_from_slice(bytemuck::bytes_of(&entry));
    dir_block.mark_dirty();
    device.sync(&mut dir_block)?;

    let mut data_block = device.read_block(WELCOME_DATA_BLOCK)?;
    data_block.bytes_mut().fill(0);
    data_block.bytes_mut()[..WELCOME_BODY.len()].copy_from_slice(WELCOME_BODY);
    data_block.mark_dirty();
    device.sync(&mut data_block)?;
    info!(target: "assoofs", "wrote {WELCOME_FILENAME} ({} bytes)", WELCOME_BODY.len());

    Ok(())
}

const _: () = assert!(WELCOME_BODY.len() <= BLOCK_SIZE);

#[cfg(test)]
mod tests {
    use crate::layout::MAX_OBJECTS;

    use super::*;

    fn built() -> crate::device::FileBlockDevice {
        let file = tempfile::tempfile().unwrap();
        file.set_len(MAX_OBJECTS * BLOCK_SIZE as u64).unwrap();
        let mut device = crate::device::FileBlockDevice::new(file);
        format(&mut device).unwrap();
        device
    }

    #[test]
    fn fresh_image_mounts_and_exposes_the_welcome_file() {
        let mut fs = crate::fs::Filesystem::mount(built()).unwrap();
        assert_eq!(fs.inodes_count(), 2);
        let root = fs.root().unwrap();
        let entries: Vec<_> = fs.iterate(&root).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, WELCOME_FILENAME);
    }
}
