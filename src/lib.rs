//! ASSOOFS: a small block-oriented on-disk filesystem.
//!
//! This crate is a host-agnostic driver for the on-disk format described in
//! [`layout`]: a fixed-size superblock, a single-block inode store, and
//! directories/files that each occupy exactly one 4096-byte data block. It
//! does not mount onto any particular OS's VFS; instead [`Filesystem`]
//! exposes the format's operations directly as plain Rust methods over a
//! [`device::BlockDevice`], and [`mkfs::format`] builds a fresh image from
//! scratch.
//!
//! ```no_run
//! use std::fs::OpenOptions;
//!
//! use assoofs::device::FileBlockDevice;
//! use assoofs::Filesystem;
//!
//! # fn main() -> assoofs::Result<()> {
//! let file = OpenOptions::new().read(true).write(true).open("disk.img")?;
//! let mut fs = Filesystem::mount(FileBlockDevice::new(file))?;
//! let root = fs.root()?;
//! for entry in fs.iterate(&root)? {
//!     println!("{} -> inode {}", entry.name, entry.inode_no);
//! }
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod dir;
pub mod error;
pub mod fs;
pub mod inode;
pub mod layout;
pub mod mkfs;

pub use device::{Block, BlockDevice, FileBlockDevice};
pub use dir::{DirEntry, DirIter};
pub use error::{Error, Result};
pub use fs::Filesystem;
pub use inode::Inode;
pub use layout::Mode;
