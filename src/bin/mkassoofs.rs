//! `mkassoofs`: formats a file or block device with a fresh ASSOOFS image.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use assoofs::device::FileBlockDevice;
use assoofs::layout::MAX_OBJECTS;

/// How large a fresh image is, in blocks: enough to cover every block the
/// free-block bitmap in the superblock can ever name.
const IMAGE_BLOCKS: u64 = MAX_OBJECTS;

#[derive(Parser)]
#[command(name = "mkassoofs", about = "Format a device with a fresh ASSOOFS image")]
struct Args {
    /// Path to the file or block device to format.
    device: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args.device) {
        Ok(()) => {
            println!("{} formatted", args.device.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(target: "assoofs", "mkassoofs failed: {e}");
            eprintln!("mkassoofs: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(path: &std::path::Path) -> assoofs::Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.set_len(IMAGE_BLOCKS * assoofs::layout::BLOCK_SIZE as u64)?;
    let mut device = FileBlockDevice::new(file);
    assoofs::mkfs::format(&mut device)
}
