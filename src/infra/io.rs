use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

/// Bytes sniffed for NUL when classifying binary content
const BINARY_SNIFF_LEN: usize = 8 * 1024;

pub enum FileContent {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl AsRef<[u8]> for FileContent {
    fn as_ref(&self) -> &[u8] {
        match self {
            FileContent::Mapped(mmap) => &mmap[..],
            FileContent::Buffered(v) => v.as_slice(),
        }
    }
}

/// Read a source file read-only, memory-mapping anything above 1 MiB.
pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD {
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: read-only map; sources are never written by this process
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        let content =
            std::fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

/// True when the leading bytes contain a NUL, the usual binary heuristic.
pub fn looks_binary(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    memchr::memchr(0, head).is_some()
}

/// Write `content` to `path`, creating parent directories first.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write to {}", path.display()))
}
