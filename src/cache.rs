//! The page cache collaborator. The verification algorithm is written
//! against the `PageCache` trait; `FileCache` is the concrete, unbuffered
//! implementation the standalone CLI uses.
//!
//! The reference engine's cache returns a hazard-referenced, pinned page and
//! may signal `restart` if the page moved underneath a concurrent writer.
//! `FileCache` has no in-process eviction and never restarts -- Rust
//! ownership of an owned `Page` buffer already gives us the hazard
//! reference's guarantee for free, so `page_out` is a deliberate no-op kept
//! only so the trait still carries the method shape callers expect.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::error::{VerifyError, VerifyResult};
use crate::item::OvflRef;

/// A loaded page: its address/size plus the raw bytes read from the file.
#[derive(Debug, Clone)]
pub struct Page {
    pub addr: u32,
    pub size: u32,
    pub buf: Vec<u8>,
}

/// Result of a `page_in` call: either the page, or a restart indication
/// meaning the page moved while being read (see DESIGN.md for how this
/// crate's `FileCache` realizes restart).
pub enum PageLoad {
    Loaded(Page),
    Restart,
}

pub trait PageCache {
    fn page_in(&mut self, addr: u32, size: u32) -> VerifyResult<PageLoad>;

    /// Releases a pinned page. `FileCache`'s implementation is a no-op; see
    /// the module doc comment.
    fn page_out(&mut self, _page: Page) {}

    /// Loads an overflow page referenced by `ovfl`. Default implementation
    /// goes through `page_in`; a restart here is always a hard error since
    /// overflow loads are stabilised by the parent's hazard reference.
    fn ovfl_in(&mut self, ovfl: &OvflRef) -> VerifyResult<Page> {
        match self.page_in(ovfl.addr, ovfl.size)? {
            PageLoad::Loaded(page) => Ok(page),
            PageLoad::Restart => Err(VerifyError::UnexpectedRestart),
        }
    }

    fn file_size(&self) -> u64;
    fn alloc_size(&self) -> u32;
}

/// Direct, unbuffered `File`-backed cache: every `page_in` does a `seek` +
/// `read_exact`. See the module doc comment for why `page_out` is a no-op.
pub struct FileCache {
    file: File,
    alloc_size: u32,
    file_size: u64,
}

impl FileCache {
    pub fn open(path: &str, alloc_size: u32) -> VerifyResult<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(FileCache { file, alloc_size, file_size })
    }

    pub fn from_file(file: File, alloc_size: u32) -> VerifyResult<Self> {
        let file_size = file.metadata()?.len();
        Ok(FileCache { file, alloc_size, file_size })
    }

    fn byte_offset(&self, addr: u32) -> u64 {
        addr as u64 * self.alloc_size as u64
    }
}

impl PageCache for FileCache {
    fn page_in(&mut self, addr: u32, size: u32) -> VerifyResult<PageLoad> {
        let offset = self.byte_offset(addr);
        let mut buf = vec![0u8; size as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(PageLoad::Loaded(Page { addr, size, buf }))
    }

    fn file_size(&self) -> u64 {
        self.file_size
    }

    fn alloc_size(&self) -> u32 {
        self.alloc_size
    }
}

/// Computes the byte extent `[start, end)` a fragment-addressed reference
/// covers, used to bounds-check `OFF`/`OVFL` references against the file
/// size.
pub fn reference_extent(alloc_size: u32, addr: u32, size: u32) -> (u64, u64) {
    let start = addr as u64 * alloc_size as u64;
    (start, start + size as u64)
}

pub fn extends_past_eof(alloc_size: u32, addr: u32, size: u32, file_size: u64) -> bool {
    let (_, end) = reference_extent(alloc_size, addr, size);
    end > file_size
}
