//! A standalone verifier for the on-disk B-tree file format: reads every
//! page without modifying the file and proves the pages are internally
//! consistent with one another (structurally, syntactically, and
//! semantically), or reports exactly where they aren't.

pub mod cache;
pub mod collation;
pub mod descriptor;
pub mod error;
pub mod format;
pub mod fragment_map;
pub mod header;
pub mod huffman;
pub mod item;
pub mod validator;
pub mod walker;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

use std::io::Write;

use anyhow::{Context, Result};

use cache::{FileCache, PageCache, PageLoad};
use collation::{ByteCollation, Collation};
use descriptor::{DatabaseParams, DescriptorPayload};
use error::VerifyResult;
use format::{DESC_PAGE_ADDR, DESC_PAGE_SIZE};
use fragment_map::FragmentMap;
use huffman::HuffmanCodec;
use item::Off;
use walker::WalkState;

/// Everything the Page Validator and Tree Walker need threaded through a
/// single run: the page source, the already-open database's configuration
/// (against which the descriptor page is checked), the collation/Huffman
/// collaborators, and the optional progress, fragment-coverage, and dump
/// hooks.
pub struct VerifyContext<'a, C: PageCache> {
    pub cache: &'a mut C,
    pub params: &'a DatabaseParams,
    pub primary: &'a dyn Collation,
    pub duplicate: &'a dyn Collation,
    pub huffman_key: Option<&'a dyn HuffmanCodec>,
    pub huffman_data: Option<&'a dyn HuffmanCodec>,
    pub fragment_map: Option<&'a mut FragmentMap>,
    pub progress: Option<&'a mut dyn FnMut(&str, u64)>,
    pub dump: Option<&'a mut dyn Write>,
    pub target_name: &'a str,
    pub page_count: u64,
}

impl<'a, C: PageCache> VerifyContext<'a, C> {
    /// Picks the primary or duplicate comparator for a page kind. Returned
    /// with the context's own lifetime, not the borrow of `&self`, so
    /// callers can keep using it across later mutable borrows of `cache`.
    pub fn collation_for(&self, page_type: format::PageType) -> &'a dyn Collation {
        match page_type {
            format::PageType::DupInt | format::PageType::DupLeaf => self.duplicate,
            _ => self.primary,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyReport {
    pub pages_verified: u64,
}

/// Verifies the B-tree file at `target`, calling `progress` every ten pages
/// and once more at the end with the final count.
pub fn verify(target: &str, progress: Option<&mut dyn FnMut(&str, u64)>) -> Result<VerifyReport> {
    run(target, progress, None)
}

/// As `verify`, but also writes a human-readable dump of every page visited
/// to `dump`.
pub fn verify_dump(
    target: &str,
    progress: Option<&mut dyn FnMut(&str, u64)>,
    dump: &mut dyn Write,
) -> Result<VerifyReport> {
    run(target, progress, Some(dump))
}

fn run(
    target: &str,
    progress: Option<&mut dyn FnMut(&str, u64)>,
    dump: Option<&mut dyn Write>,
) -> Result<VerifyReport> {
    let mut cache = FileCache::open(target, format::DEFAULT_ALLOC_SIZE)
        .with_context(|| format!("opening {target}"))?;

    let desc_page = match cache.page_in(DESC_PAGE_ADDR, DESC_PAGE_SIZE)? {
        PageLoad::Loaded(page) => page,
        PageLoad::Restart => anyhow::bail!("unexpected restart loading descriptor page"),
    };
    let desc_payload = DescriptorPayload::parse(&desc_page.buf)?;

    // Unchecked, tautological seeding pass: a standalone verify run has no
    // already-open database handle to check the descriptor against, so it
    // trusts the descriptor's own size parameters and takes the file's
    // second fragment as the tree root. root_addr/root_size aren't part of
    // the descriptor payload itself (see `descriptor::DatabaseParams`), so
    // this is the CLI's best stand-in for "the handle already knows".
    let alloc_size = format::DEFAULT_ALLOC_SIZE;
    let root_addr = DESC_PAGE_ADDR + (DESC_PAGE_SIZE / alloc_size).max(1);
    let params = desc_payload.seed_params(alloc_size, root_addr, alloc_size);

    let primary = ByteCollation;
    let duplicate = ByteCollation;
    let mut fragment_map = FragmentMap::new(cache.file_size(), params.alloc_size)?;

    let pages_verified;
    {
        let mut ctx = VerifyContext {
            cache: &mut cache,
            params: &params,
            primary: &primary,
            duplicate: &duplicate,
            huffman_key: None,
            huffman_data: None,
            fragment_map: Some(&mut fragment_map),
            progress,
            dump,
            target_name: target,
            page_count: 0,
        };

        // The final progress callback fires exactly once regardless of
        // outcome (SPEC_FULL §7; mirrors the reference verifier's `vs->f`
        // call at its `err:` label), so the walk's result is captured
        // rather than let `?` skip straight past the callback on error.
        let walk_result: VerifyResult<()> = (|| {
            validator::validate_page(&mut ctx, &desc_page)?;
            let root_off = Off { addr: params.root_addr, size: params.root_size, records: 0 };
            let mut state = WalkState::default();
            walker::walk(&mut ctx, None, 1, None, root_off, &mut state)
        })();

        pages_verified = ctx.page_count;
        if let Some(cb) = ctx.progress.as_mut() {
            cb(ctx.target_name, pages_verified);
        }
        walk_result?;
    }

    fragment_map.check_complete()?;

    Ok(VerifyReport { pages_verified })
}
