//! The Tree Walker: depth-first recursion from the root. Validates each page
//! via the Page Validator, then checks the inter-page invariants that don't
//! appear in any single page header -- parent/child level, parent/child
//! record counts (column stores), and parent-key/child-key boundary
//! comparisons (row/dup stores). Drives the Fragment Map through the
//! validator.

use std::cmp::Ordering;

use crate::cache::{Page, PageCache, PageLoad};
use crate::error::{VerifyError, VerifyResult};
use crate::format::{PageType, LEAF};
use crate::item::Off;
use crate::validator::{self, PageBody, PageValidation};
use crate::VerifyContext;

/// A sortable key, carried across a frame boundary at the *same* tree level
/// so the next internal edge can perform the `last_key(prev_leaf) <
/// parent_key` check (§4.4 step 7/8). Owned by the walker's state, not
/// per-frame: it outlives the frame of the leaf that produced it and is
/// consumed by a sibling frame, never by the frame's own caller.
#[derive(Debug, Clone, Default)]
pub struct WalkState {
    pub leaf: Option<Vec<u8>>,
}

/// Loads the page at `(addr, size)`. The cache may report a restart meaning
/// the page moved while being read; per §9, that's retried exactly once at
/// the root and is a hard error everywhere else, since deeper loads are
/// stabilised by the parent's hazard reference.
fn load_page<C: PageCache>(ctx: &mut VerifyContext<C>, addr: u32, size: u32, is_root: bool) -> VerifyResult<Page> {
    match ctx.cache.page_in(addr, size)? {
        PageLoad::Loaded(page) => Ok(page),
        PageLoad::Restart if is_root => match ctx.cache.page_in(addr, size)? {
            PageLoad::Loaded(page) => Ok(page),
            PageLoad::Restart => Err(VerifyError::UnexpectedRestart),
        },
        PageLoad::Restart => Err(VerifyError::UnexpectedRestart),
    }
}

/// Depth-first descent into the page at `off`.
///
/// - `parent_key`: the key the parent used to route to this child, or `None`
///   at a true root (the main tree root, or the root of an off-page
///   duplicate subtree).
/// - `expected_start_recno`: the running record-number accumulator a column
///   store child must match (ignored by row/dup stores, which always expect
///   zero on non-root pages).
/// - `expected_level`: `None` marks a root call -- the page's own level is
///   adopted as ground truth instead of being checked against a parent.
/// - `off`: the parent's reference to this page, including the `records`
///   count column stores are held to (meaningless, and not checked, at the
///   root -- there is no real parent entry to check it against).
pub fn walk<C: PageCache>(
    ctx: &mut VerifyContext<C>,
    parent_key: Option<&[u8]>,
    expected_start_recno: u64,
    expected_level: Option<u32>,
    off: Off,
    state: &mut WalkState,
) -> VerifyResult<()> {
    let is_root = expected_level.is_none();
    let page = load_page(ctx, off.addr, off.size, is_root)?;

    let PageValidation { page_type, header, body } = validator::validate_page(ctx, &page)?;

    if let Some(expected) = expected_level {
        if header.level != expected {
            return Err(VerifyError::LevelMismatch { addr: off.addr, found: header.level, expected });
        }
    }

    if page_type.is_column_store() {
        if header.start_recno != expected_start_recno {
            return Err(VerifyError::StartRecnoMismatch {
                addr: off.addr,
                found: header.start_recno,
                expected: expected_start_recno,
            });
        }
        if !is_root {
            let actual = body.column_records().unwrap_or(0);
            if actual != off.records {
                return Err(VerifyError::RecordCountMismatch { addr: off.addr, found: actual, expected: off.records });
            }
        }
    } else if page_type.is_row_or_dup_store() {
        if !is_root && header.start_recno != 0 {
            return Err(VerifyError::NonZeroStartRecno { addr: off.addr, found: header.start_recno });
        }
        if let Some(pk) = parent_key {
            check_first_key(ctx, off.addr, page_type, pk, &body)?;
        }
    }

    let child_level = if header.level == LEAF { None } else { Some(header.level - 1) };

    match body {
        PageBody::ColInt { entries } => {
            let mut running_recno = expected_start_recno;
            for entry in entries {
                let mut child_state = WalkState::default();
                walk(ctx, None, running_recno, child_level, entry, &mut child_state)?;
                running_recno += entry.records;
            }
        }
        PageBody::RowInt { entries } | PageBody::DupInt { entries } => {
            for (key, child_off) in entries {
                if let Some(prev_last) = state.leaf.take() {
                    check_last_key(ctx, child_off.addr, page_type, &prev_last, &key)?;
                }
                walk(ctx, Some(key.as_slice()), 0, child_level, child_off, state)?;
            }
        }
        PageBody::RowLeaf { last, .. } | PageBody::DupLeaf { last, .. } => {
            state.leaf = last;
        }
        _ => {}
    }

    Ok(())
}

/// First-entry-mode check (§4.3): the child's first key must sort at or
/// after the parent's routing key.
fn check_first_key<C: PageCache>(
    ctx: &VerifyContext<C>,
    addr: u32,
    page_type: PageType,
    parent_key: &[u8],
    body: &PageBody,
) -> VerifyResult<()> {
    let first = match body {
        PageBody::RowInt { entries } | PageBody::DupInt { entries } => {
            entries.first().map(|(k, _)| k.as_slice())
        }
        PageBody::RowLeaf { first, .. } | PageBody::DupLeaf { first, .. } => first.as_deref(),
        _ => None,
    };
    if let Some(first_key) = first {
        let collation = ctx.collation_for(page_type);
        if collation.compare(first_key, parent_key) == Ordering::Less {
            return Err(VerifyError::FirstKeyBeforeParent { addr });
        }
    }
    Ok(())
}

/// Last-entry-mode check (§4.3): the previous leaf's last key must sort
/// strictly before the parent key for the edge that follows it.
fn check_last_key<C: PageCache>(
    ctx: &VerifyContext<C>,
    addr: u32,
    page_type: PageType,
    prev_last: &[u8],
    parent_key: &[u8],
) -> VerifyResult<()> {
    let collation = ctx.collation_for(page_type);
    if collation.compare(prev_last, parent_key) != Ordering::Less {
        return Err(VerifyError::LastKeyAfterParent { addr });
    }
    Ok(())
}
