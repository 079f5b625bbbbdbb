//! The Page Validator: given a loaded page, validates its header, level,
//! type, item/entry layout, overflow references, and (for the descriptor
//! page) global parameters. Dispatches on page kind.

use std::cmp::Ordering;
use std::io::Write;

use crate::cache::{self, Page, PageCache};
use crate::descriptor;
use crate::error::{VerifyError, VerifyResult};
use crate::format::{PageType, FIX_DELETE_BYTE, LEAF, NOLEVEL, OFF_SIZE, PAGE_HDR_SIZE};
use crate::header::PageHeader;
use crate::huffman;
use crate::item::{self, ItemPayload, Off};
use crate::walker::{self, WalkState};
use crate::VerifyContext;

/// The structural result of validating one page, handed to the Tree Walker
/// so it can enforce the cross-page invariants that don't appear in any
/// single page header.
pub struct PageValidation {
    pub page_type: PageType,
    pub header: PageHeader,
    pub body: PageBody,
}

pub enum PageBody {
    Descript,
    ColFix { records: u64 },
    ColInt { entries: Vec<Off> },
    ColRcc { records: u64 },
    ColVar { records: u64 },
    DupInt { entries: Vec<(Vec<u8>, Off)> },
    DupLeaf { first: Option<Vec<u8>>, last: Option<Vec<u8>> },
    Ovfl,
    RowInt { entries: Vec<(Vec<u8>, Off)> },
    RowLeaf { first: Option<Vec<u8>>, last: Option<Vec<u8>> },
}

impl PageBody {
    /// Total leaf-record count this page accounts for, used by the Tree
    /// Walker's column-store accounting check (§4.4 step 4, §8 property 5).
    /// Only meaningful for column-store page kinds.
    pub fn column_records(&self) -> Option<u64> {
        match self {
            PageBody::ColFix { records } | PageBody::ColRcc { records } | PageBody::ColVar { records } => {
                Some(*records)
            }
            PageBody::ColInt { entries } => Some(entries.iter().map(|e| e.records).sum()),
            _ => None,
        }
    }
}

pub fn validate_page<C: PageCache>(
    ctx: &mut VerifyContext<C>,
    page: &Page,
) -> VerifyResult<PageValidation> {
    ctx.page_count += 1;
    if ctx.page_count % 10 == 0 {
        if let Some(cb) = ctx.progress.as_mut() {
            cb(ctx.target_name, ctx.page_count);
        }
    }
    if let Some(map) = ctx.fragment_map.as_mut() {
        map.add(page.addr, page.size, ctx.params.alloc_size)?;
    }

    let hdr = PageHeader::parse(&page.buf, page.addr)?;
    if hdr.lsn[0] != 0 || hdr.lsn[1] != 0 {
        return Err(VerifyError::NonZeroLsn { addr: page.addr });
    }
    if hdr.unused[0] != 0 || hdr.unused[1] != 0 {
        return Err(VerifyError::NonZeroUnused { addr: page.addr });
    }
    let page_type = hdr.page_type(page.addr)?;

    if page_type == PageType::Descript {
        if hdr.level != NOLEVEL {
            return Err(VerifyError::BadPageLevel { addr: page.addr, found: hdr.level as i64 });
        }
    } else if page_type.is_leaf_shaped() {
        if hdr.level != LEAF {
            return Err(VerifyError::BadPageLevel { addr: page.addr, found: hdr.level as i64 });
        }
    } else {
        debug_assert!(page_type.is_internal());
        if hdr.level == NOLEVEL || hdr.level <= LEAF {
            return Err(VerifyError::BadPageLevel { addr: page.addr, found: hdr.level as i64 });
        }
    }

    let body = match page_type {
        PageType::Descript => {
            descriptor::validate(page, ctx.params)?;
            PageBody::Descript
        }
        PageType::ColFix => {
            validate_col_fix(page, &hdr, ctx.params.fixed_len)?;
            PageBody::ColFix { records: hdr.num_entries as u64 }
        }
        PageType::ColRcc => {
            let records = validate_col_rcc(page, &hdr, ctx.params.fixed_len)?;
            PageBody::ColRcc { records }
        }
        PageType::ColInt => {
            let entries = validate_col_int(ctx, page, &hdr)?;
            PageBody::ColInt { entries }
        }
        PageType::Ovfl => {
            validate_ovfl(page, &hdr)?;
            PageBody::Ovfl
        }
        PageType::ColVar | PageType::DupInt | PageType::DupLeaf | PageType::RowInt | PageType::RowLeaf => {
            validate_item_bearing(ctx, page, page_type, &hdr)?
        }
    };

    if let Some(w) = ctx.dump.as_mut() {
        let _ = writeln!(w, "page addr={} size={} type={:?} level={}", page.addr, page.size, page_type, hdr.level);
    }

    log::debug!("verified page addr={} type={:?}", page.addr, page_type);

    Ok(PageValidation { page_type, header: hdr, body })
}

fn validate_col_fix(page: &Page, hdr: &PageHeader, fixed_len: u32) -> VerifyResult<()> {
    let addr = page.addr;
    let len = fixed_len as usize;
    if len == 0 && hdr.num_entries > 0 {
        return Err(VerifyError::ZeroFixedLen { addr });
    }
    let mut pos = PAGE_HDR_SIZE;
    for i in 0..hdr.num_entries {
        let entry_num = i + 1;
        if pos + len > page.buf.len() {
            return Err(VerifyError::ExtendsPastEndOfPage { item_num: entry_num, addr });
        }
        let entry = &page.buf[pos..pos + len];
        if entry[0] == FIX_DELETE_BYTE && entry[1..].iter().any(|&b| b != 0) {
            return Err(VerifyError::DeletedEntryNotNul { entry_num, addr });
        }
        pos += len;
    }
    Ok(())
}

fn validate_col_rcc(page: &Page, hdr: &PageHeader, fixed_len: u32) -> VerifyResult<u64> {
    let addr = page.addr;
    if fixed_len == 0 && hdr.num_entries > 0 {
        return Err(VerifyError::ZeroFixedLen { addr });
    }
    let entry_len = 2 + fixed_len as usize;
    let mut pos = PAGE_HDR_SIZE;
    let mut last_payload: Option<&[u8]> = None;
    let mut last_count: u16 = 0;
    let mut total_records: u64 = 0;
    for i in 0..hdr.num_entries {
        let entry_num = i + 1;
        if pos + entry_len > page.buf.len() {
            return Err(VerifyError::ExtendsPastEndOfPage { item_num: entry_num, addr });
        }
        let count = u16::from_be_bytes(page.buf[pos..pos + 2].try_into()?);
        let payload = &page.buf[pos + 2..pos + entry_len];
        if count == 0 {
            return Err(VerifyError::ZeroRepeatCount { entry_num, addr });
        }
        if payload[0] == FIX_DELETE_BYTE && payload[1..].iter().any(|&b| b != 0) {
            return Err(VerifyError::DeletedEntryNotNul { entry_num, addr });
        }
        if let Some(prev) = last_payload {
            if prev == payload && last_count < u16::MAX {
                return Err(VerifyError::MissedRccCompression { a: entry_num, b: entry_num - 1, addr });
            }
        }
        last_payload = Some(payload);
        last_count = count;
        total_records += count as u64;
        pos += entry_len;
    }
    Ok(total_records)
}

fn validate_ovfl(page: &Page, hdr: &PageHeader) -> VerifyResult<()> {
    let addr = page.addr;
    if hdr.datalen == 0 {
        return Err(VerifyError::EmptyOverflowPage { addr });
    }
    let start = PAGE_HDR_SIZE + hdr.datalen as usize;
    if start > page.buf.len() {
        return Err(VerifyError::ExtendsPastEndOfPage { item_num: 0, addr });
    }
    if page.buf[start..].iter().any(|&b| b != 0) {
        return Err(VerifyError::OverflowTrailingBytes { addr });
    }
    Ok(())
}

fn validate_col_int<C: PageCache>(
    ctx: &VerifyContext<C>,
    page: &Page,
    hdr: &PageHeader,
) -> VerifyResult<Vec<Off>> {
    let addr = page.addr;
    let mut pos = PAGE_HDR_SIZE;
    let mut entries = Vec::with_capacity(hdr.num_entries as usize);
    for i in 0..hdr.num_entries {
        let entry_num = i + 1;
        if pos + OFF_SIZE > page.buf.len() {
            return Err(VerifyError::ExtendsPastEndOfPage { item_num: entry_num, addr });
        }
        let off = Off::parse(&page.buf[pos..pos + OFF_SIZE])?;
        if cache::extends_past_eof(ctx.params.alloc_size, off.addr, off.size, ctx.cache.file_size()) {
            return Err(VerifyError::ReferencesPastEndOfFile { item_num: entry_num, addr });
        }
        entries.push(off);
        pos += OFF_SIZE;
    }
    Ok(entries)
}

/// Walks the tagged item sequence of an item-bearing page (COL_VAR, DUP_INT,
/// DUP_LEAF, ROW_INT, ROW_LEAF), enforcing extent/type/length checks, the
/// three-slot sort-order rotation (§4.2.a, §9), and overflow-reference
/// recursion. Returns the structural pieces the Tree Walker needs: routing
/// entries for internal pages, first/last sortable-key material for leaves.
fn validate_item_bearing<C: PageCache>(
    ctx: &mut VerifyContext<C>,
    page: &Page,
    page_type: PageType,
    hdr: &PageHeader,
) -> VerifyResult<PageBody> {
    let addr = page.addr;
    let items = item::parse_items(&page.buf, PAGE_HDR_SIZE, hdr.num_entries, addr)?;

    // The comparator is selected once per page, not per item class -- a
    // ROW_LEAF's inline duplicate-data items are compared with the same
    // function as its keys. See DESIGN.md for why this deviates from a
    // naive per-item-class reading of the duplicate-collation language.
    let collation = ctx.collation_for(page_type);

    let mut last_key: Option<(u32, Vec<u8>)> = None;
    let mut first_key: Option<Vec<u8>> = None;
    let mut last_data: Option<(u32, Vec<u8>)> = None;
    let mut first_data: Option<Vec<u8>> = None;
    let mut routing_entries: Vec<(Vec<u8>, Off)> = Vec::new();
    let mut pending_key: Option<Vec<u8>> = None;

    for it in &items {
        if !it.item_type.legal_on(page_type) {
            return Err(VerifyError::IllegalItemPageCombo {
                item_num: it.item_num,
                addr,
                item_type: it.item_type.as_str(),
                page_type: page_type.as_str(),
            });
        }

        let material: Option<Vec<u8>> = match &it.payload {
            ItemPayload::Del => None,
            ItemPayload::Off(off) => {
                if cache::extends_past_eof(ctx.params.alloc_size, off.addr, off.size, ctx.cache.file_size()) {
                    return Err(VerifyError::ReferencesPastEndOfFile { item_num: it.item_num, addr });
                }
                if page_type == PageType::RowLeaf {
                    let mut dup_state = WalkState::default();
                    walker::walk(ctx, None, 0, None, *off, &mut dup_state)?;
                }
                if matches!(page_type, PageType::RowInt | PageType::DupInt) {
                    if let Some(k) = pending_key.take() {
                        routing_entries.push((k, *off));
                    }
                }
                None
            }
            ItemPayload::Inline(bytes) => {
                if it.item_type.is_key() || it.item_type.is_dup_data() {
                    let codec = if it.item_type.is_key() { ctx.huffman_key } else { ctx.huffman_data };
                    let m = huffman::process_inline(bytes, codec)?;
                    Some(m.bytes().to_vec())
                } else {
                    None
                }
            }
            ItemPayload::Ovfl(ovfl) => {
                if cache::extends_past_eof(ctx.params.alloc_size, ovfl.addr, ovfl.size, ctx.cache.file_size()) {
                    return Err(VerifyError::ReferencesPastEndOfFile { item_num: it.item_num, addr });
                }
                let ovfl_page = ctx.cache.ovfl_in(ovfl)?;
                validate_page(ctx, &ovfl_page)?;
                let ovfl_hdr = PageHeader::parse(&ovfl_page.buf, ovfl_page.addr)?;
                if ovfl.datalen != ovfl_hdr.datalen {
                    return Err(VerifyError::OverflowSizeMismatch { item_num: it.item_num, addr });
                }
                if it.item_type.is_key() || it.item_type.is_dup_data() {
                    let codec = if it.item_type.is_key() { ctx.huffman_key } else { ctx.huffman_data };
                    let m = huffman::process_overflow(ctx.cache, ovfl, codec)?;
                    Some(m.bytes().to_vec())
                } else {
                    None
                }
            }
        };

        if let Some(bytes) = material {
            if it.item_type.is_key() {
                if let Some((prev_num, prev_bytes)) = &last_key {
                    if collation.compare(prev_bytes, &bytes) != Ordering::Less {
                        return Err(VerifyError::ItemsOutOfOrder { a: *prev_num, b: it.item_num, addr });
                    }
                }
                if first_key.is_none() {
                    first_key = Some(bytes.clone());
                }
                if matches!(page_type, PageType::RowInt | PageType::DupInt) {
                    pending_key = Some(bytes.clone());
                }
                last_key = Some((it.item_num, bytes));
            } else if it.item_type.is_dup_data() {
                if let Some((prev_num, prev_bytes)) = &last_data {
                    if collation.compare(prev_bytes, &bytes) != Ordering::Less {
                        return Err(VerifyError::ItemsOutOfOrder { a: *prev_num, b: it.item_num, addr });
                    }
                }
                if first_data.is_none() {
                    first_data = Some(bytes.clone());
                }
                last_data = Some((it.item_num, bytes));
            }
        }
    }

    Ok(match page_type {
        PageType::ColVar => PageBody::ColVar { records: items.len() as u64 },
        PageType::RowInt => PageBody::RowInt { entries: routing_entries },
        PageType::DupInt => PageBody::DupInt { entries: routing_entries },
        PageType::RowLeaf => PageBody::RowLeaf { first: first_key, last: last_key.map(|(_, b)| b) },
        PageType::DupLeaf => PageBody::DupLeaf { first: first_data, last: last_data.map(|(_, b)| b) },
        _ => unreachable!("validate_item_bearing called with a non-item page type"),
    })
}
