//! In-memory file-builder test helper: synthesizes well-formed and
//! deliberately-corrupted B-tree files for the scenarios in spec §8. Only
//! compiled for `#[cfg(test)]` or when a caller opts in with the `testutil`
//! feature (integration tests in `tests/` need the latter).

use crate::descriptor::{DatabaseParams, DescriptorPayload};
use crate::format::{
    BTREE_MAGIC, BTREE_MAJOR_VERSION, BTREE_MINOR_VERSION, DEFAULT_ALLOC_SIZE, DESC_PAGE_ADDR,
    DESC_PAGE_SIZE, DESC_PAYLOAD_SIZE, LEAF, NOLEVEL, OFF_SIZE, PAGE_HDR_SIZE,
};
use crate::header::PageHeader;
use crate::item::Off;

pub const PAGE_DESCRIPT: u8 = 1;
pub const PAGE_COL_FIX: u8 = 2;
pub const PAGE_COL_INT: u8 = 3;
pub const PAGE_COL_RCC: u8 = 4;
pub const PAGE_COL_VAR: u8 = 5;
pub const PAGE_DUP_INT: u8 = 6;
pub const PAGE_DUP_LEAF: u8 = 7;
pub const PAGE_OVFL: u8 = 8;
pub const PAGE_ROW_INT: u8 = 9;
pub const PAGE_ROW_LEAF: u8 = 10;

pub const ITEM_KEY: u8 = 1;
pub const ITEM_KEY_OVFL: u8 = 2;
pub const ITEM_KEY_DUP: u8 = 3;
pub const ITEM_KEY_DUP_OVFL: u8 = 4;
pub const ITEM_DATA: u8 = 5;
pub const ITEM_DATA_OVFL: u8 = 6;
pub const ITEM_DATA_DUP: u8 = 7;
pub const ITEM_DATA_DUP_OVFL: u8 = 8;
pub const ITEM_DEL: u8 = 9;
pub const ITEM_OFF: u8 = 10;

/// A plain byte-run item, used for building ROW_LEAF/ROW_INT/DUP_INT/DUP_LEAF
/// bodies in file order.
pub fn key_item(key: &[u8]) -> (u8, Vec<u8>) {
    (ITEM_KEY, key.to_vec())
}

pub fn data_item(data: &[u8]) -> (u8, Vec<u8>) {
    (ITEM_DATA, data.to_vec())
}

pub fn data_dup_item(data: &[u8]) -> (u8, Vec<u8>) {
    (ITEM_DATA_DUP, data.to_vec())
}

pub fn off_item(off: Off) -> (u8, Vec<u8>) {
    let mut v = vec![0u8; OFF_SIZE];
    off.write_into(&mut v);
    (ITEM_OFF, v)
}

/// Grows a flat in-memory file byte-by-byte, page by page, to the exact
/// on-disk layout the verifier reads. Not meant to be fast; meant to be an
/// obviously-correct mirror of the format described in spec §3.
pub struct FileBuilder {
    pub alloc_size: u32,
    pub buf: Vec<u8>,
}

impl FileBuilder {
    pub fn new(alloc_size: u32) -> Self {
        FileBuilder { alloc_size, buf: Vec::new() }
    }

    /// Reserves `size` bytes (a multiple of `alloc_size`) at the next free
    /// fragment and returns its fragment address.
    pub fn reserve(&mut self, size: u32) -> u32 {
        assert_eq!(size % self.alloc_size, 0, "page size must be a multiple of the fragment size");
        let addr = (self.buf.len() as u32) / self.alloc_size;
        self.buf.resize(self.buf.len() + size as usize, 0);
        addr
    }

    fn page_buf_mut(&mut self, addr: u32, size: u32) -> &mut [u8] {
        let start = addr as usize * self.alloc_size as usize;
        &mut self.buf[start..start + size as usize]
    }

    pub fn write_descriptor(&mut self, params: &DatabaseParams) -> u32 {
        let addr = self.reserve(DESC_PAGE_SIZE);
        assert_eq!(addr, DESC_PAGE_ADDR);
        let hdr = PageHeader {
            type_raw: PAGE_DESCRIPT,
            level: NOLEVEL,
            start_recno: 0,
            lsn: [0, 0],
            unused: [0, 0],
            datalen: DESC_PAYLOAD_SIZE as u32,
            num_entries: 0,
        };
        let payload = DescriptorPayload {
            magic: params.magic,
            majorv: params.major_version,
            minorv: params.minor_version,
            intlmin: params.intl_min,
            intlmax: params.intl_max,
            leafmin: params.leaf_min,
            leafmax: params.leaf_max,
            recno_offset: 0,
            fixed_len: params.fixed_len,
            flags: 0,
            unused1: [0; 7],
            unused2: [0; 32],
        };
        let buf = self.page_buf_mut(addr, DESC_PAGE_SIZE);
        hdr.write_into(buf);
        payload.write_into(buf);
        addr
    }

    fn write_item(buf: &mut [u8], pos: usize, item_type: u8, payload: &[u8]) -> usize {
        buf[pos] = item_type;
        buf[pos + 1..pos + 5].copy_from_slice(&(payload.len() as u32).to_be_bytes());
        buf[pos + 5..pos + 5 + payload.len()].copy_from_slice(payload);
        pos + 5 + payload.len()
    }

    /// Writes an item-bearing page (ROW_LEAF, ROW_INT, DUP_INT, DUP_LEAF,
    /// COL_VAR): a header followed by the given `(item_type, payload)`
    /// sequence, in file order.
    pub fn write_item_page(&mut self, size: u32, type_raw: u8, level: u32, items: &[(u8, Vec<u8>)]) -> u32 {
        let addr = self.reserve(size);
        let hdr = PageHeader {
            type_raw,
            level,
            start_recno: 0,
            lsn: [0, 0],
            unused: [0, 0],
            datalen: 0,
            num_entries: items.len() as u32,
        };
        let buf = self.page_buf_mut(addr, size);
        hdr.write_into(buf);
        let mut pos = PAGE_HDR_SIZE;
        for (item_type, payload) in items {
            pos = Self::write_item(buf, pos, *item_type, payload);
        }
        addr
    }

    /// Like `write_item_page`, but also returns the page-local byte offset
    /// of each item's header -- used by tests that need to reach in and
    /// corrupt a specific item's length field (the truncated-item scenario).
    pub fn write_item_page_with_offsets(
        &mut self,
        size: u32,
        type_raw: u8,
        level: u32,
        items: &[(u8, Vec<u8>)],
    ) -> (u32, Vec<usize>) {
        let addr = self.reserve(size);
        let hdr = PageHeader {
            type_raw,
            level,
            start_recno: 0,
            lsn: [0, 0],
            unused: [0, 0],
            datalen: 0,
            num_entries: items.len() as u32,
        };
        let buf = self.page_buf_mut(addr, size);
        hdr.write_into(buf);
        let mut pos = PAGE_HDR_SIZE;
        let mut offsets = Vec::with_capacity(items.len());
        for (item_type, payload) in items {
            offsets.push(pos);
            pos = Self::write_item(buf, pos, *item_type, payload);
        }
        (addr, offsets)
    }

    /// Writes a COL_INT page: a header followed by untagged, fixed-size
    /// `OFF` entries (column-internal pages don't tag their entries the way
    /// key-bearing pages do).
    pub fn write_col_int(&mut self, size: u32, level: u32, start_recno: u64, entries: &[Off]) -> u32 {
        let addr = self.reserve(size);
        let hdr = PageHeader {
            type_raw: PAGE_COL_INT,
            level,
            start_recno,
            lsn: [0, 0],
            unused: [0, 0],
            datalen: 0,
            num_entries: entries.len() as u32,
        };
        let buf = self.page_buf_mut(addr, size);
        hdr.write_into(buf);
        let mut pos = PAGE_HDR_SIZE;
        for off in entries {
            off.write_into(&mut buf[pos..pos + OFF_SIZE]);
            pos += OFF_SIZE;
        }
        addr
    }

    pub fn write_col_fix(&mut self, size: u32, start_recno: u64, fixed_len: u32, entries: &[Vec<u8>]) -> u32 {
        let addr = self.reserve(size);
        let hdr = PageHeader {
            type_raw: PAGE_COL_FIX,
            level: LEAF,
            start_recno,
            lsn: [0, 0],
            unused: [0, 0],
            datalen: 0,
            num_entries: entries.len() as u32,
        };
        let buf = self.page_buf_mut(addr, size);
        hdr.write_into(buf);
        let mut pos = PAGE_HDR_SIZE;
        for e in entries {
            assert_eq!(e.len(), fixed_len as usize);
            buf[pos..pos + fixed_len as usize].copy_from_slice(e);
            pos += fixed_len as usize;
        }
        addr
    }

    pub fn write_col_rcc(
        &mut self,
        size: u32,
        start_recno: u64,
        fixed_len: u32,
        entries: &[(u16, Vec<u8>)],
    ) -> u32 {
        let addr = self.reserve(size);
        let hdr = PageHeader {
            type_raw: PAGE_COL_RCC,
            level: LEAF,
            start_recno,
            lsn: [0, 0],
            unused: [0, 0],
            datalen: 0,
            num_entries: entries.len() as u32,
        };
        let buf = self.page_buf_mut(addr, size);
        hdr.write_into(buf);
        let mut pos = PAGE_HDR_SIZE;
        for (count, payload) in entries {
            assert_eq!(payload.len(), fixed_len as usize);
            buf[pos..pos + 2].copy_from_slice(&count.to_be_bytes());
            buf[pos + 2..pos + 2 + fixed_len as usize].copy_from_slice(payload);
            pos += 2 + fixed_len as usize;
        }
        addr
    }

    pub fn write_ovfl(&mut self, size: u32, data: &[u8]) -> u32 {
        let addr = self.reserve(size);
        let hdr = PageHeader {
            type_raw: PAGE_OVFL,
            level: LEAF,
            start_recno: 0,
            lsn: [0, 0],
            unused: [0, 0],
            datalen: data.len() as u32,
            num_entries: 0,
        };
        let buf = self.page_buf_mut(addr, size);
        hdr.write_into(buf);
        buf[PAGE_HDR_SIZE..PAGE_HDR_SIZE + data.len()].copy_from_slice(data);
        addr
    }

    pub fn off_for(&self, addr: u32, size: u32, records: u64) -> Off {
        Off { addr, size, records }
    }

    /// XORs a single byte inside the page at `addr`, `byte_offset` bytes into
    /// its on-disk bytes -- the localisation property's mutation (§8.2).
    pub fn corrupt_byte(&mut self, addr: u32, byte_offset: usize, mask: u8) {
        let start = addr as usize * self.alloc_size as usize + byte_offset;
        self.buf[start] ^= mask;
    }

    pub fn write_to_tempfile(&self) -> std::io::Result<tempfile::NamedTempFile> {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new()?;
        f.write_all(&self.buf)?;
        f.flush()?;
        Ok(f)
    }
}

pub fn default_params() -> DatabaseParams {
    DatabaseParams {
        magic: BTREE_MAGIC,
        major_version: BTREE_MAJOR_VERSION,
        minor_version: BTREE_MINOR_VERSION,
        intl_min: 512,
        intl_max: 16384,
        leaf_min: 512,
        leaf_max: 16384,
        fixed_len: 0,
        alloc_size: DEFAULT_ALLOC_SIZE,
        root_addr: 1,
        root_size: DEFAULT_ALLOC_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_minimal_row_leaf_file() {
        let params = default_params();
        let mut fb = FileBuilder::new(params.alloc_size);
        fb.write_descriptor(&params);
        let addr = fb.write_item_page(
            fb.alloc_size,
            PAGE_ROW_LEAF,
            LEAF,
            &[key_item(b"a"), data_item(b"1"), key_item(b"b"), data_item(b"2")],
        );
        assert_eq!(addr, params.root_addr);
        assert_eq!(fb.buf.len(), 2 * params.alloc_size as usize);
    }
}
