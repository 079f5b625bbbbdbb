//! On-disk constants for the B-tree file format. None of these values carry
//! meaning beyond "the descriptor page must match them" -- see
//! `descriptor::validate`.

use crate::error::VerifyError;

pub const BTREE_MAGIC: u32 = 0x4257_5442; // "BTWB" read big-endian
pub const BTREE_MAJOR_VERSION: u16 = 3;
pub const BTREE_MINOR_VERSION: u16 = 1;

/// Minimum allocation unit of the file, in bytes. Page addresses are
/// expressed in units of this size.
pub const DEFAULT_ALLOC_SIZE: u32 = 512;

/// Size, in bytes, of the descriptor page. Always at fragment address 0.
pub const DESC_PAGE_SIZE: u32 = 512;
pub const DESC_PAGE_ADDR: u32 = 0;

/// `level` sentinel meaning "this is the root call, adopt the page's own
/// level as ground truth."
pub const NOLEVEL: u32 = u32::MAX;
/// `level` value shared by every leaf-shaped page (including overflow pages).
pub const LEAF: u32 = 0;

/// Bits legal in a descriptor's `flags` field.
pub const DESC_REPEAT: u8 = 0x01;
pub const DESC_MASK: u8 = DESC_REPEAT;

/// Byte layout of the common page header: type(1) + level(4) + start_recno(8)
/// + lsn(4+4) + unused(1+1) + u.datalen(4) + num_entries(4).
pub const PAGE_HDR_SIZE: usize = 31;

/// On-disk size of a tagged item header: type(1) + length(4).
pub const ITEM_HDR_SIZE: usize = 5;

/// `sizeof(OVFL)`: addr(4) + size(4) + datalen(4).
pub const OVFL_SIZE: usize = 12;

/// `sizeof(OFF)`: addr(4) + size(4) + records(8).
pub const OFF_SIZE: usize = 16;

/// Marker byte written as the first byte of a deleted fixed-length entry.
pub const FIX_DELETE_BYTE: u8 = 0xFF;

/// On-disk size of the descriptor page's payload (`PAGE_DESC`).
pub const DESC_PAYLOAD_SIZE: usize = 76;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Descript,
    ColFix,
    ColInt,
    ColRcc,
    ColVar,
    DupInt,
    DupLeaf,
    Ovfl,
    RowInt,
    RowLeaf,
}

impl PageType {
    pub fn from_u8(addr: u32, val: u8) -> Result<Self, VerifyError> {
        Ok(match val {
            1 => PageType::Descript,
            2 => PageType::ColFix,
            3 => PageType::ColInt,
            4 => PageType::ColRcc,
            5 => PageType::ColVar,
            6 => PageType::DupInt,
            7 => PageType::DupLeaf,
            8 => PageType::Ovfl,
            9 => PageType::RowInt,
            10 => PageType::RowLeaf,
            _ => return Err(VerifyError::InvalidPageType { addr, found: val }),
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Descript => "descriptor",
            PageType::ColFix => "column fixed-length",
            PageType::ColInt => "column internal",
            PageType::ColRcc => "column run-length-compressed",
            PageType::ColVar => "column variable-length",
            PageType::DupInt => "duplicate internal",
            PageType::DupLeaf => "duplicate leaf",
            PageType::Ovfl => "overflow",
            PageType::RowInt => "row internal",
            PageType::RowLeaf => "row leaf",
        }
    }

    pub fn is_leaf_shaped(&self) -> bool {
        matches!(
            self,
            PageType::ColFix
                | PageType::ColRcc
                | PageType::ColVar
                | PageType::DupLeaf
                | PageType::Ovfl
                | PageType::RowLeaf
        )
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, PageType::ColInt | PageType::DupInt | PageType::RowInt)
    }

    pub fn is_column_store(&self) -> bool {
        matches!(
            self,
            PageType::ColFix | PageType::ColInt | PageType::ColRcc | PageType::ColVar
        )
    }

    pub fn is_row_or_dup_store(&self) -> bool {
        matches!(
            self,
            PageType::DupInt | PageType::DupLeaf | PageType::RowInt | PageType::RowLeaf
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Key,
    KeyOvfl,
    KeyDup,
    KeyDupOvfl,
    Data,
    DataOvfl,
    DataDup,
    DataDupOvfl,
    Del,
    Off,
}

impl ItemType {
    pub fn from_u8(val: u8) -> Option<Self> {
        Some(match val {
            1 => ItemType::Key,
            2 => ItemType::KeyOvfl,
            3 => ItemType::KeyDup,
            4 => ItemType::KeyDupOvfl,
            5 => ItemType::Data,
            6 => ItemType::DataOvfl,
            7 => ItemType::DataDup,
            8 => ItemType::DataDupOvfl,
            9 => ItemType::Del,
            10 => ItemType::Off,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Key => "key",
            ItemType::KeyOvfl => "overflow key",
            ItemType::KeyDup => "duplicate key",
            ItemType::KeyDupOvfl => "overflow duplicate key",
            ItemType::Data => "data",
            ItemType::DataOvfl => "overflow data",
            ItemType::DataDup => "duplicate data",
            ItemType::DataDupOvfl => "overflow duplicate data",
            ItemType::Del => "deleted",
            ItemType::Off => "off-page",
        }
    }

    /// The page kinds on which this item type is legal, per the
    /// item/page kind compatibility table.
    pub fn legal_on(&self, page_type: PageType) -> bool {
        use PageType::*;
        match self {
            ItemType::Key | ItemType::KeyOvfl => matches!(page_type, RowInt | RowLeaf),
            ItemType::KeyDup | ItemType::KeyDupOvfl => matches!(page_type, DupInt),
            ItemType::Data | ItemType::DataOvfl => matches!(page_type, ColVar | RowLeaf),
            ItemType::DataDup | ItemType::DataDupOvfl => matches!(page_type, DupLeaf | RowLeaf),
            // Open question (see DESIGN.md): preserved strict per reference behaviour.
            ItemType::Del => matches!(page_type, ColVar),
            ItemType::Off => matches!(page_type, DupInt | RowInt | RowLeaf),
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, ItemType::Key | ItemType::KeyOvfl | ItemType::KeyDup | ItemType::KeyDupOvfl)
    }

    pub fn is_dup_data(&self) -> bool {
        matches!(self, ItemType::DataDup | ItemType::DataDupOvfl)
    }

    pub fn is_overflow(&self) -> bool {
        matches!(
            self,
            ItemType::KeyOvfl | ItemType::KeyDupOvfl | ItemType::DataOvfl | ItemType::DataDupOvfl
        )
    }
}
