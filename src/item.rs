//! Tagged item records on item-bearing pages, and the two fixed-size
//! references (`OVFL`, `OFF`) items may carry as their payload.

use std::convert::TryInto;

use crate::error::{VerifyError, VerifyResult};
use crate::format::{ItemType, ITEM_HDR_SIZE, OFF_SIZE, OVFL_SIZE};

/// An off-page reference: a subtree pointer (column/row/dup internal pages)
/// or an off-page duplicate tree root (`OFF` item on a `ROW_LEAF`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Off {
    pub addr: u32,
    pub size: u32,
    pub records: u64,
}

impl Off {
    pub fn parse(buf: &[u8]) -> VerifyResult<Self> {
        if buf.len() < OFF_SIZE {
            return Err(VerifyError::IllegalItemLength { item_num: 0, addr: 0 });
        }
        Ok(Off {
            addr: u32::from_be_bytes(buf[0..4].try_into()?),
            size: u32::from_be_bytes(buf[4..8].try_into()?),
            records: u64::from_be_bytes(buf[8..16].try_into()?),
        })
    }

    pub fn write_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.addr.to_be_bytes());
        buf[4..8].copy_from_slice(&self.size.to_be_bytes());
        buf[8..16].copy_from_slice(&self.records.to_be_bytes());
    }
}

/// A reference to an overflow page holding a single oversized key or data
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OvflRef {
    pub addr: u32,
    pub size: u32,
    pub datalen: u32,
}

impl OvflRef {
    pub fn parse(buf: &[u8]) -> VerifyResult<Self> {
        if buf.len() < OVFL_SIZE {
            return Err(VerifyError::IllegalItemLength { item_num: 0, addr: 0 });
        }
        Ok(OvflRef {
            addr: u32::from_be_bytes(buf[0..4].try_into()?),
            size: u32::from_be_bytes(buf[4..8].try_into()?),
            datalen: u32::from_be_bytes(buf[8..12].try_into()?),
        })
    }

    pub fn write_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.addr.to_be_bytes());
        buf[4..8].copy_from_slice(&self.size.to_be_bytes());
        buf[8..12].copy_from_slice(&self.datalen.to_be_bytes());
    }
}

/// Payload carried by a parsed item, still borrowing from the page buffer.
#[derive(Debug)]
pub enum ItemPayload<'a> {
    Inline(&'a [u8]),
    Ovfl(OvflRef),
    Off(Off),
    Del,
}

#[derive(Debug)]
pub struct ItemRef<'a> {
    /// 1-based position on the page, for diagnostics.
    pub item_num: u32,
    pub item_type: ItemType,
    pub payload: ItemPayload<'a>,
}

/// Walks the tagged item sequence starting at `buf[offset..]`, stopping after
/// `num_items` items or the first item that doesn't fit; bounds violations
/// are reported by the caller using the page's own `addr`, so this function
/// only does the raw cursor walk and structural `type`/`length` checks that
/// don't need the page address.
pub fn parse_items<'a>(
    buf: &'a [u8],
    offset: usize,
    num_items: u32,
    addr: u32,
) -> VerifyResult<Vec<ItemRef<'a>>> {
    let mut items = Vec::with_capacity(num_items as usize);
    let mut pos = offset;
    for i in 0..num_items {
        let item_num = i + 1;
        if pos + ITEM_HDR_SIZE > buf.len() {
            return Err(VerifyError::ExtendsPastEndOfPage { item_num, addr });
        }
        let type_raw = buf[pos];
        let length = u32::from_be_bytes(buf[pos + 1..pos + 5].try_into()?) as usize;
        let item_type = ItemType::from_u8(type_raw)
            .ok_or(VerifyError::IllegalItemType { item_num, addr, found: type_raw })?;

        // Check the declared length against the fixed size the item type
        // requires *before* checking whether it overruns the page -- a
        // wrong-length OFF/OVFL/DEL item that also happens to overrun the
        // page is a length violation first, matching the reference
        // verifier's `bt_vrfy.c` item walk.
        match item_type {
            ItemType::Del if length != 0 => {
                return Err(VerifyError::IllegalItemLength { item_num, addr });
            }
            ItemType::Off if length != OFF_SIZE => {
                return Err(VerifyError::IllegalItemLength { item_num, addr });
            }
            ItemType::KeyOvfl | ItemType::KeyDupOvfl | ItemType::DataOvfl | ItemType::DataDupOvfl
                if length != OVFL_SIZE =>
            {
                return Err(VerifyError::IllegalItemLength { item_num, addr });
            }
            _ => {}
        }

        let payload_start = pos + ITEM_HDR_SIZE;
        if payload_start + length > buf.len() {
            return Err(VerifyError::ExtendsPastEndOfPage { item_num, addr });
        }
        let payload_bytes = &buf[payload_start..payload_start + length];

        let payload = match item_type {
            ItemType::Del => ItemPayload::Del,
            ItemType::Off => ItemPayload::Off(Off::parse(payload_bytes)?),
            ItemType::KeyOvfl | ItemType::KeyDupOvfl | ItemType::DataOvfl | ItemType::DataDupOvfl => {
                ItemPayload::Ovfl(OvflRef::parse(payload_bytes)?)
            }
            ItemType::Key | ItemType::KeyDup | ItemType::Data | ItemType::DataDup => {
                ItemPayload::Inline(payload_bytes)
            }
        };

        items.push(ItemRef { item_num, item_type, payload });
        pos = payload_start + length;
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_header(item_type: u8, length: u32) -> Vec<u8> {
        let mut v = vec![item_type];
        v.extend_from_slice(&length.to_be_bytes());
        v
    }

    #[test]
    fn parses_a_single_key_item() {
        let mut buf = item_header(1, 3); // ItemType::Key
        buf.extend_from_slice(b"abc");
        let items = parse_items(&buf, 0, 1, 7).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_num, 1);
        match items[0].payload {
            ItemPayload::Inline(bytes) => assert_eq!(bytes, b"abc"),
            _ => panic!("expected inline payload"),
        }
    }

    #[test]
    fn rejects_truncated_item() {
        let mut buf = item_header(1, 10);
        buf.extend_from_slice(b"ab");
        let err = parse_items(&buf, 0, 1, 4).unwrap_err();
        assert!(matches!(err, VerifyError::ExtendsPastEndOfPage { .. }));
    }

    #[test]
    fn rejects_unknown_item_type() {
        let buf = item_header(99, 0);
        let err = parse_items(&buf, 0, 1, 4).unwrap_err();
        assert!(matches!(err, VerifyError::IllegalItemType { .. }));
    }
}
