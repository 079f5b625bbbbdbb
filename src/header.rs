//! The common page header shared by every page kind, and its on-disk byte
//! layout. All multi-byte fields are big-endian, matching the rest of the
//! format.

use std::convert::TryInto;

use crate::error::{VerifyError, VerifyResult};
use crate::format::{PageType, PAGE_HDR_SIZE};

#[derive(Debug, Clone)]
pub struct PageHeader {
    pub type_raw: u8,
    pub level: u32,
    pub start_recno: u64,
    pub lsn: [u32; 2],
    pub unused: [u8; 2],
    /// Union field: overflow/descriptor payload length.
    pub datalen: u32,
    /// Number of entries/items that follow the header.
    pub num_entries: u32,
}

impl PageHeader {
    pub fn parse(buf: &[u8], addr: u32) -> VerifyResult<Self> {
        if buf.len() < PAGE_HDR_SIZE {
            return Err(VerifyError::ExtendsPastEndOfPage { item_num: 0, addr });
        }
        let type_raw = buf[0];
        let level = u32::from_be_bytes(buf[1..5].try_into()?);
        let start_recno = u64::from_be_bytes(buf[5..13].try_into()?);
        let lsn = [
            u32::from_be_bytes(buf[13..17].try_into()?),
            u32::from_be_bytes(buf[17..21].try_into()?),
        ];
        let unused = [buf[21], buf[22]];
        let datalen = u32::from_be_bytes(buf[23..27].try_into()?);
        let num_entries = u32::from_be_bytes(buf[27..31].try_into()?);
        Ok(PageHeader { type_raw, level, start_recno, lsn, unused, datalen, num_entries })
    }

    pub fn page_type(&self, addr: u32) -> VerifyResult<PageType> {
        PageType::from_u8(addr, self.type_raw)
    }

    /// Writes the header into `buf[..PAGE_HDR_SIZE]`. Only used by the test
    /// file-builder (`testutil`); the verifier itself never writes pages.
    pub fn write_into(&self, buf: &mut [u8]) {
        buf[0] = self.type_raw;
        buf[1..5].copy_from_slice(&self.level.to_be_bytes());
        buf[5..13].copy_from_slice(&self.start_recno.to_be_bytes());
        buf[13..17].copy_from_slice(&self.lsn[0].to_be_bytes());
        buf[17..21].copy_from_slice(&self.lsn[1].to_be_bytes());
        buf[21] = self.unused[0];
        buf[22] = self.unused[1];
        buf[23..27].copy_from_slice(&self.datalen.to_be_bytes());
        buf[27..31].copy_from_slice(&self.num_entries.to_be_bytes());
    }
}
