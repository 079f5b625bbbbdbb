//! The descriptor page (address 0, size 512): global parameters, and the
//! already-open database's configuration they're checked against.

use std::convert::TryInto;

use crate::cache::Page;
use crate::error::{VerifyError, VerifyResult};
use crate::format::{
    DESC_MASK, DESC_PAYLOAD_SIZE, DESC_REPEAT, PAGE_HDR_SIZE,
};

/// The already-open database's in-memory configuration. The descriptor page
/// is compared against this; when verifying an unopened file the caller
/// must first seed it from the descriptor page itself, or the comparisons
/// are tautological.
///
/// `root_addr`/`root_size` are not carried by the descriptor page itself --
/// in the reference engine they live on the open database handle (`idb`),
/// populated when the database was opened, not read back off disk during
/// verify. They're included here as part of the caller's configuration for
/// the same reason.
#[derive(Debug, Clone)]
pub struct DatabaseParams {
    pub magic: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub intl_min: u32,
    pub intl_max: u32,
    pub leaf_min: u32,
    pub leaf_max: u32,
    pub fixed_len: u32,
    pub alloc_size: u32,
    pub root_addr: u32,
    pub root_size: u32,
}

/// The on-disk descriptor payload (`PAGE_DESC`), parsed but not yet checked
/// against `DatabaseParams`.
#[derive(Debug, Clone)]
pub struct DescriptorPayload {
    pub magic: u32,
    pub majorv: u16,
    pub minorv: u16,
    pub intlmin: u32,
    pub intlmax: u32,
    pub leafmin: u32,
    pub leafmax: u32,
    pub recno_offset: u64,
    pub fixed_len: u32,
    pub flags: u8,
    pub unused1: [u8; 7],
    pub unused2: [u8; 32],
}

impl DescriptorPayload {
    pub fn parse(buf: &[u8]) -> VerifyResult<Self> {
        let p = &buf[PAGE_HDR_SIZE..PAGE_HDR_SIZE + DESC_PAYLOAD_SIZE];
        let magic = u32::from_be_bytes(p[0..4].try_into()?);
        let majorv = u16::from_be_bytes(p[4..6].try_into()?);
        let minorv = u16::from_be_bytes(p[6..8].try_into()?);
        let intlmin = u32::from_be_bytes(p[8..12].try_into()?);
        let intlmax = u32::from_be_bytes(p[12..16].try_into()?);
        let leafmin = u32::from_be_bytes(p[16..20].try_into()?);
        let leafmax = u32::from_be_bytes(p[20..24].try_into()?);
        let recno_offset = u64::from_be_bytes(p[24..32].try_into()?);
        let fixed_len = u32::from_be_bytes(p[32..36].try_into()?);
        let flags = p[36];
        let unused1: [u8; 7] = p[37..44].try_into()?;
        let unused2: [u8; 32] = p[44..76].try_into()?;
        Ok(DescriptorPayload {
            magic,
            majorv,
            minorv,
            intlmin,
            intlmax,
            leafmin,
            leafmax,
            recno_offset,
            fixed_len,
            flags,
            unused1,
            unused2,
        })
    }

    pub fn write_into(&self, buf: &mut [u8]) {
        let p = &mut buf[PAGE_HDR_SIZE..PAGE_HDR_SIZE + DESC_PAYLOAD_SIZE];
        p[0..4].copy_from_slice(&self.magic.to_be_bytes());
        p[4..6].copy_from_slice(&self.majorv.to_be_bytes());
        p[6..8].copy_from_slice(&self.minorv.to_be_bytes());
        p[8..12].copy_from_slice(&self.intlmin.to_be_bytes());
        p[12..16].copy_from_slice(&self.intlmax.to_be_bytes());
        p[16..20].copy_from_slice(&self.leafmin.to_be_bytes());
        p[20..24].copy_from_slice(&self.leafmax.to_be_bytes());
        p[24..32].copy_from_slice(&self.recno_offset.to_be_bytes());
        p[32..36].copy_from_slice(&self.fixed_len.to_be_bytes());
        p[36] = self.flags;
        p[37..44].copy_from_slice(&self.unused1);
        p[44..76].copy_from_slice(&self.unused2);
    }

    /// Seeds a `DatabaseParams` from this payload, unchecked -- used by the
    /// CLI's first, tautological pass when there's no already-open database
    /// to check against.
    pub fn seed_params(&self, alloc_size: u32, root_addr: u32, root_size: u32) -> DatabaseParams {
        DatabaseParams {
            magic: self.magic,
            major_version: self.majorv,
            minor_version: self.minorv,
            intl_min: self.intlmin,
            intl_max: self.intlmax,
            leaf_min: self.leafmin,
            leaf_max: self.leafmax,
            fixed_len: self.fixed_len,
            alloc_size,
            root_addr,
            root_size,
        }
    }
}

/// Validates the descriptor page against the database's already-open
/// configuration. Every violation is reported (not just the
/// first) to match the reference engine's behaviour of accumulating all
/// descriptor mismatches before returning; the first one found is
/// returned as the `Err`.
pub fn validate(page: &Page, params: &DatabaseParams) -> VerifyResult<()> {
    let desc = DescriptorPayload::parse(&page.buf)?;
    let mut first: Option<VerifyError> = None;
    let mut note = |e: VerifyError, first: &mut Option<VerifyError>| {
        log::error!("{e}");
        if first.is_none() {
            *first = Some(e);
        }
    };

    if desc.magic != params.magic {
        note(VerifyError::BadMagic { found: desc.magic, expected: params.magic }, &mut first);
    }
    if desc.majorv != params.major_version {
        note(
            VerifyError::BadMajorVersion { found: desc.majorv, expected: params.major_version },
            &mut first,
        );
    }
    if desc.minorv != params.minor_version {
        note(
            VerifyError::BadMinorVersion { found: desc.minorv, expected: params.minor_version },
            &mut first,
        );
    }
    if desc.intlmin != params.intl_min {
        note(
            VerifyError::BadIntlMin { found: desc.intlmin, expected: params.intl_min },
            &mut first,
        );
    }
    if desc.intlmax != params.intl_max {
        note(
            VerifyError::BadIntlMax { found: desc.intlmax, expected: params.intl_max },
            &mut first,
        );
    }
    if desc.leafmin != params.leaf_min {
        note(
            VerifyError::BadLeafMin { found: desc.leafmin, expected: params.leaf_min },
            &mut first,
        );
    }
    if desc.leafmax != params.leaf_max {
        note(
            VerifyError::BadLeafMax { found: desc.leafmax, expected: params.leaf_max },
            &mut first,
        );
    }
    if desc.recno_offset != 0 {
        note(VerifyError::BadRecnoOffset { found: desc.recno_offset }, &mut first);
    }
    if desc.flags & !DESC_MASK != 0 {
        note(VerifyError::BadDescFlags, &mut first);
    }
    if desc.fixed_len == 0 && desc.flags & DESC_REPEAT != 0 {
        note(VerifyError::RepeatWithoutFixedLen, &mut first);
    }
    if desc.unused1.iter().any(|&b| b != 0) || desc.unused2.iter().any(|&b| b != 0) {
        note(VerifyError::DescUnusedNotClear, &mut first);
    }

    match first {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{BTREE_MAGIC, BTREE_MAJOR_VERSION, BTREE_MINOR_VERSION, DESC_PAGE_SIZE};
    use crate::header::PageHeader;
    use crate::format::NOLEVEL;

    fn wellformed_descriptor_page(params: &DatabaseParams) -> Page {
        let mut buf = vec![0u8; DESC_PAGE_SIZE as usize];
        let hdr = PageHeader {
            type_raw: 1,
            level: NOLEVEL,
            start_recno: 0,
            lsn: [0, 0],
            unused: [0, 0],
            datalen: DESC_PAYLOAD_SIZE as u32,
            num_entries: 0,
        };
        hdr.write_into(&mut buf);
        let desc = DescriptorPayload {
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
        desc.write_into(&mut buf);
        Page { addr: 0, size: DESC_PAGE_SIZE, buf }
    }

    fn default_params() -> DatabaseParams {
        DatabaseParams {
            magic: BTREE_MAGIC,
            major_version: BTREE_MAJOR_VERSION,
            minor_version: BTREE_MINOR_VERSION,
            intl_min: 512,
            intl_max: 16384,
            leaf_min: 512,
            leaf_max: 16384,
            fixed_len: 0,
            alloc_size: 512,
            root_addr: 1,
            root_size: 512,
        }
    }

    #[test]
    fn wellformed_descriptor_passes() {
        let params = default_params();
        let page = wellformed_descriptor_page(&params);
        assert!(validate(&page, &params).is_ok());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let params = default_params();
        let mut page = wellformed_descriptor_page(&params);
        page.buf[PAGE_HDR_SIZE] = 0xFF;
        let err = validate(&page, &params).unwrap_err();
        assert!(matches!(err, VerifyError::BadMagic { .. }));
    }

    #[test]
    fn repeat_flag_without_fixed_len_is_rejected() {
        let params = default_params();
        let mut page = wellformed_descriptor_page(&params);
        page.buf[PAGE_HDR_SIZE + 36] = DESC_REPEAT;
        let err = validate(&page, &params).unwrap_err();
        assert!(matches!(err, VerifyError::RepeatWithoutFixedLen));
    }
}
