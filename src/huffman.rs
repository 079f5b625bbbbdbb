//! The Huffman codec collaborator and the item-processing resolver.
//! Key/data material on an item-bearing page is either used in place (a
//! plain on-page byte run), or "processed": decompressed through a
//! configured Huffman codec and/or followed through an overflow reference.

use crate::cache::{Page, PageCache};
use crate::error::VerifyResult;
use crate::item::OvflRef;

pub trait HuffmanCodec {
    /// Decodes `src` into a freshly allocated buffer. Mirrors
    /// `huffman_decode(codec, src, src_len) -> (buf, capacity, used)`; the
    /// capacity/used split the C API needs for its scratch pool collapses to
    /// a plain owned `Vec<u8>` here since Rust's allocator already tracks
    /// capacity for us.
    fn decode(&self, src: &[u8]) -> VerifyResult<Vec<u8>>;
}

/// No compression configured: material is used exactly as stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCodec;

impl HuffmanCodec for IdentityCodec {
    fn decode(&self, src: &[u8]) -> VerifyResult<Vec<u8>> {
        Ok(src.to_vec())
    }
}

/// The result of resolving an item to contiguous, comparable bytes.
pub enum Material {
    /// An owned, already-decoded buffer (on-page bytes copied verbatim, or
    /// Huffman-decoded bytes).
    Scratch(Vec<u8>),
    /// A pinned overflow page whose payload (up to `datalen`) is used
    /// directly, for the "pure overflow without compression" case.
    Overflow(Page),
}

impl Material {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Material::Scratch(v) => v,
            Material::Overflow(page) => {
                let datalen = crate::header::PageHeader::parse(&page.buf, page.addr)
                    .map(|h| h.datalen as usize)
                    .unwrap_or(0);
                let start = crate::format::PAGE_HDR_SIZE;
                &page.buf[start..(start + datalen).min(page.buf.len())]
            }
        }
    }
}

/// Resolves an inline byte run to its comparable material, applying the key
/// or data Huffman codec if one is configured.
pub fn process_inline(bytes: &[u8], codec: Option<&dyn HuffmanCodec>) -> VerifyResult<Material> {
    match codec {
        Some(codec) => Ok(Material::Scratch(codec.decode(bytes)?)),
        None => Ok(Material::Scratch(bytes.to_vec())),
    }
}

/// Resolves an overflow reference to its comparable material: loads the
/// overflow page through the cache, then either hands back the pinned page
/// directly (no compression configured) or decodes its payload into a
/// scratch buffer.
pub fn process_overflow<C: PageCache>(
    cache: &mut C,
    ovfl: &OvflRef,
    codec: Option<&dyn HuffmanCodec>,
) -> VerifyResult<Material> {
    let page = cache.ovfl_in(ovfl)?;
    match codec {
        None => Ok(Material::Overflow(page)),
        Some(codec) => {
            let datalen = ovfl.datalen as usize;
            let start = crate::format::PAGE_HDR_SIZE;
            let end = (start + datalen).min(page.buf.len());
            let decoded = codec.decode(&page.buf[start..end])?;
            Ok(Material::Scratch(decoded))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_codec_passes_bytes_through() {
        let codec = IdentityCodec;
        assert_eq!(codec.decode(b"hello").unwrap(), b"hello");
    }

    #[test]
    fn process_inline_without_codec_copies_bytes() {
        let m = process_inline(b"abc", None).unwrap();
        assert_eq!(m.bytes(), b"abc");
    }
}
