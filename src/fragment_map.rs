//! A bitset over file fragments that proves, at the end of a walk, that
//! every fragment of the file was covered by exactly one page.
//!
//! Hand-rolled as a `Vec<u64>` word bitset rather than an external bitset
//! crate -- the operation is simple enough that reaching for one would be
//! the outlier, not the idiom, for code that otherwise sticks close to the
//! standard library for bit-level plumbing.

use log::error;

use crate::error::{VerifyError, VerifyResult};

pub struct FragmentMap {
    bits: Vec<u64>,
    frags: u64,
}

impl FragmentMap {
    /// Allocates a bitset sized for `file_size / alloc_size` fragments.
    /// Fails immediately if that count can't be represented in a signed
    /// 32-bit index, mirroring the reference engine's `bitstr_t` limit.
    pub fn new(file_size: u64, alloc_size: u32) -> VerifyResult<Self> {
        let frags = file_size / alloc_size as u64;
        if frags > i32::MAX as u64 {
            return Err(VerifyError::FileTooLarge);
        }
        let words = ((frags + 63) / 64) as usize;
        Ok(FragmentMap { bits: vec![0u64; words], frags })
    }

    pub fn frags(&self) -> u64 {
        self.frags
    }

    fn word_bit(idx: u64) -> (usize, u32) {
        ((idx / 64) as usize, (idx % 64) as u32)
    }

    fn is_set(&self, idx: u64) -> bool {
        let (w, b) = Self::word_bit(idx);
        self.bits[w] & (1u64 << b) != 0
    }

    fn set(&mut self, idx: u64) {
        let (w, b) = Self::word_bit(idx);
        self.bits[w] |= 1u64 << b;
    }

    /// Registers the fragment range covered by a page of `size` bytes
    /// starting at fragment `addr`. Fails if any bit in that range is
    /// already set -- two pages claiming the same fragment.
    pub fn add(&mut self, addr: u32, size: u32, alloc_size: u32) -> VerifyResult<()> {
        let n = (size / alloc_size) as u64;
        let start = addr as u64;
        for idx in start..start + n {
            if self.is_set(idx) {
                return Err(VerifyError::FragmentAlreadyVerified { addr });
            }
        }
        for idx in start..start + n {
            self.set(idx);
        }
        Ok(())
    }

    /// Scans for fragments never covered by any page, coalescing runs of
    /// clear bits into ranges. Every gap is logged; the first one found is
    /// returned as the error (the reference engine reports every gap but
    /// ultimately surfaces a single error status).
    pub fn check_complete(&self) -> VerifyResult<()> {
        let mut first_error: Option<VerifyError> = None;
        let mut run_start: Option<u64> = None;

        let mut report = |start: u64, end: u64, first_error: &mut Option<VerifyError>| {
            let err = if start == end {
                VerifyError::FragmentNeverVerified(start as u32)
            } else {
                VerifyError::FragmentRangeNeverVerified(start as u32, end as u32)
            };
            error!("{err}");
            if first_error.is_none() {
                *first_error = Some(err);
            }
        };

        for idx in 0..self.frags {
            if self.is_set(idx) {
                if let Some(start) = run_start.take() {
                    report(start, idx - 1, &mut first_error);
                }
            } else if run_start.is_none() {
                run_start = Some(idx);
            }
        }
        if let Some(start) = run_start {
            report(start, self.frags - 1, &mut first_error);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_covered_file_is_complete() {
        let mut map = FragmentMap::new(4 * 512, 512).unwrap();
        map.add(0, 512, 512).unwrap();
        map.add(1, 512 * 3, 512).unwrap();
        assert!(map.check_complete().is_ok());
    }

    #[test]
    fn double_coverage_is_rejected() {
        let mut map = FragmentMap::new(2 * 512, 512).unwrap();
        map.add(0, 1024, 512).unwrap();
        let err = map.add(1, 512, 512).unwrap_err();
        assert!(matches!(err, VerifyError::FragmentAlreadyVerified { addr: 1 }));
    }

    #[test]
    fn single_gap_is_reported() {
        let mut map = FragmentMap::new(3 * 512, 512).unwrap();
        map.add(0, 512, 512).unwrap();
        map.add(2, 512, 512).unwrap();
        let err = map.check_complete().unwrap_err();
        assert!(matches!(err, VerifyError::FragmentNeverVerified(1)));
    }

    #[test]
    fn gap_range_is_reported() {
        let mut map = FragmentMap::new(5 * 512, 512).unwrap();
        map.add(0, 512, 512).unwrap();
        map.add(4, 512, 512).unwrap();
        let err = map.check_complete().unwrap_err();
        assert!(matches!(err, VerifyError::FragmentRangeNeverVerified(1, 3)));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let err = FragmentMap::new((i32::MAX as u64 + 2) * 512, 512).unwrap_err();
        assert!(matches!(err, VerifyError::FileTooLarge));
    }
}
