use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use kura_model::HideReason;
use std::collections::BTreeMap;

/// Width of one encoded tuple: a u32 page index and a reason byte.
const TUPLE: usize = 5;

/// Incremental decoder for the hidden-page byte run.
///
/// The run has no element count of its own - the surrounding container's
/// byte length implies it - and readers that stream a snapshot may hand the
/// run over in arbitrary chunks. A tuple that straddles a chunk boundary is
/// carried over (at most one tuple's width) and completed by the next feed.
#[derive(Debug, Default)]
pub struct HideRunDecoder {
    carry: [u8; TUPLE],
    carried: usize,
}

impl HideRunDecoder {
    /// Consume one chunk, inserting every completed tuple into `out`.
    pub fn feed(&mut self, mut chunk: &[u8], out: &mut BTreeMap<u32, HideReason>) -> Result<()> {
        if self.carried != 0 {
            let missing = TUPLE - self.carried;
            if chunk.len() < missing {
                self.carry[self.carried..self.carried + chunk.len()].copy_from_slice(chunk);
                self.carried += chunk.len();
                return Ok(());
            }
            self.carry[self.carried..].copy_from_slice(&chunk[..missing]);
            chunk = &chunk[missing..];
            self.carried = 0;
            let carry = self.carry;
            Self::tuple(&carry, out)?;
        }

        let mut tuples = chunk.chunks_exact(TUPLE);
        for tuple in &mut tuples {
            Self::tuple(tuple, out)?;
        }

        let rest = tuples.remainder();
        if !rest.is_empty() {
            self.carry[..rest.len()].copy_from_slice(rest);
            self.carried = rest.len();
        }
        Ok(())
    }

    /// Signal end of input; a dangling partial tuple is corruption.
    pub fn finish(&self) -> Result<()> {
        if self.carried != 0 {
            exn::bail!(ErrorKind::Misaligned("hidden-pages"));
        }
        Ok(())
    }

    fn tuple(bytes: &[u8], out: &mut BTreeMap<u32, HideReason>) -> Result<()> {
        let page = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let reason =
            HideReason::try_from(bytes[4]).or_raise(|| ErrorKind::InvalidValue("hide-reason", bytes[4]))?;
        out.insert(page, reason);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn run() -> Vec<u8> {
        let map = BTreeMap::from([
            (0u32, HideReason::LowQuality),
            (3, HideReason::Dislike),
            (9, HideReason::Crop),
        ]);
        let mut bytes = Vec::new();
        for (page, reason) in &map {
            bytes.extend_from_slice(&page.to_le_bytes());
            bytes.push(*reason as u8);
        }
        bytes
    }

    fn expected() -> BTreeMap<u32, HideReason> {
        BTreeMap::from([
            (0u32, HideReason::LowQuality),
            (3, HideReason::Dislike),
            (9, HideReason::Crop),
        ])
    }

    #[test]
    fn test_single_chunk() {
        let mut decoder = HideRunDecoder::default();
        let mut out = BTreeMap::new();
        decoder.feed(&run(), &mut out).unwrap();
        decoder.finish().unwrap();
        assert_eq!(out, expected());
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(4)]
    #[case(5)]
    #[case(7)]
    #[case(13)]
    fn test_every_chunk_boundary(#[case] step: usize) {
        let bytes = run();
        let mut decoder = HideRunDecoder::default();
        let mut out = BTreeMap::new();
        for chunk in bytes.chunks(step) {
            decoder.feed(chunk, &mut out).unwrap();
        }
        decoder.finish().unwrap();
        assert_eq!(out, expected());
    }

    #[test]
    fn test_carry_spans_multiple_tiny_feeds() {
        let bytes = run();
        let mut decoder = HideRunDecoder::default();
        let mut out = BTreeMap::new();
        for byte in &bytes {
            decoder.feed(std::slice::from_ref(byte), &mut out).unwrap();
        }
        decoder.finish().unwrap();
        assert_eq!(out, expected());
    }

    #[test]
    fn test_dangling_partial_tuple_is_an_error() {
        let bytes = run();
        let mut decoder = HideRunDecoder::default();
        let mut out = BTreeMap::new();
        decoder.feed(&bytes[..bytes.len() - 2], &mut out).unwrap();
        assert!(decoder.finish().is_err());
    }

    #[test]
    fn test_empty_run_is_fine() {
        let mut decoder = HideRunDecoder::default();
        let mut out = BTreeMap::new();
        decoder.feed(&[], &mut out).unwrap();
        decoder.finish().unwrap();
        assert!(out.is_empty());
    }
}
