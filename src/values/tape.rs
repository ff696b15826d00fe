//! Tape: the contiguous result buffer of a batched read.

use std::iter::FusedIterator;
use super::narrow_len;
use crate::{Error, Result};

/// Values of a batched read laid back-to-back in one buffer, paired with a
/// length table in request order. A missing key occupies a zero-length slot.
///
/// The tape owns its bytes; views borrowed from it cannot outlive it, and
/// dropping it releases the buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tape {
    contents: Vec<u8>,
    lengths: Vec<u32>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(values: usize, bytes: usize) -> Self {
        Self {
            contents: Vec::with_capacity(bytes),
            lengths: Vec::with_capacity(values),
        }
    }

    /// Rebuild a tape from raw parts. Fails if the length table claims more
    /// bytes than `contents` holds.
    pub fn from_parts(contents: Vec<u8>, lengths: Vec<u32>) -> Result<Self> {
        let claimed: u64 = lengths.iter().map(|&l| u64::from(l)).sum();
        if claimed > contents.len() as u64 {
            return Err(Error::InvalidRange(format!(
                "length table covers {claimed} bytes but tape holds {}",
                contents.len()
            )));
        }
        Ok(Self { contents, lengths })
    }

    /// Tape holding `values` in order.
    pub fn from_values<'v>(values: impl IntoIterator<Item = &'v [u8]>) -> Result<Self> {
        let mut tape = Tape::new();
        for value in values {
            tape.push(value)?;
        }
        Ok(tape)
    }

    /// Append one value. Fails if it is longer than a `u32` length.
    pub fn push(&mut self, value: &[u8]) -> Result<()> {
        let len = narrow_len(value.len())?;
        self.contents.extend_from_slice(value);
        self.lengths.push(len);
        Ok(())
    }

    /// Append a zero-length slot.
    pub fn push_missing(&mut self) {
        self.lengths.push(0);
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    pub fn lengths(&self) -> &[u32] {
        &self.lengths
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Borrow the tape as a sequence of value views.
    pub fn values(&self) -> TapedValuesView<'_> {
        TapedValuesView { contents: &self.contents, lengths: &self.lengths }
    }
}

/// Borrowed view over a [`Tape`].
#[derive(Debug, Clone, Copy)]
pub struct TapedValuesView<'t> {
    contents: &'t [u8],
    lengths: &'t [u32],
}

impl<'t> TapedValuesView<'t> {
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    pub fn lengths(&self) -> &'t [u32] {
        self.lengths
    }

    /// Value at position `i`. Walks the length table, so prefer [`iter`]
    /// for sequential access.
    ///
    /// [`iter`]: TapedValuesView::iter
    pub fn get(&self, i: usize) -> Option<&'t [u8]> {
        if i >= self.lengths.len() {
            return None;
        }
        let start: usize = self.lengths[..i].iter().map(|&l| l as usize).sum();
        let end = start + self.lengths[i] as usize;
        self.contents.get(start..end)
    }

    pub fn iter(&self) -> TapeIter<'t> {
        TapeIter { contents: self.contents, lengths: self.lengths, offset: 0, index: 0 }
    }
}

impl<'t> IntoIterator for TapedValuesView<'t> {
    type Item = &'t [u8];
    type IntoIter = TapeIter<'t>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'t> IntoIterator for &TapedValuesView<'t> {
    type Item = &'t [u8];
    type IntoIter = TapeIter<'t>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over a tape: yields one slice per value, no copies.
#[derive(Debug, Clone)]
pub struct TapeIter<'t> {
    contents: &'t [u8],
    lengths: &'t [u32],
    offset: usize,
    index: usize,
}

impl<'t> Iterator for TapeIter<'t> {
    type Item = &'t [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.lengths.get(self.index)? as usize;
        let value = self.contents.get(self.offset..self.offset + len)?;
        self.offset += len;
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.lengths.len() - self.index;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for TapeIter<'_> {}

impl FusedIterator for TapeIter<'_> {}

// ============================================================================
// Tests
// ============================================================================
