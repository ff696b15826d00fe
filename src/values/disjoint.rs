//! Disjoint values: N byte ranges over one or more borrowed buffers.

use smallvec::SmallVec;
use crate::{Error, Result};

/// How value positions map onto the buffers of a [`DisjointValuesView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStride {
    /// Every value lives in the single buffer.
    Shared,
    /// Value `i` lives in buffer `i`.
    PerValue,
}

/// Location of one value, checked against its buffer at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ValueSlot {
    buffer: usize,
    offset: usize,
    len: usize,
}

/// Read-only description of N values packed across caller-owned buffers.
///
/// Every slot is bounds-checked once in the constructor, so [`get`] and
/// [`iter`] never fail afterwards. Slots may alias each other; nothing here
/// requires them to be disjoint.
///
/// [`get`]: DisjointValuesView::get
/// [`iter`]: DisjointValuesView::iter
#[derive(Debug, Clone)]
pub struct DisjointValuesView<'a> {
    buffers: SmallVec<[&'a [u8]; 1]>,
    slots: Vec<ValueSlot>,
}

impl<'a> DisjointValuesView<'a> {
    /// Build a view from per-value offsets and lengths.
    ///
    /// With [`BufferStride::Shared`] exactly one buffer must be given (none is
    /// allowed when there are no values). With [`BufferStride::PerValue`]
    /// there must be one buffer per value.
    pub fn new(
        buffers: &[&'a [u8]],
        stride: BufferStride,
        offsets: &[u32],
        lengths: &[u32],
    ) -> Result<Self> {
        if offsets.len() != lengths.len() {
            return Err(Error::InvalidRange(format!(
                "{} offsets but {} lengths",
                offsets.len(),
                lengths.len()
            )));
        }
        let count = lengths.len();
        match stride {
            BufferStride::Shared if count > 0 && buffers.len() != 1 => {
                return Err(Error::InvalidRange(format!(
                    "shared stride needs exactly one buffer, got {}",
                    buffers.len()
                )));
            }
            BufferStride::PerValue if buffers.len() != count => {
                return Err(Error::InvalidRange(format!(
                    "per-value stride needs {count} buffers, got {}",
                    buffers.len()
                )));
            }
            _ => {}
        }

        let mut slots = Vec::with_capacity(count);
        for (i, (&offset, &len)) in offsets.iter().zip(lengths).enumerate() {
            let buffer = match stride {
                BufferStride::Shared => 0,
                BufferStride::PerValue => i,
            };
            let slot = ValueSlot { buffer, offset: offset as usize, len: len as usize };
            check_slot(i, &slot, buffers[buffer])?;
            slots.push(slot);
        }

        Ok(Self { buffers: buffers.iter().copied().collect(), slots })
    }

    /// All values inside one buffer.
    pub fn packed(buffer: &'a [u8], offsets: &[u32], lengths: &[u32]) -> Result<Self> {
        Self::new(&[buffer], BufferStride::Shared, offsets, lengths)
    }

    /// Consecutive values of `width` bytes each, filling the whole buffer.
    pub fn fixed_width(buffer: &'a [u8], width: usize) -> Result<Self> {
        if width == 0 || buffer.len() % width != 0 {
            return Err(Error::InvalidRange(format!(
                "buffer of {} bytes is not a whole number of {width}-byte values",
                buffer.len()
            )));
        }
        let slots = (0..buffer.len() / width)
            .map(|i| ValueSlot { buffer: 0, offset: i * width, len: width })
            .collect();
        Ok(Self { buffers: SmallVec::from_elem(buffer, 1), slots })
    }

    /// One value per slice, each slice used whole.
    pub fn from_slices(values: &[&'a [u8]]) -> Self {
        let slots = values
            .iter()
            .enumerate()
            .map(|(i, v)| ValueSlot { buffer: i, offset: 0, len: v.len() })
            .collect();
        Self { buffers: values.iter().copied().collect(), slots }
    }

    /// `count` zero-length values. Writing them removes the keys.
    pub fn erasures(count: usize) -> Self {
        let slots = vec![ValueSlot { buffer: 0, offset: 0, len: 0 }; count];
        Self { buffers: SmallVec::from_elem(&[][..], 1), slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bytes of value `i`.
    pub fn get(&self, i: usize) -> Option<&'a [u8]> {
        self.slots.get(i).map(|slot| self.resolve(slot))
    }

    /// Values in order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &'a [u8]> + '_ {
        self.slots.iter().map(|slot| self.resolve(slot))
    }

    /// Sum of all value lengths.
    pub fn total_len(&self) -> usize {
        self.slots.iter().map(|s| s.len).sum()
    }

    fn resolve(&self, slot: &ValueSlot) -> &'a [u8] {
        let buffer: &'a [u8] = self.buffers[slot.buffer];
        &buffer[slot.offset..slot.offset + slot.len]
    }
}

fn check_slot(index: usize, slot: &ValueSlot, buffer: &[u8]) -> Result<()> {
    let end = slot.offset.checked_add(slot.len);
    match end {
        Some(end) if end <= buffer.len() => Ok(()),
        _ => Err(Error::InvalidRange(format!(
            "value {index} spans {}..{} of a {}-byte buffer",
            slot.offset,
            slot.offset.saturating_add(slot.len),
            buffer.len()
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_view() {
        let buf = b"hello world";
        let view = DisjointValuesView::packed(buf, &[0, 6], &[5, 5]).unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view.get(0), Some(&b"hello"[..]));
        assert_eq!(view.get(1), Some(&b"world"[..]));
        assert_eq!(view.get(2), None);
        assert_eq!(view.total_len(), 10);
    }

    #[test]
    fn test_fixed_width_integers() {
        let ints: Vec<u8> = [34u64, 35, 36].iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = DisjointValuesView::fixed_width(&ints, 8).unwrap();
        assert_eq!(view.len(), 3);
        let second = u64::from_le_bytes(view.get(1).unwrap().try_into().unwrap());
        assert_eq!(second, 35);
    }

    #[test]
    fn test_fixed_width_rejects_ragged_buffer() {
        assert!(matches!(
            DisjointValuesView::fixed_width(b"abc", 2),
            Err(Error::InvalidRange(_))
        ));
        assert!(DisjointValuesView::fixed_width(b"abc", 0).is_err());
    }

    #[test]
    fn test_per_value_buffers() {
        let a = b"aa";
        let b = b"bbbb";
        let view = DisjointValuesView::new(
            &[&a[..], &b[..]],
            BufferStride::PerValue,
            &[1, 2],
            &[1, 2],
        )
        .unwrap();
        let got: Vec<&[u8]> = view.iter().collect();
        assert_eq!(got, vec![&b"a"[..], &b"bb"[..]]);
    }

    #[test]
    fn test_out_of_bounds_slot() {
        let err = DisjointValuesView::packed(b"abc", &[2], &[2]).unwrap_err();
        assert!(matches!(err, Error::InvalidRange(_)));
    }

    #[test]
    fn test_offset_length_count_mismatch() {
        assert!(DisjointValuesView::packed(b"abc", &[0, 1], &[1]).is_err());
    }

    #[test]
    fn test_stride_buffer_count() {
        let a = b"a";
        assert!(DisjointValuesView::new(&[&a[..], &a[..]], BufferStride::Shared, &[0], &[1]).is_err());
        assert!(DisjointValuesView::new(&[&a[..]], BufferStride::PerValue, &[0, 0], &[1, 1]).is_err());
        assert!(DisjointValuesView::new(&[], BufferStride::Shared, &[], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_aliased_slots_allowed() {
        let view = DisjointValuesView::packed(b"xyz", &[0, 0], &[3, 2]).unwrap();
        assert_eq!(view.get(0), Some(&b"xyz"[..]));
        assert_eq!(view.get(1), Some(&b"xy"[..]));
    }

    #[test]
    fn test_erasures() {
        let view = DisjointValuesView::erasures(3);
        assert_eq!(view.len(), 3);
        assert!(view.iter().all(|v| v.is_empty()));
    }
}
