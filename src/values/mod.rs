//! # Batched Value Views
//!
//! Two views move many variable-length values across the store boundary
//! in one call:
//!
//! - [`DisjointValuesView`] describes N values scattered over M caller
//!   buffers as `(buffer, offset, length)` triples. Writes borrow it.
//! - [`Tape`] is the contiguous result of a batched read, one buffer plus a
//!   length table. [`TapedValuesView`] walks it lazily without copying.
//!
//! ```rust
//! use kvgraph::values::{DisjointValuesView, Tape};
//!
//! let packed = b"abcdef";
//! let view = DisjointValuesView::packed(packed, &[0, 1, 3], &[1, 2, 3]).unwrap();
//! assert_eq!(view.get(2), Some(&b"def"[..]));
//!
//! let tape = Tape::from_values(view.iter()).unwrap();
//! let values: Vec<&[u8]> = tape.values().iter().collect();
//! assert_eq!(values, vec![&b"a"[..], &b"bc"[..], &b"def"[..]]);
//! ```

pub mod disjoint;
pub mod tape;

pub use disjoint::{DisjointValuesView, BufferStride};
pub use tape::{Tape, TapedValuesView, TapeIter};

use crate::{Error, Result};

/// Narrow a byte count or offset to the `u32` of offset and length tables.
pub(crate) fn narrow_len(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| Error::InvalidRange(format!("{n} bytes do not fit a u32 length table")))
}
