//! Binary layout shared by [`crate::store`] and [`crate::index`].
//!
//! Keeping the widths in one place means the two files agree on exactly
//! what "12 bytes" and "8 bytes" mean without re-deriving it at each call
//! site.

/// Bytes used to hold a record's length prefix in the store file.
pub const LEN_WIDTH: u64 = 8;

/// Bytes used to hold an index entry's relative offset (`u32`).
pub const OFFSET_WIDTH: u64 = 4;

/// Bytes used to hold an index entry's store position (`u64`).
pub const POSITION_WIDTH: u64 = 8;

/// Total width of one densely-packed index entry: `[rel_off][pos]`.
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;
