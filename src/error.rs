use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from the store layer: a plain append-only, length-prefixed file.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A frame's declared length ran past the bytes actually on disk.
    #[error("short read at position {position}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        position: u64,
        wanted: u64,
        got: u64,
    },
}

/// Errors from the memory-mapped offset index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Io(#[from] io::Error),

    /// `read` was called against an index that has never been written to.
    #[error("index is empty")]
    Empty,

    /// The requested slot lies outside the entries written so far.
    #[error("index entry {requested} not found")]
    OutOfRange { requested: i64 },

    /// The pre-allocated mmap has no room for another entry.
    #[error("index is full")]
    Full,
}

/// Errors from a single (store, index) segment pair.
#[derive(Error, Debug)]
pub enum SegmentError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors surfaced by [`crate::log::Log`], the crate's public entry point.
#[derive(Error, Debug)]
pub enum LogError {
    /// The requested offset isn't covered by any retained segment.
    #[error("offset {offset} is out of range")]
    OutOfRange { offset: u64 },

    #[error("{0:?} is not a directory")]
    InvalidDirectory(PathBuf),

    #[error("I/O error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Segment(#[from] SegmentError),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type IndexResult<T> = Result<T, IndexError>;
pub type SegmentResult<T> = Result<T, SegmentError>;
pub type LogResult<T> = Result<T, LogError>;
