use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder};
use memmap2::MmapMut;

use crate::config::Config;
use crate::error::{IndexError, IndexResult};
use crate::frame::{ENTRY_WIDTH, OFFSET_WIDTH};

/// A decoded index entry: the offset relative to the segment's base, and
/// the byte position in the store where that record's frame starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub rel_offset: u32,
    pub position: u64,
}

/// A memory-mapped, densely-packed `(rel_offset, position)` table.
///
/// Pre-allocated to `max_index_bytes` at open time, since mmap'd files
/// can't be cheaply grown in place; shrunk back to the live `size` on
/// [`Index::close`].
pub struct Index {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
    size: u64,
}

impl Index {
    /// Opens or creates the index file at `path`.
    ///
    /// If the file's length already equals `max_index_bytes`, a prior
    /// session never truncated it back down on close — the signature of
    /// an unclean shutdown, since a live index is always smaller than its
    /// cap until genuinely full. In that case the live size is recovered
    /// by scanning backward from the end skipping all-zero entries. This
    /// is a heuristic: a segment whose very first entry is legitimately
    /// `(rel_offset: 0, position: 0)` is indistinguishable from slack and
    /// would be scanned past, under-counting by one entry. A robust fix
    /// would need an explicit "clean shutdown" marker on disk.
    pub fn open(path: PathBuf, config: &Config) -> IndexResult<Index> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        let stat_size = file.metadata()?.len();
        let max_index_bytes = config.segment.max_index_bytes;
        file.set_len(max_index_bytes)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let size = if stat_size >= max_index_bytes && max_index_bytes > 0 {
            let recovered = recover_live_size(&mmap);
            if recovered != stat_size {
                tracing::warn!(
                    path = %path.display(),
                    stat_size,
                    recovered,
                    "index file was not cleanly truncated on last close; recovered live size by scanning for the last non-zero entry"
                );
            }
            recovered
        } else {
            stat_size
        };

        Ok(Index {
            path,
            file,
            mmap,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Reads the entry at slot `requested`, or the last written entry if
    /// `requested == -1`.
    pub fn read(&self, requested: i64) -> IndexResult<IndexEntry> {
        if self.size == 0 {
            return Err(IndexError::Empty);
        }

        let slot = if requested == -1 {
            (self.size / ENTRY_WIDTH) - 1
        } else if requested < 0 {
            return Err(IndexError::OutOfRange { requested });
        } else {
            requested as u64
        };

        let byte_pos = slot * ENTRY_WIDTH;
        if self.size < byte_pos + ENTRY_WIDTH {
            return Err(IndexError::OutOfRange { requested });
        }

        let start = byte_pos as usize;
        let rel_offset = BigEndian::read_u32(&self.mmap[start..start + OFFSET_WIDTH as usize]);
        let position = BigEndian::read_u64(
            &self.mmap[start + OFFSET_WIDTH as usize..start + ENTRY_WIDTH as usize],
        );
        Ok(IndexEntry {
            rel_offset,
            position,
        })
    }

    /// Appends one `(rel_offset, position)` entry.
    pub fn write(&mut self, rel_offset: u32, position: u64) -> IndexResult<()> {
        if (self.mmap.len() as u64) < self.size + ENTRY_WIDTH {
            tracing::warn!(path = %self.path.display(), "index is full");
            return Err(IndexError::Full);
        }

        let start = self.size as usize;
        BigEndian::write_u32(
            &mut self.mmap[start..start + OFFSET_WIDTH as usize],
            rel_offset,
        );
        BigEndian::write_u64(
            &mut self.mmap[start + OFFSET_WIDTH as usize..start + ENTRY_WIDTH as usize],
            position,
        );
        self.size += ENTRY_WIDTH;
        Ok(())
    }

    /// Syncs the mapping, fsyncs the file, then truncates away the
    /// pre-allocated slack.
    pub fn close(&mut self) -> IndexResult<()> {
        self.mmap.flush()?;
        self.file.sync_all()?;
        self.file.set_len(self.size)?;
        Ok(())
    }
}

fn recover_live_size(mmap: &MmapMut) -> u64 {
    let entry_width = ENTRY_WIDTH as usize;
    let entry_count = mmap.len() / entry_width;
    for slot in (0..entry_count).rev() {
        let start = slot * entry_width;
        if mmap[start..start + entry_width].iter().any(|&b| b != 0) {
            return ((slot + 1) * entry_width) as u64;
        }
    }
    0
}
