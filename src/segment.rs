use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{SegmentError, SegmentResult, StoreError};
use crate::frame::LEN_WIDTH;
use crate::index::Index;
use crate::store::Store;

/// One (store, index) pair, covering the contiguous offset range
/// `[base_offset, next_offset)`.
pub struct Segment {
    pub base_offset: u64,
    pub next_offset: u64,
    store: Store,
    index: Index,
    config: Arc<Config>,
}

impl Segment {
    /// Opens or creates the store/index files `<base_offset>.store` and
    /// `<base_offset>.index` inside `dir`.
    pub fn new(dir: &Path, base_offset: u64, config: Arc<Config>) -> SegmentResult<Segment> {
        let store_path = dir.join(format!("{base_offset}.store"));
        let index_path = dir.join(format!("{base_offset}.index"));

        let store = Store::open(store_path)?;
        let index = Index::open(index_path, &config)?;

        let next_offset = if index.is_empty() {
            base_offset
        } else {
            let last = index.read(-1)?;
            base_offset + last.rel_offset as u64 + 1
        };

        tracing::debug!(base_offset, next_offset, "segment opened");

        Ok(Segment {
            base_offset,
            next_offset,
            store,
            index,
            config,
        })
    }

    /// Appends `payload`, returning the absolute offset assigned to it.
    pub fn append(&mut self, payload: &[u8]) -> SegmentResult<u64> {
        let offset = self.next_offset;
        let rel_offset = (offset - self.base_offset) as u32;

        let (_, position) = self.store.append(payload)?;
        self.index.write(rel_offset, position)?;

        self.next_offset += 1;
        Ok(offset)
    }

    /// Reads the payload stored at the given absolute offset.
    ///
    /// An index entry whose position lies at or past the end of the store
    /// is corrupt (the store and index have fallen out of sync); this is
    /// caught here rather than left to the store to stumble over.
    pub fn read(&self, offset: u64) -> SegmentResult<Vec<u8>> {
        let rel_offset = (offset - self.base_offset) as i64;
        let entry = self.index.read(rel_offset)?;
        if entry.position >= self.store.size() {
            return Err(SegmentError::Store(StoreError::ShortRead {
                position: entry.position,
                wanted: LEN_WIDTH,
                got: 0,
            }));
        }
        Ok(self.store.read(entry.position)?)
    }

    /// `true` once the store or index has reached its configured cap; the
    /// index condition usually triggers first for small records.
    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.config.segment.max_store_bytes
            || self.index.size() >= self.config.segment.max_index_bytes
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    pub fn index_path(&self) -> &Path {
        self.index.path()
    }

    /// Duplicates a file handle positioned at the start of this segment's
    /// store, for streaming without holding the log's lock.
    pub fn clone_store_file(&self) -> SegmentResult<std::fs::File> {
        Ok(self.store.try_clone_file()?)
    }

    pub fn close(&mut self) -> SegmentResult<()> {
        self.store.close()?;
        self.index.close()?;
        Ok(())
    }

    /// Closes then unlinks both files.
    pub fn remove(mut self) -> SegmentResult<()> {
        self.close()?;
        let store_path = self.store.path().to_path_buf();
        let index_path = self.index.path().to_path_buf();
        std::fs::remove_file(&index_path)?;
        std::fs::remove_file(&store_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::error::{IndexError, SegmentError};
    use crate::frame::ENTRY_WIDTH;
    use tempfile::tempdir;

    #[test]
    fn append_and_read_round_trip() {
        let dir = tempdir().unwrap();
        let config = Arc::new(ConfigBuilder::new(1024, 1024, 0).build());
        let mut segment = Segment::new(dir.path(), 16, config).unwrap();

        assert_eq!(segment.next_offset, 16);
        assert!(!segment.is_maxed());

        for i in 0..3u64 {
            let offset = segment.append(b"hello world").unwrap();
            assert_eq!(16 + i, offset);
            assert_eq!(segment.read(offset).unwrap(), b"hello world");
        }
    }

    #[test]
    fn index_exhaustion_surfaces_as_full() {
        let dir = tempdir().unwrap();
        // room for exactly 3 entries
        let config = Arc::new(ConfigBuilder::new(1024, 3 * ENTRY_WIDTH, 0).build());
        let mut segment = Segment::new(dir.path(), 16, config).unwrap();

        for _ in 0..3 {
            segment.append(b"hello world").unwrap();
        }
        let result = segment.append(b"hello world");
        assert!(matches!(
            result,
            Err(SegmentError::Index(IndexError::Full))
        ));
        assert!(segment.is_maxed());
    }

    #[test]
    fn is_maxed_reflects_store_cap_too() {
        let dir = tempdir().unwrap();
        let record = b"hello world";
        let config = Arc::new(ConfigBuilder::new((record.len() as u64) * 2, 1024, 0).build());
        let mut segment = Segment::new(dir.path(), 0, config).unwrap();
        assert!(!segment.is_maxed());
        segment.append(record).unwrap();
        assert!(segment.is_maxed());
    }

    #[test]
    fn reopening_recovers_next_offset() {
        let dir = tempdir().unwrap();
        let config = Arc::new(ConfigBuilder::new(1024, 1024, 0).build());
        {
            let mut segment = Segment::new(dir.path(), 0, config.clone()).unwrap();
            segment.append(b"a").unwrap();
            segment.append(b"b").unwrap();
            segment.close().unwrap();
        }
        let segment = Segment::new(dir.path(), 0, config).unwrap();
        assert_eq!(segment.next_offset, 2);
        assert_eq!(segment.read(0).unwrap(), b"a");
        assert_eq!(segment.read(1).unwrap(), b"b");
    }

    #[test]
    fn index_entry_past_end_of_store_is_a_short_read() {
        let dir = tempdir().unwrap();
        let config = Arc::new(ConfigBuilder::new(1024, 1024, 0).build());
        let mut segment = Segment::new(dir.path(), 0, config).unwrap();
        segment.append(b"hello world").unwrap();

        // Hand-craft a second entry pointing far past the store's end, as
        // if the index and store had fallen out of sync.
        segment.index.write(1, 10_000).unwrap();
        segment.next_offset += 1;

        assert!(matches!(
            segment.read(1),
            Err(SegmentError::Store(crate::error::StoreError::ShortRead { position: 10_000, .. }))
        ));
    }

    #[test]
    fn remove_deletes_both_files() {
        let dir = tempdir().unwrap();
        let config = Arc::new(ConfigBuilder::new(1024, 1024, 0).build());
        let segment = Segment::new(dir.path(), 0, config).unwrap();
        let store_path = segment.store_path().to_path_buf();
        let index_path = segment.index_path().to_path_buf();
        segment.remove().unwrap();
        assert!(!store_path.exists());
        assert!(!index_path.exists());
    }
}
