use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::error::{StoreError, StoreResult};
use crate::frame::LEN_WIDTH;

/// An append-only file of length-prefixed record frames:
/// `[len: u64 big-endian][payload: len bytes]`, repeated.
///
/// Writes go through a buffered writer; reads go straight to the file via
/// positional I/O. The mutex covers both, so a read that lands on bytes
/// from a just-completed append always flushes the buffer first and sees
/// them — read-your-writes within the process.
pub struct Store {
    path: PathBuf,
    read_file: File,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    writer: BufWriter<File>,
    size: u64,
}

impl Store {
    pub fn open(path: PathBuf) -> StoreResult<Store> {
        let file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&path)?;
        let size = file.metadata()?.len();
        let read_file = file.try_clone()?;
        Ok(Store {
            path,
            read_file,
            inner: Mutex::new(StoreInner {
                writer: BufWriter::new(file),
                size,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.inner.lock().unwrap().size
    }

    /// Appends `payload`, returning `(bytes_written, position)` where
    /// `position` is where the frame's length prefix starts.
    pub fn append(&self, payload: &[u8]) -> StoreResult<(u64, u64)> {
        let mut inner = self.inner.lock().unwrap();
        let position = inner.size;
        inner.writer.write_u64::<BigEndian>(payload.len() as u64)?;
        inner.writer.write_all(payload)?;
        let total_written = LEN_WIDTH + payload.len() as u64;
        inner.size += total_written;
        tracing::trace!(position, total_written, "store append");
        Ok((total_written, position))
    }

    /// Reads the frame starting at `position`, flushing any buffered
    /// writes first so a read-your-writes append is always visible.
    ///
    /// Checks the decoded length against the bytes actually on disk before
    /// allocating a buffer for it, so a corrupted length prefix surfaces as
    /// [`StoreError::ShortRead`] instead of an unbounded allocation.
    pub fn read(&self, position: u64) -> StoreResult<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        inner.writer.flush()?;
        let size = inner.size;
        drop(inner);

        if position + LEN_WIDTH > size {
            return Err(StoreError::ShortRead {
                position,
                wanted: LEN_WIDTH,
                got: size.saturating_sub(position),
            });
        }

        let mut len_buf = [0u8; LEN_WIDTH as usize];
        self.read_file.read_exact_at(&mut len_buf, position)?;
        let len = BigEndian::read_u64(&len_buf);

        let payload_start = position + LEN_WIDTH;
        if payload_start.checked_add(len).map_or(true, |end| end > size) {
            return Err(StoreError::ShortRead {
                position,
                wanted: len,
                got: size.saturating_sub(payload_start),
            });
        }

        let mut payload = vec![0u8; len as usize];
        self.read_file.read_exact_at(&mut payload, payload_start)?;
        tracing::trace!(position, len, "store read");
        Ok(payload)
    }

    /// Positional read delegating straight to the file, used by streaming.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> StoreResult<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.writer.flush()?;
        drop(inner);
        Ok(self.read_file.read_at(buf, offset)?)
    }

    /// Duplicates the underlying file descriptor for an independent
    /// positional reader (used by [`crate::reader::LogReader`]).
    pub fn try_clone_file(&self) -> StoreResult<File> {
        let mut inner = self.inner.lock().unwrap();
        inner.writer.flush()?;
        drop(inner);
        Ok(self.read_file.try_clone()?)
    }

    pub fn close(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.writer.flush()?;
        Ok(())
    }
}
