use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::fs::FileExt;

/// Reads sequentially through one duplicated store file descriptor,
/// starting at position 0.
struct SegmentReader {
    file: File,
    offset: u64,
}

impl Read for SegmentReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.read_at(buf, self.offset)?;
        self.offset += n as u64;
        Ok(n)
    }
}

/// A raw byte stream over every segment's store file, concatenated in
/// base-offset order — the snapshot format `Log::reader` hands back.
///
/// Built by duplicating each segment's store file descriptor at
/// construction time (see `Log::reader`), so reading from it never
/// re-acquires the log's lock and is unaffected by appends, truncation,
/// or removal that happen afterward.
pub struct LogReader {
    segments: VecDeque<SegmentReader>,
}

impl LogReader {
    pub(crate) fn new(files: Vec<File>) -> LogReader {
        LogReader {
            segments: files
                .into_iter()
                .map(|file| SegmentReader { file, offset: 0 })
                .collect(),
        }
    }
}

impl Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let Some(current) = self.segments.front_mut() {
            let n = current.read(buf)?;
            if n == 0 {
                self.segments.pop_front();
                continue;
            }
            return Ok(n);
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::tempfile;

    fn file_with(bytes: &[u8]) -> File {
        let mut file = tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn reads_through_one_file() {
        let mut reader = LogReader::new(vec![file_with(b"hello world")]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn concatenates_multiple_files_in_order() {
        let mut reader = LogReader::new(vec![file_with(b"abc"), file_with(b"def")]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcdef");
    }

    #[test]
    fn empty_segment_list_reads_as_empty() {
        let mut reader = LogReader::new(vec![]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
