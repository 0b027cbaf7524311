//! Test helpers for walking an uncompressed export-diff stream.

#![allow(dead_code)]

use std::io::{self, Read, Write};

use rbdconv_core::rbd::{DIFF_BANNER, IMAGE_BANNER, IMAGE_DIFFS_BANNER};

/// Writer that accepts `left` bytes and then fails every write with
/// `BrokenPipe`.
#[derive(Debug, Default)]
pub struct FailAfter {
    pub left: usize,
    /// Bytes accepted before the failure.
    pub written: Vec<u8>,
}

impl FailAfter {
    pub fn new(left: usize) -> Self {
        Self {
            left,
            written: Vec::new(),
        }
    }
}

impl Write for FailAfter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.left == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "boom"));
        }
        let n = buf.len().min(self.left);
        self.written.extend_from_slice(&buf[..n]);
        self.left -= n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer that takes every write but fails to flush.
#[derive(Debug, Default)]
pub struct FailOnFlush(pub Vec<u8>);

impl Write for FailOnFlush {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "flush failed"))
    }
}

/// Reader that yields `data` and then fails with `InvalidData` instead of
/// reporting end of file.
#[derive(Debug)]
pub struct FailingReader {
    data: io::Cursor<Vec<u8>>,
}

impl FailingReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: io::Cursor::new(data),
        }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::InvalidData, "disk read failed")),
            n => Ok(n),
        }
    }
}

/// A decoded export-diff stream.
#[derive(Debug, Default)]
pub struct ParsedDiff {
    pub order: u64,
    pub features: u64,
    pub stripe_unit: u64,
    pub stripe_count: u64,
    pub diff_count: u64,
    pub size: u64,
    /// (offset, data) for each write record, in stream order.
    pub writes: Vec<(u64, Vec<u8>)>,
}

impl ParsedDiff {
    /// Rebuilds the full image, treating regions without records as zero.
    pub fn reconstruct(&self) -> Vec<u8> {
        let mut image = vec![0u8; self.size as usize];
        for (offset, data) in &self.writes {
            let start = *offset as usize;
            image[start..start + data.len()].copy_from_slice(data);
        }
        image
    }

    pub fn payload_bytes(&self) -> u64 {
        self.writes.iter().map(|(_, d)| d.len() as u64).sum()
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> &'a [u8] {
        assert!(self.pos + n <= self.data.len(), "stream truncated at {}", self.pos);
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        out
    }

    fn byte(&mut self) -> u8 {
        self.take(1)[0]
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take(8).try_into().unwrap())
    }

    fn expect(&mut self, literal: &[u8]) {
        assert_eq!(self.take(literal.len()), literal, "unexpected bytes at {}", self.pos);
    }

    fn u64_record(&mut self) -> u64 {
        assert_eq!(self.u64(), 8, "scalar record length");
        self.u64()
    }
}

/// Parses a complete stream, panicking on any deviation from the layout.
pub fn parse_diff(data: &[u8]) -> ParsedDiff {
    let mut cur = Cursor { data, pos: 0 };
    let mut parsed = ParsedDiff::default();

    cur.expect(IMAGE_BANNER);
    loop {
        match cur.byte() {
            b'E' => break,
            b'O' => parsed.order = cur.u64_record(),
            b'T' => parsed.features = cur.u64_record(),
            b'U' => parsed.stripe_unit = cur.u64_record(),
            b'C' => parsed.stripe_count = cur.u64_record(),
            other => panic!("unexpected image record tag {:?}", other as char),
        }
    }

    cur.expect(IMAGE_DIFFS_BANNER);
    parsed.diff_count = cur.u64();
    cur.expect(DIFF_BANNER);

    loop {
        match cur.byte() {
            b'e' => break,
            b's' => parsed.size = cur.u64_record(),
            b'w' => {
                assert_eq!(cur.u64(), 24, "write header length");
                let record_len = cur.u64();
                let offset = cur.u64();
                let len = cur.u64();
                assert_eq!(record_len, len + 16);
                parsed.writes.push((offset, cur.take(len as usize).to_vec()));
            }
            other => panic!("unexpected diff record tag {:?}", other as char),
        }
    }

    assert_eq!(cur.pos, data.len(), "trailing bytes after end marker");
    parsed
}
