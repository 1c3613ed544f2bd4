// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use crc32fast::Hasher;

/// A reader that feeds every byte it yields into a running CRC-32.
///
/// The reader is handed to the transport, which may consume it on another
/// thread; the checksum is read back through the [`Checksum`] handle once
/// the request has completed.
pub(crate) struct ChecksumReader<R> {
    inner: R,
    state: Arc<Mutex<Hasher>>,
}

/// Shared view of the CRC-32 accumulated by a [`ChecksumReader`].
#[derive(Clone)]
pub(crate) struct Checksum {
    state: Arc<Mutex<Hasher>>,
}

impl<R: Read> ChecksumReader<R> {
    pub fn new(inner: R) -> (Self, Checksum) {
        let state = Arc::new(Mutex::new(Hasher::new()));
        let checksum = Checksum {
            state: Arc::clone(&state),
        };
        (ChecksumReader { inner, state }, checksum)
    }
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "checksum state poisoned"))?
            .update(&buf[..n]);
        Ok(n)
    }
}

impl Checksum {
    /// CRC-32 of the bytes read so far.
    pub fn value(&self) -> Option<u32> {
        self.state.lock().ok().map(|hasher| hasher.clone().finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::ChecksumReader;
    use std::io::{Cursor, Read};

    #[test]
    fn test_matches_one_shot_crc() {
        let content = b"The quick brown fox jumps over the lazy dog".to_vec();
        let (mut reader, checksum) = ChecksumReader::new(Cursor::new(content.clone()));

        let mut sink = Vec::new();
        reader.read_to_end(&mut sink).unwrap();

        assert_eq!(sink, content);
        assert_eq!(checksum.value(), Some(0x414f_a339));
        assert_eq!(checksum.value(), Some(crc32fast::hash(&content)));
    }

    #[test]
    fn test_accumulates_across_small_reads() {
        let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let (mut reader, checksum) = ChecksumReader::new(Cursor::new(content.clone()));

        let mut buf = [0u8; 7];
        while reader.read(&mut buf).unwrap() > 0 {}

        assert_eq!(checksum.value(), Some(crc32fast::hash(&content)));
    }

    #[test]
    fn test_empty_stream() {
        let (mut reader, checksum) = ChecksumReader::new(Cursor::new(Vec::new()));

        let mut sink = Vec::new();
        reader.read_to_end(&mut sink).unwrap();

        assert_eq!(checksum.value(), Some(0));
    }
}
