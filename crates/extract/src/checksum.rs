//! Incremental hashing over a bounded, reusable read buffer.

use crate::consts::MINIMUM_BUFFER_SIZE;
use crate::error::{Error, ErrorKind, Result};
use crate::models::{Md5Digest, Sha1Digest, to_hex};
use sha1::{Digest as _, Sha1};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{ErrorKind as IoErrorKind, Read};
use std::str::FromStr;

/// A supported content hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-1, the primary content key
    Sha1,
    /// MD5, an optional secondary digest
    Md5,
}
impl FromStr for HashAlgorithm {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "md5" => Ok(Self::Md5),
            _ => exn::bail!(ErrorKind::UnknownAlgorithm(s.to_string())),
        }
    }
}
impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Sha1 => f.write_str("sha1"),
            Self::Md5 => f.write_str("md5"),
        }
    }
}

/// A finished (or running) digest, tagged with the algorithm that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Digest {
    Sha1(Sha1Digest),
    Md5(Md5Digest),
}
impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Sha1(bytes) => bytes.as_slice(),
            Self::Md5(bytes) => bytes.as_slice(),
        }
    }

    pub fn to_hex(&self) -> String {
        to_hex(self.as_bytes())
    }
}

enum Hasher {
    Sha1(Sha1),
    Md5(md5::Context),
}
impl Hasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            HashAlgorithm::Md5 => Self::Md5(md5::Context::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha1(hasher) => hasher.update(bytes),
            Self::Md5(context) => context.consume(bytes),
        }
    }

    /// Snapshot of the running digest; hashing can continue afterwards.
    fn digest(&self) -> Digest {
        match self {
            Self::Sha1(hasher) => {
                let mut out = [0u8; 20];
                out.copy_from_slice(&hasher.clone().finalize());
                Digest::Sha1(out)
            },
            Self::Md5(context) => Digest::Md5(context.clone().compute().0),
        }
    }
}

/// Reads a byte stream one buffer at a time, hashing every byte that passes
/// through.
///
/// Peak memory is the buffer size, regardless of how large the stream is.
/// The buffer is reused between reads, so [`chunk`](Self::chunk) is only
/// valid until the next [`read`](Self::read).
///
/// # Examples
///
/// ```
/// use bookdesc_extract::{ChecksumReader, HashAlgorithm};
///
/// let mut reader = ChecksumReader::new(&b"abc"[..], 1024 * 1024, [HashAlgorithm::Sha1]).unwrap();
/// assert_eq!(reader.read().unwrap(), 3);
/// assert_eq!(reader.read().unwrap(), 0);
/// let digest = reader.digest(HashAlgorithm::Sha1).unwrap();
/// assert_eq!(digest.to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
/// ```
pub struct ChecksumReader<R> {
    reader: R,
    buffer: Vec<u8>,
    filled: usize,
    total: u64,
    hashers: Vec<(HashAlgorithm, Hasher)>,
}
impl<R: Read> ChecksumReader<R> {
    /// Wrap `reader`, hashing with each of `algorithms`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::BufferTooSmall`] if `buffer_size` is below
    /// [`MINIMUM_BUFFER_SIZE`].
    pub fn new(reader: R, buffer_size: usize, algorithms: impl IntoIterator<Item = HashAlgorithm>) -> Result<Self> {
        if buffer_size < MINIMUM_BUFFER_SIZE {
            exn::bail!(ErrorKind::BufferTooSmall { size: buffer_size, minimum: MINIMUM_BUFFER_SIZE });
        }
        let mut hashers: Vec<(HashAlgorithm, Hasher)> = Vec::new();
        for algorithm in algorithms {
            if !hashers.iter().any(|(registered, _)| *registered == algorithm) {
                hashers.push((algorithm, Hasher::new(algorithm)));
            }
        }
        Ok(Self { reader, buffer: vec![0; buffer_size], filled: 0, total: 0, hashers })
    }

    /// Refill the buffer from the underlying reader.
    ///
    /// Keeps reading until the buffer is full or the stream ends, so a short
    /// count means the stream is nearly exhausted and zero means it is.
    pub fn read(&mut self) -> Result<usize> {
        self.filled = 0;
        while self.filled < self.buffer.len() {
            match self.reader.read(&mut self.buffer[self.filled..]) {
                Ok(0) => break,
                Ok(count) => self.filled += count,
                Err(err) if err.kind() == IoErrorKind::Interrupted => continue,
                Err(err) => exn::bail!(ErrorKind::Io(err)),
            }
        }
        let chunk = &self.buffer[..self.filled];
        for (_, hasher) in &mut self.hashers {
            hasher.update(chunk);
        }
        self.total += self.filled as u64;
        Ok(self.filled)
    }

    /// Bytes filled by the most recent [`read`](Self::read).
    pub fn chunk(&self) -> &[u8] {
        &self.buffer[..self.filled]
    }

    /// Running digest over every byte read so far, or `None` if `algorithm`
    /// was not requested at construction.
    pub fn digest(&self, algorithm: HashAlgorithm) -> Option<Digest> {
        self.hashers.iter().find(|(registered, _)| *registered == algorithm).map(|(_, hasher)| hasher.digest())
    }

    /// Total bytes read from the stream so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
