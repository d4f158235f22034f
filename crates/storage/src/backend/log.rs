//! Append-only log storage backend.
//!
//! Every `set` and `remove` appends one record to the store file:
//!
//! ```text
//! op: u8 | key_len: u32 LE | value_len: u32 LE | key | value | crc32: u32 LE
//! ```
//!
//! The checksum covers everything before it. The whole log is replayed into
//! memory on open; a record that is cut short or fails its checksum marks the
//! end of the usable log and everything from it onwards is truncated away.
//! On close the log is rewritten with only live entries once it holds more
//! stale records than live ones.

use super::{Items, Store};
use crate::error::{Error, ErrorKind, Result};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const OP_SET: u8 = 1;
const OP_REMOVE: u8 = 2;
const HEADER_LEN: usize = 1 + 4 + 4;
const CRC_LEN: usize = 4;

/// Append-only, checksummed key-value log.
///
/// Keeps every live entry in memory, so lookups never touch the disk.
#[derive(Debug)]
pub struct LogStore {
    path: PathBuf,
    writer: BufWriter<File>,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    stale: usize,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |err| Error::from(ErrorKind::from_io(err, path))
}

fn compaction_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".compact");
    PathBuf::from(name)
}

fn encode(op: u8, key: &[u8], value: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let (Ok(key_len), Ok(value_len)) = (u32::try_from(key.len()), u32::try_from(value.len())) else {
        exn::bail!(ErrorKind::Backend(format!(
            "record too large: {} byte key, {} byte value",
            key.len(),
            value.len()
        )));
    };
    let start = out.len();
    out.push(op);
    out.extend_from_slice(&key_len.to_le_bytes());
    out.extend_from_slice(&value_len.to_le_bytes());
    out.extend_from_slice(key);
    out.extend_from_slice(value);
    let crc = crc32fast::hash(&out[start..]);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(())
}

/// A record decoded from the front of `data`, with its encoded length.
struct Record<'a> {
    op: u8,
    key: &'a [u8],
    value: &'a [u8],
    len: usize,
}

fn decode(data: &[u8]) -> Option<Record<'_>> {
    let header = data.get(..HEADER_LEN)?;
    let op = header[0];
    let key_len = u32::from_le_bytes(header[1..5].try_into().ok()?) as usize;
    let value_len = u32::from_le_bytes(header[5..9].try_into().ok()?) as usize;
    let body_end = HEADER_LEN.checked_add(key_len)?.checked_add(value_len)?;
    let crc = data.get(body_end..body_end.checked_add(CRC_LEN)?)?;
    if crc32fast::hash(&data[..body_end]).to_le_bytes() != crc || !matches!(op, OP_SET | OP_REMOVE) {
        return None;
    }
    Some(Record {
        op,
        key: &data[HEADER_LEN..HEADER_LEN + key_len],
        value: &data[HEADER_LEN + key_len..body_end],
        len: body_end + CRC_LEN,
    })
}

impl LogStore {
    /// Open the log at `path`, creating it if it does not exist.
    ///
    /// The parent directory must already exist.
    #[tracing::instrument(level = "debug")]
    pub fn open(path: &Path) -> Result<Self> {
        let leftover = compaction_path(path);
        if leftover.exists() {
            tracing::warn!(path = %leftover.display(), "removing unfinished compaction");
            std::fs::remove_file(&leftover).map_err(io_error(&leftover))?;
        }

        let mut file =
            OpenOptions::new().read(true).append(true).create(true).open(path).map_err(io_error(path))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(io_error(path))?;

        let mut entries = BTreeMap::new();
        let mut stale = 0;
        let mut offset = 0;
        while let Some(record) = decode(&data[offset..]) {
            match record.op {
                OP_SET => {
                    if entries.insert(record.key.to_vec(), record.value.to_vec()).is_some() {
                        stale += 1;
                    }
                },
                _ => {
                    stale += if entries.remove(record.key).is_some() { 2 } else { 1 };
                },
            }
            offset += record.len;
        }
        if offset < data.len() {
            tracing::warn!(
                path = %path.display(),
                valid = offset,
                discarded = data.len() - offset,
                "truncating damaged tail of store log"
            );
            file.set_len(offset as u64).map_err(io_error(path))?;
        }
        tracing::debug!(live = entries.len(), stale, "replayed store log");

        Ok(Self { path: path.to_path_buf(), writer: BufWriter::new(file), entries, stale })
    }

    fn append(&mut self, op: u8, key: &[u8], value: &[u8]) -> Result<()> {
        let mut record = Vec::with_capacity(HEADER_LEN + key.len() + value.len() + CRC_LEN);
        encode(op, key, value, &mut record)?;
        self.writer.write_all(&record).map_err(io_error(&self.path))
    }

    /// Rewrite the log with only its live entries.
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub fn compact(&mut self) -> Result<()> {
        let target = compaction_path(&self.path);
        let mut records = Vec::new();
        for (key, value) in &self.entries {
            encode(OP_SET, key, value, &mut records)?;
        }
        {
            let mut file = File::create(&target).map_err(io_error(&target))?;
            file.write_all(&records).map_err(io_error(&target))?;
            file.sync_all().map_err(io_error(&target))?;
        }
        std::fs::rename(&target, &self.path).map_err(io_error(&self.path))?;

        let file = OpenOptions::new().append(true).open(&self.path).map_err(io_error(&self.path))?;
        self.writer = BufWriter::new(file);
        tracing::debug!(dropped = self.stale, live = self.entries.len(), "compacted store log");
        self.stale = 0;
        Ok(())
    }

    /// Number of records in the log that no longer contribute a live entry.
    pub fn stale(&self) -> usize {
        self.stale
    }
}

impl Store for LogStore {
    fn name(&self) -> &str {
        "log"
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.append(OP_SET, key, value)?;
        if self.entries.insert(key.to_vec(), value.to_vec()).is_some() {
            self.stale += 1;
        }
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<bool> {
        if !self.entries.contains_key(key) {
            return Ok(false);
        }
        self.append(OP_REMOVE, key, &[])?;
        self.entries.remove(key);
        self.stale += 2;
        Ok(true)
    }

    fn items(&self) -> Result<Items<'_>> {
        Ok(Box::new(self.entries.iter().map(|(key, value)| Ok((key.clone(), value.clone())))))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(io_error(&self.path))?;
        self.writer.get_ref().sync_data().map_err(io_error(&self.path))
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush()?;
        if self.stale > self.entries.len() {
            self.compact()?;
        }
        Ok(())
    }
}
