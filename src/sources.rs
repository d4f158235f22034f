//! Input discovery: single files and recursive directory walks.

use std::fs::{File, Metadata};
use std::io::Result as IoResult;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A file found by a source, described before it is opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl Input {
    fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        Self { path, size: metadata.len(), modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH) }
    }

    /// A fresh stream over the file's bytes.
    pub fn open(&self) -> IoResult<File> {
        File::open(&self.path)
    }

    pub fn is_fb2(&self) -> bool {
        has_extension(&self.path, "fb2")
    }

    pub fn is_zip(&self) -> bool {
        has_extension(&self.path, "zip")
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

/// A single file given on the command line.
#[derive(Debug)]
pub struct FileSource {
    input: Option<Input>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> IoResult<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        Ok(Self { input: Some(Input::from_metadata(path, &metadata)) })
    }
}

impl Iterator for FileSource {
    type Item = Input;

    fn next(&mut self) -> Option<Input> {
        self.input.take()
    }
}

/// Every regular file beneath a directory, depth first, each directory's
/// entries in name order. Symbolic links are not followed.
#[derive(Debug)]
pub struct DirectorySource {
    /// Pending paths, the next one to visit last
    stack: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let mut source = Self { stack: Vec::new() };
        source.push_children(root.as_ref());
        source
    }

    fn push_children(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(path = %dir.display(), %err, "skipping unreadable directory");
                return;
            },
        };
        let mut children: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(err) => {
                    tracing::warn!(path = %dir.display(), %err, "skipping unreadable directory entry");
                    None
                },
            })
            .collect();
        children.sort_unstable_by(|a, b| b.cmp(a));
        self.stack.extend(children);
    }
}

impl Iterator for DirectorySource {
    type Item = Input;

    fn next(&mut self) -> Option<Input> {
        while let Some(path) = self.stack.pop() {
            let metadata = match std::fs::symlink_metadata(&path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable path");
                    continue;
                },
            };
            if metadata.is_dir() {
                self.push_children(&path);
            } else if metadata.is_file() {
                return Some(Input::from_metadata(path, &metadata));
            } else {
                tracing::debug!(path = %path.display(), "skipping special file");
            }
        }
        None
    }
}

/// Inputs found at `path`, a file or a directory.
pub fn discover(path: &Path) -> IoResult<Box<dyn Iterator<Item = Input>>> {
    if std::fs::metadata(path)?.is_dir() {
        Ok(Box::new(DirectorySource::new(path)))
    } else {
        Ok(Box::new(FileSource::new(path)?))
    }
}
