use crate::compression::Compression;
use crate::error::{ErrorKind, Result};
use crate::index::{ContentIndex, MetaValue};
use crate::record::{RowParser, header, to_record};
use crate::shard::{AuthorInitial, ShardRouter};
use bookdesc_extract::Book;
use bookdesc_storage::BackendRegistry;
use exn::ResultExt;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Index metadata key holding the stamp of the CSV the index last matched.
const STAMP_KEY: &str = "mtime";
/// Suffix of the file a CSV is written to before it replaces the old one.
const TEMP_SUFFIX: &str = "_new";
/// Shard key used when the whole catalog is a single file.
const SINGLE_SHARD: &str = "";

/// How a [`Catalog`] names and stores its files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Name of the storage backend for shard indexes
    pub backend: String,
    /// Appended to a shard key to name its CSV file. A trailing `.gz` or
    /// `.bz2` compresses it.
    pub csv_extension: String,
    /// Appended to a shard key (or the catalog file) to name its index.
    pub index_extension: String,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            backend: if cfg!(feature = "redb") { "redb" } else { "log" }.to_string(),
            csv_extension: ".csv".to_string(),
            index_extension: ".idx".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
enum Layout {
    /// One CSV and one index per shard inside the directory
    Directory(PathBuf),
    /// Every book in one CSV file, with its index beside it
    SingleFile(PathBuf),
}

impl Layout {
    /// CSV and index paths for a shard.
    fn paths(&self, key: &str, options: &CatalogOptions) -> (PathBuf, PathBuf) {
        match self {
            Layout::Directory(root) => (
                root.join(format!("{key}{}", options.csv_extension)),
                root.join(format!("{key}{}", options.index_extension)),
            ),
            Layout::SingleFile(path) => (path.clone(), append_to_path(path, &options.index_extension)),
        }
    }
}

fn append_to_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Debug)]
struct Shard {
    csv: PathBuf,
    index: ContentIndex,
}

/// A catalog of books split into shards, each a CSV file backed by an index.
///
/// Shards are opened on first use. Opening one brings its index up to date
/// with its CSV, unless the CSV is unchanged since it was last written from
/// that index. Books are added to the index with [`put`](Self::put) and the
/// CSVs of every opened shard are rewritten by
/// [`build_all_csvs`](Self::build_all_csvs).
///
/// A catalog root that is an existing directory holds one file pair per
/// shard. Any other path is treated as a single CSV file holding every book,
/// and routing is skipped.
///
/// Indexes are closed by [`close`](Self::close), or on drop as a last resort.
pub struct Catalog {
    layout: Layout,
    options: CatalogOptions,
    registry: BackendRegistry,
    router: Box<dyn ShardRouter>,
    shards: BTreeMap<String, Shard>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("layout", &self.layout)
            .field("options", &self.options)
            .field("shards", &self.shards.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Catalog {
    /// Open the catalog at `root`. Nothing is read until the first book is
    /// put; misconfiguration is reported here.
    #[instrument(skip_all, fields(root = %root.as_ref().display(), backend = %options.backend))]
    pub fn open(root: impl AsRef<Path>, options: CatalogOptions, registry: BackendRegistry) -> Result<Self> {
        let root = root.as_ref();
        if options.csv_extension.is_empty() || options.index_extension.is_empty() {
            exn::bail!(ErrorKind::Config("CSV and index extensions must not be empty".to_string()));
        }
        if options.csv_extension == options.index_extension {
            exn::bail!(ErrorKind::Config(format!(
                "CSV and index extensions are both '{}'",
                options.csv_extension
            )));
        }
        if !registry.contains(&options.backend) {
            exn::bail!(ErrorKind::Config(format!(
                "unknown storage backend '{}', expected one of: {}",
                options.backend,
                registry.names().collect::<Vec<_>>().join(", ")
            )));
        }
        let layout = if root.is_dir() {
            Layout::Directory(root.to_path_buf())
        } else {
            tracing::debug!("catalog root is not a directory, writing a single file");
            Layout::SingleFile(root.to_path_buf())
        };
        Ok(Self { layout, options, registry, router: Box::new(AuthorInitial), shards: BTreeMap::new() })
    }

    /// Route books with `router` instead of [`AuthorInitial`].
    pub fn with_router(mut self, router: impl ShardRouter + 'static) -> Self {
        self.router = Box::new(router);
        self
    }

    pub fn is_single_file(&self) -> bool {
        matches!(self.layout, Layout::SingleFile(_))
    }

    /// Keys of the shards opened so far.
    pub fn shard_keys(&self) -> impl Iterator<Item = &str> {
        self.shards.keys().map(String::as_str)
    }

    /// The index of an opened shard.
    pub fn index(&self, key: &str) -> Option<&ContentIndex> {
        self.shards.get(key).map(|shard| &shard.index)
    }

    /// Shard key `book` belongs to.
    pub fn route(&self, book: &Book) -> String {
        match self.layout {
            Layout::Directory(_) => self.router.route(book),
            Layout::SingleFile(_) => SINGLE_SHARD.to_string(),
        }
    }

    /// Add `book` to its shard, replacing any book with the same digest.
    #[instrument(skip_all, fields(shard))]
    pub fn put(&mut self, book: &Book) -> Result<()> {
        if book.key().is_none() {
            exn::bail!(ErrorKind::MissingHash);
        }
        let key = self.route(book);
        tracing::Span::current().record("shard", key.as_str());
        let shard = match self.shards.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let shard = open_shard(&self.layout, &self.options, &self.registry, entry.key())?;
                entry.insert(shard)
            },
        };
        shard.index.save(book)
    }

    /// Rewrite the CSV of every shard opened during this run from its index.
    /// Returns the number of files written.
    #[instrument(skip(self), fields(shards = self.shards.len()))]
    pub fn build_all_csvs(&mut self) -> Result<usize> {
        for (key, shard) in &mut self.shards {
            let rows = write_csv(shard)?;
            tracing::info!(shard = %key, path = %shard.csv.display(), rows, "wrote catalog file");
        }
        Ok(self.shards.len())
    }

    /// Close every opened index. All indexes are closed even if one fails;
    /// the first failure is returned.
    pub fn close(mut self) -> Result<()> {
        close_shards(std::mem::take(&mut self.shards))
    }
}

impl Drop for Catalog {
    fn drop(&mut self) {
        if self.shards.is_empty() {
            return;
        }
        if let Err(err) = close_shards(std::mem::take(&mut self.shards)) {
            tracing::warn!(err = %err, "failed to close catalog indexes");
        }
    }
}

fn close_shards(shards: BTreeMap<String, Shard>) -> Result<()> {
    let mut first = None;
    for (key, shard) in shards {
        if let Err(err) = shard.index.close() {
            tracing::warn!(shard = %key, err = %err, "failed to close index");
            first.get_or_insert(err);
        }
    }
    first.map_or(Ok(()), Err)
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
        exn::bail!(ErrorKind::Config(format!("shard key {key:?} cannot be used as a file name")));
    }
    Ok(())
}

/// Open a shard's index and bring it up to date with the shard's CSV.
#[instrument(skip(layout, options, registry))]
fn open_shard(layout: &Layout, options: &CatalogOptions, registry: &BackendRegistry, key: &str) -> Result<Shard> {
    if matches!(layout, Layout::Directory(_)) {
        validate_key(key)?;
    }
    let (csv, index_path) = layout.paths(key, options);
    let mut index = ContentIndex::open(registry, &options.backend, &index_path)?;
    rebuild(&mut index, &csv)?;
    Ok(Shard { csv, index })
}

/// Load the rows of `csv` into `index`, unless the index already matches it.
///
/// A missing or unreadable CSV leaves the index as it is. Rows that cannot
/// be parsed are skipped.
fn rebuild(index: &mut ContentIndex, csv: &Path) -> Result<()> {
    let stamp = match MetaValue::stamp(csv) {
        Ok(stamp) => stamp,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %csv.display(), "no catalog file yet");
            return Ok(());
        },
        Err(err) => {
            tracing::warn!(path = %csv.display(), %err, "cannot inspect catalog file, starting without it");
            return Ok(());
        },
    };
    let unchanged = index.get(STAMP_KEY)?.as_ref() == Some(&stamp);
    // Whatever happens next, the stamp no longer describes the index.
    index.clear(STAMP_KEY)?;
    if unchanged {
        tracing::debug!(path = %csv.display(), "index matches catalog file, skipping reparse");
        return Ok(());
    }

    let file = match File::open(csv) {
        Ok(file) => file,
        Err(err) => {
            tracing::warn!(path = %csv.display(), %err, "cannot open catalog file, starting without it");
            return Ok(());
        },
    };
    let reader = Compression::from_path(csv).wrap_reader(BufReader::new(file));
    let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(reader);
    let mut records = reader.records();
    let parser = match records.next() {
        None => return Ok(()),
        Some(Ok(header)) => RowParser::from_header(&header),
        Some(Err(err)) => {
            tracing::warn!(path = %csv.display(), %err, "unreadable catalog header, starting without it");
            return Ok(());
        },
    };

    let (mut loaded, mut skipped) = (0usize, 0usize);
    for record in records {
        let record = match record {
            Ok(record) => record,
            Err(err) if err.is_io_error() => {
                tracing::warn!(path = %csv.display(), %err, "catalog file ends early");
                break;
            },
            Err(err) => {
                tracing::warn!(path = %csv.display(), %err, "skipping unreadable row");
                skipped += 1;
                continue;
            },
        };
        let line = record.position().map(|position| position.line());
        let book = match parser.parse(&record) {
            Ok(book) if book.key().is_some() => book,
            Ok(_) => {
                tracing::warn!(path = %csv.display(), line, "skipping row without SHA1");
                skipped += 1;
                continue;
            },
            Err(err) => {
                tracing::warn!(path = %csv.display(), line, err = %err, "skipping corrupt row");
                skipped += 1;
                continue;
            },
        };
        index.save(&book)?;
        loaded += 1;
    }
    tracing::debug!(path = %csv.display(), loaded, skipped, "rebuilt index from catalog file");
    Ok(())
}

/// Write the shard's CSV through a temporary file, stamp the index with the
/// new file and move it into place. Returns the number of rows written.
fn write_csv(shard: &mut Shard) -> Result<usize> {
    let temp = append_to_path(&shard.csv, TEMP_SUFFIX);
    let rows = match write_rows(&shard.index, &temp, Compression::from_path(&shard.csv)) {
        Ok(rows) => rows,
        Err(err) => {
            let _ = std::fs::remove_file(&temp);
            return Err(err);
        },
    };
    let stamp = MetaValue::stamp(&temp).or_raise(|| ErrorKind::Io(temp.clone()))?;
    shard.index.set(STAMP_KEY, &stamp)?;
    shard.index.flush()?;
    std::fs::rename(&temp, &shard.csv).or_raise(|| ErrorKind::Io(shard.csv.clone()))?;
    Ok(rows)
}

fn write_rows(index: &ContentIndex, path: &Path, compression: Compression) -> Result<usize> {
    let io_error = || ErrorKind::Io(path.to_path_buf());
    let file = File::create(path).or_raise(io_error)?;
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(compression.wrap_writer(BufWriter::new(file)));
    writer.write_record(&header()).or_raise(io_error)?;
    let mut rows = 0;
    for book in index.list()? {
        match book {
            Ok(book) => {
                writer.write_record(&to_record(&book)).or_raise(io_error)?;
                rows += 1;
            },
            Err(err) => tracing::warn!(path = %path.display(), err = %err, "leaving undecodable book out of catalog"),
        }
    }
    let encoder = writer.into_inner().map_err(|err| err.into_error()).or_raise(io_error)?;
    let buffered = encoder.finish().or_raise(io_error)?;
    let file = buffered.into_inner().map_err(|err| err.into_error()).or_raise(io_error)?;
    file.sync_all().or_raise(io_error)?;
    Ok(rows)
}
