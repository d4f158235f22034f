//! Transparent compression of catalog CSV files, chosen by file extension.

use bzip2::{Compression as BzCompression, read::MultiBzDecoder, write::BzEncoder};
use flate2::{Compression as GzCompression, read::MultiGzDecoder, write::GzEncoder};
use std::io::{Read, Result as IoResult, Write};
use std::path::Path;

// Catalogs are written once per run and read rarely; favour size over speed.
const BZIP2_LEVEL: BzCompression = BzCompression::best();
const GZIP_LEVEL: GzCompression = GzCompression::best();

/// A supported compression format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// Gzip compression (.gz)
    Gzip,
}

impl Compression {
    /// Detect compression from a file extension.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| match ext.to_lowercase().as_str() {
                "bz2" => Compression::Bzip2,
                "gz" => Compression::Gzip,
                _ => Compression::None,
            })
            .unwrap_or(Compression::None)
    }

    /// Decompress everything read through `reader`.
    pub fn wrap_reader<'a, R: Read + 'a>(&self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            Compression::None => Box::new(reader),
            Compression::Bzip2 => Box::new(MultiBzDecoder::new(reader)),
            Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
        }
    }

    /// Compress everything written through the returned encoder. The stream
    /// is only complete once [`Encoder::finish`] has returned.
    pub fn wrap_writer<W: Write>(&self, writer: W) -> Encoder<W> {
        match self {
            Compression::None => Encoder::None(writer),
            Compression::Bzip2 => Encoder::Bzip2(BzEncoder::new(writer, BZIP2_LEVEL)),
            Compression::Gzip => Encoder::Gzip(GzEncoder::new(writer, GZIP_LEVEL)),
        }
    }
}

/// Writer returned by [`Compression::wrap_writer`].
pub enum Encoder<W: Write> {
    None(W),
    Bzip2(BzEncoder<W>),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    /// Write the compressed stream's trailer and return the inner writer.
    pub fn finish(self) -> IoResult<W> {
        match self {
            Encoder::None(writer) => Ok(writer),
            Encoder::Bzip2(encoder) => encoder.finish(),
            Encoder::Gzip(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        match self {
            Encoder::None(writer) => writer.write(buf),
            Encoder::Bzip2(encoder) => encoder.write(buf),
            Encoder::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        match self {
            Encoder::None(writer) => writer.flush(),
            Encoder::Bzip2(encoder) => encoder.flush(),
            Encoder::Gzip(encoder) => encoder.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a.csv", Compression::None)]
    #[case("a.csv.gz", Compression::Gzip)]
    #[case("a.CSV.GZ", Compression::Gzip)]
    #[case("a.csv.bz2", Compression::Bzip2)]
    // `.gz` alone is a dotfile with no extension.
    #[case(".gz", Compression::None)]
    #[case("catalog", Compression::None)]
    fn from_path(#[case] path: &str, #[case] expected: Compression) {
        assert_eq!(Compression::from_path(path), expected);
    }

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Bzip2)]
    #[case(Compression::Gzip)]
    fn writer_reader_round_trip(#[case] format: Compression) {
        let original = "SHA1,Title\nab,Грибов\n".repeat(100);
        let mut encoder = format.wrap_writer(Vec::new());
        encoder.write_all(original.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();
        if format != Compression::None {
            assert!(compressed.len() < original.len());
        }

        let mut decompressed = String::new();
        format.wrap_reader(compressed.as_slice()).read_to_string(&mut decompressed).unwrap();
        assert_eq!(decompressed, original);
    }
}
