use std::fmt::Write as _;
use time::OffsetDateTime;

/// Raw SHA-1 digest bytes.
pub type Sha1Digest = [u8; 20];
/// Raw MD5 digest bytes.
pub type Md5Digest = [u8; 16];

/// Where a book's bytes came from, and what they hashed to.
///
/// The SHA-1 digest is the primary content key: two files with the same
/// digest are the same catalog entry no matter where they live or what their
/// metadata claims. Everything else is descriptive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileInfo {
    /// SHA-1 of the entire file (primary key)
    pub sha1: Option<Sha1Digest>,
    /// MD5 of the entire file, when computed
    pub md5: Option<Md5Digest>,
    /// Source path as reported by the input source
    pub path: Option<String>,
    /// File size in bytes
    pub size: Option<u64>,
    /// Last modification time of the source file
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339::option"))]
    pub modified: Option<OffsetDateTime>,
}
impl FileInfo {
    /// Describe a source file before its content has been hashed.
    pub fn new(path: impl Into<String>, size: u64, modified: impl Into<OffsetDateTime>) -> Self {
        Self {
            path: Some(path.into()),
            size: Some(size),
            modified: Some(modified.into()),
            ..Self::default()
        }
    }

    pub fn sha1_hex(&self) -> Option<String> {
        self.sha1.as_ref().map(|digest| to_hex(digest))
    }

    pub fn md5_hex(&self) -> Option<String> {
        self.md5.as_ref().map(|digest| to_hex(digest))
    }
}

/// Lower-case hexadecimal rendering of raw digest bytes.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut hex, byte| {
        // Writing to a String cannot fail.
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}

/// Parse a hexadecimal digest of exactly `N` bytes. Case-insensitive;
/// surrounding whitespace is ignored.
pub fn from_hex<const N: usize>(hex: &str) -> Option<[u8; N]> {
    let hex = hex.trim().as_bytes();
    if hex.len() != N * 2 {
        return None;
    }
    let mut out = [0u8; N];
    for (byte, pair) in out.iter_mut().zip(hex.chunks_exact(2)) {
        let high = char::from(pair[0]).to_digit(16)?;
        let low = char::from(pair[1]).to_digit(16)?;
        *byte = u8::try_from(high << 4 | low).ok()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn hex_is_lower_case() {
        assert_eq!(to_hex(&[0x00, 0xAB, 0x0f, 0xff]), "00ab0fff");
        assert_eq!(to_hex(&[]), "");
    }

    #[rstest]
    #[case("00ab0fff", Some([0x00, 0xAB, 0x0F, 0xFF]))]
    #[case("00AB0FFF", Some([0x00, 0xAB, 0x0F, 0xFF]))]
    #[case("  00ab0fff\n", Some([0x00, 0xAB, 0x0F, 0xFF]))]
    #[case("00ab0ff", None)]
    #[case("00ab0fff00", None)]
    #[case("00ag0fff", None)]
    #[case("", None)]
    fn parses_hex(#[case] hex: &str, #[case] expected: Option<[u8; 4]>) {
        assert_eq!(from_hex::<4>(hex), expected);
    }

    #[test]
    fn new_file_has_no_digests() {
        let file = FileInfo::new("books/a.fb2", 42, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(file.path.as_deref(), Some("books/a.fb2"));
        assert_eq!(file.size, Some(42));
        assert!(file.sha1.is_none());
        assert!(file.sha1_hex().is_none());
    }
}
