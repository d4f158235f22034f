//! Character encoding detection and permissive decoding.
//!
//! FB2 files in the wild are a mix of UTF-8, Windows codepages and the
//! occasional UTF-16 export. Detection never fails: when nothing in the first
//! buffer says otherwise, the document is treated as UTF-8.

use crate::consts::{
    DECLARATION_WINDOW, DOUBLE_QUOTED_ENCODING_REGEX, SINGLE_QUOTED_ENCODING_REGEX, WINDOWS_CODEPAGE_REGEX,
};
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use memchr::memchr;
use std::borrow::Cow;
use std::fmt::{Display, Formatter, Result as FmtResult};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];
const UTF32LE_BOM: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
const UTF32BE_BOM: &[u8] = &[0x00, 0x00, 0xFE, 0xFF];
// `<?` in a wide encoding without a byte-order mark.
const UTF16LE_PROLOG: &[u8] = &[0x3C, 0x00, 0x3F, 0x00];
const UTF16BE_PROLOG: &[u8] = &[0x00, 0x3C, 0x00, 0x3F];
const UTF32LE_PROLOG: &[u8] = &[0x3C, 0x00, 0x00, 0x00];
const UTF32BE_PROLOG: &[u8] = &[0x00, 0x00, 0x00, 0x3C];

/// The text encoding of a document.
///
/// UTF-32 is not part of the WHATWG encoding standard that `encoding_rs`
/// implements, so the Unicode transformation formats get their own variants
/// and everything else is an ASCII-compatible [`Legacy`](Self::Legacy)
/// encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    /// A single or multi-byte encoding that leaves ASCII bytes as ASCII
    Legacy(&'static Encoding),
}
impl Display for TextEncoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.label())
    }
}
impl TextEncoding {
    /// Detect the encoding of a document from its first buffer.
    ///
    /// In order of precedence: a byte-order mark, the byte pattern of a
    /// BOM-less UTF-16/UTF-32 XML prolog, an `encoding="..."` declaration in
    /// the first line, and finally UTF-8.
    pub fn sniff(buffer: &[u8]) -> Self {
        // UTF-32LE's mark starts with UTF-16LE's, so the longer one goes first.
        if buffer.starts_with(UTF32LE_BOM) {
            return Self::Utf32Le;
        }
        if buffer.starts_with(UTF32BE_BOM) {
            return Self::Utf32Be;
        }
        if buffer.starts_with(UTF8_BOM) {
            return Self::Utf8;
        }
        if buffer.starts_with(UTF16LE_BOM) {
            return Self::Utf16Le;
        }
        if buffer.starts_with(UTF16BE_BOM) {
            return Self::Utf16Be;
        }
        if buffer.starts_with(UTF16LE_PROLOG) {
            return Self::Utf16Le;
        }
        if buffer.starts_with(UTF16BE_PROLOG) {
            return Self::Utf16Be;
        }
        if buffer.starts_with(UTF32LE_PROLOG) {
            return Self::Utf32Le;
        }
        if buffer.starts_with(UTF32BE_PROLOG) {
            return Self::Utf32Be;
        }
        declared_label(buffer).map(|label| Self::for_label(&label)).unwrap_or_default()
    }

    /// Resolve an encoding label, as it might appear in an XML declaration.
    ///
    /// Unknown labels, and labels naming an encoding that could not have been
    /// used to write an ASCII-readable declaration, resolve to UTF-8.
    pub fn for_label(label: &str) -> Self {
        let label = label.trim();
        let alias = codepage_alias(label);
        let Some(encoding) =
            Encoding::for_label(alias.as_bytes()).or_else(|| Encoding::for_label(label.as_bytes()))
        else {
            tracing::debug!(label, "unrecognised encoding label, assuming UTF-8");
            return Self::Utf8;
        };
        if encoding == UTF_8 {
            Self::Utf8
        } else if encoding.is_ascii_compatible() {
            Self::Legacy(encoding)
        } else {
            tracing::debug!(label, "declared encoding contradicts the declaration bytes, assuming UTF-8");
            Self::Utf8
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
            Self::Utf32Le => "utf-32le",
            Self::Utf32Be => "utf-32be",
            Self::Legacy(encoding) => encoding.name(),
        }
    }

    /// Width of one code unit in bytes. Matches found in an encoded buffer are
    /// only meaningful when aligned to this width.
    pub fn code_unit(&self) -> usize {
        match self {
            Self::Utf8 | Self::Legacy(_) => 1,
            Self::Utf16Le | Self::Utf16Be => 2,
            Self::Utf32Le | Self::Utf32Be => 4,
        }
    }

    /// Encode an ASCII marker (such as a tag name) the way it would appear in
    /// a document of this encoding.
    pub fn encode_marker(&self, marker: &str) -> Vec<u8> {
        debug_assert!(marker.is_ascii(), "markers must be ASCII");
        let width = self.code_unit();
        let mut encoded = Vec::with_capacity(marker.len() * width);
        for byte in marker.bytes() {
            match self {
                Self::Utf8 | Self::Legacy(_) => encoded.push(byte),
                Self::Utf16Le => encoded.extend_from_slice(&[byte, 0]),
                Self::Utf16Be => encoded.extend_from_slice(&[0, byte]),
                Self::Utf32Le => encoded.extend_from_slice(&[byte, 0, 0, 0]),
                Self::Utf32Be => encoded.extend_from_slice(&[0, 0, 0, byte]),
            }
        }
        encoded
    }

    /// Decode bytes to text, dropping invalid sequences instead of failing or
    /// inserting replacement characters.
    pub fn decode_lossy(&self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => strip_replacements(UTF_8.decode_without_bom_handling(bytes).0),
            Self::Utf16Le => strip_replacements(UTF_16LE.decode_without_bom_handling(bytes).0),
            Self::Utf16Be => strip_replacements(UTF_16BE.decode_without_bom_handling(bytes).0),
            Self::Legacy(encoding) => strip_replacements(encoding.decode_without_bom_handling(bytes).0),
            Self::Utf32Le => decode_utf32(bytes, u32::from_le_bytes),
            Self::Utf32Be => decode_utf32(bytes, u32::from_be_bytes),
        }
    }
}

/// Rewrite `windows-XXXX` to its `cpXXXX` alias; any other label is returned
/// unchanged.
pub fn codepage_alias(label: &str) -> Cow<'_, str> {
    match WINDOWS_CODEPAGE_REGEX.captures(label).and_then(|captures| captures.get(1)) {
        Some(codepage) => Cow::Owned(format!("cp{}", codepage.as_str())),
        None => Cow::Borrowed(label),
    }
}

/// The encoding named by an XML declaration on the first line of `buffer`.
fn declared_label(buffer: &[u8]) -> Option<String> {
    let line = match memchr(b'\n', buffer) {
        Some(newline) => &buffer[..newline],
        None => &buffer[..buffer.len().min(DECLARATION_WINDOW)],
    };
    let line = String::from_utf8_lossy(line);
    DOUBLE_QUOTED_ENCODING_REGEX
        .captures(&line)
        .or_else(|| SINGLE_QUOTED_ENCODING_REGEX.captures(&line))
        .and_then(|captures| captures.get(1))
        .map(|label| label.as_str().trim().to_string())
        .filter(|label| !label.is_empty())
}

fn strip_replacements(text: Cow<'_, str>) -> String {
    if text.contains(char::REPLACEMENT_CHARACTER) {
        text.chars().filter(|c| *c != char::REPLACEMENT_CHARACTER).collect()
    } else {
        text.into_owned()
    }
}

fn decode_utf32(bytes: &[u8], from_bytes: fn([u8; 4]) -> u32) -> String {
    bytes
        .chunks_exact(4)
        .filter_map(|unit| char::from_u32(from_bytes([unit[0], unit[1], unit[2], unit[3]])))
        .collect()
}
