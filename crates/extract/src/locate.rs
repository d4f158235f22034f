//! Locating the `<description>` element inside a raw, still-encoded buffer.
//!
//! Searching happens before decoding so that a multi-megabyte document only
//! ever has its metadata decoded, never its body.

use crate::encoding::TextEncoding;
use memchr::memmem;

const START_MARKER: &str = "<description";
const END_MARKER: &str = "</description>";

/// Byte range of the `<description>` element within a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    /// Exclusive; just past the end marker when `complete`, otherwise the end
    /// of the usable buffer
    pub end: usize,
    /// Whether the end marker was found
    pub complete: bool,
}
impl Span {
    pub fn slice<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        &buffer[self.start..self.end]
    }
}

/// Find the `<description` start marker and the matching `</description>`
/// end marker in `buffer`, both encoded as `encoding` would encode them.
///
/// Returns `None` if the start marker is not in this buffer. If the end
/// marker is missing, the span runs to the end of the buffer and is flagged
/// as incomplete; whoever parses it has to cope with truncated markup.
pub fn locate_description(buffer: &[u8], encoding: TextEncoding) -> Option<Span> {
    let unit = encoding.code_unit();
    let start_marker = encoding.encode_marker(START_MARKER);
    let start = find_aligned(buffer, &start_marker, 0, unit)?;

    let end_marker = encoding.encode_marker(END_MARKER);
    let search_from = start + start_marker.len();
    match find_aligned(buffer, &end_marker, search_from, unit) {
        Some(end) => Some(Span { start, end: end + end_marker.len(), complete: true }),
        None => {
            let end = buffer.len() - buffer.len() % unit;
            tracing::warn!(
                start,
                buffer_size = buffer.len(),
                "description element does not end within the read buffer, parsing a truncated fragment"
            );
            Some(Span { start, end, complete: false })
        },
    }
}

/// First occurrence of `needle` at or after `from` that sits on a code unit
/// boundary. Unaligned hits in wide encodings are bytes straddling two
/// characters, not the marker.
fn find_aligned(haystack: &[u8], needle: &[u8], from: usize, unit: usize) -> Option<usize> {
    let haystack = haystack.get(from..)?;
    memmem::find_iter(haystack, needle).map(|offset| offset + from).find(|position| position % unit == 0)
}
