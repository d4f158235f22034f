//! Mapping books to catalog shards.

use bookdesc_extract::Book;

/// Shard for books with no usable author.
pub const NO_AUTHOR: &str = "noauthor";
/// Shard for authors whose surname starts with something other than a letter.
pub const NON_ALPHABETIC: &str = "0";

/// Decides which shard a book is stored in.
///
/// Implementations must be deterministic: the same book always routes to
/// the same key, or it will be duplicated across shards on the next run.
/// Keys become file names, so they should be short and filesystem-safe.
pub trait ShardRouter {
    fn route(&self, book: &Book) -> String;
}

impl<F> ShardRouter for F
where
    F: Fn(&Book) -> String,
{
    fn route(&self, book: &Book) -> String {
        self(book)
    }
}

/// Routes by the lower-cased first letter of the first author's surname.
///
/// The surname is the last space-separated word of the first author that has
/// one. Latin and Cyrillic letters are keys in their own right; anything else
/// goes to [`NON_ALPHABETIC`], and books without authors to [`NO_AUTHOR`].
///
/// ```
/// use bookdesc_catalog::{AuthorInitial, ShardRouter};
/// use bookdesc_extract::Book;
///
/// let book = Book { authors: vec!["Arthur Conan Doyle".to_string()], ..Book::default() };
/// assert_eq!(AuthorInitial.route(&book), "d");
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthorInitial;

impl ShardRouter for AuthorInitial {
    fn route(&self, book: &Book) -> String {
        let Some(initial) = book
            .authors
            .iter()
            .filter_map(|author| author.split_whitespace().next_back())
            .find_map(|surname| surname.chars().next())
        else {
            return NO_AUTHOR.to_string();
        };
        let initial = initial.to_lowercase().next().unwrap_or(initial);
        if is_letter(initial) { initial.to_string() } else { NON_ALPHABETIC.to_string() }
    }
}

/// Letters from the Latin blocks (accented forms included) and Cyrillic.
fn is_letter(c: char) -> bool {
    matches!(c, '\u{0041}'..='\u{024F}' | '\u{1E00}'..='\u{1EFF}' | '\u{0400}'..='\u{04FF}') && c.is_alphabetic()
}
