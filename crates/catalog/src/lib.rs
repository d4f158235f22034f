//! Content-addressed catalog of FictionBook2 metadata, kept as CSV files.
//!
//! Books are split into shards by a [`ShardRouter`]. Each shard is a CSV file
//! that people read and grep, plus a [`ContentIndex`] that deduplicates books
//! by SHA-1 and remembers whether the CSV changed since it was written. The
//! CSV is the source of truth: an index can be deleted at any time and is
//! rebuilt from its CSV on the next run.
//!
//! ```no_run
//! use bookdesc_catalog::{Catalog, CatalogOptions};
//! use bookdesc_storage::BackendRegistry;
//! # fn books() -> Vec<bookdesc_extract::Book> { Vec::new() }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut catalog = Catalog::open("catalog/", CatalogOptions::default(), BackendRegistry::with_defaults())?;
//! for book in books() {
//!     catalog.put(&book)?;
//! }
//! catalog.build_all_csvs()?;
//! catalog.close()?;
//! # Ok(())
//! # }
//! ```

mod compression;
pub mod error;
mod index;
mod manager;
pub mod record;
mod shard;

pub use crate::compression::{Compression, Encoder};
pub use crate::index::{ContentIndex, MetaValue};
pub use crate::manager::{Catalog, CatalogOptions};
pub use crate::shard::{AuthorInitial, NO_AUTHOR, NON_ALPHABETIC, ShardRouter};
