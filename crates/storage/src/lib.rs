//! Pluggable key-value stores for the catalog's per-shard indexes.
//!
//! Backends are picked by name from a [`BackendRegistry`]:
//!
//! | name     | persistence                                   |
//! |----------|-----------------------------------------------|
//! | `memory` | none                                          |
//! | `log`    | append-only checksummed log, compacted on close |
//! | `redb`   | redb B-tree database (`redb` feature)         |

pub mod backend;
pub mod error;
mod registry;

pub use crate::backend::Store;
pub use crate::registry::{BackendRegistry, Opener};
