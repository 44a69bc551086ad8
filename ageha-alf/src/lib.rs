//! ALF archive engine: index files (`SYS4INI.BIN`, `SYS5INI.BIN`,
//! `APPEND??.AAI`) that cross-reference one or more `DATA*.ALF` container
//! files. Supports the S4 and S5 layouts, compressed and uncompressed
//! variants, extraction, repacking, and appending a new container.

mod error;
mod read;
mod types;
mod write;

pub use error::ArchiveError;
pub use read::{parse_index, ExtractOptions};
pub use types::{Archive, ArchiveSource, FileEntry, IndexHeader, Version};
pub use write::{add_archive, repack};
