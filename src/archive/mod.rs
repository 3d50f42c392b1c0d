//! Request-to-archive pipeline
//!
//! A request moves through two phases:
//! - prepare: parse the file list, resolve and stat every file (`plan`)
//! - commit: write the validated entries into a ZIP stream (`writer`)
//!
//! Only the commit phase produces archive bytes, so any failure in prepare is
//! reported before the response status is committed.

mod error;
pub mod plan;
mod request;
pub mod resolve;
pub mod writer;

pub use error::ArchiveError;
pub use plan::{ArchiveEntry, ArchivePlan};
pub use request::{FileRequest, FILES_PARAM};
pub use resolve::{resolve, ResolvedPath};
pub use writer::{build_in_memory, write_to_stream};
