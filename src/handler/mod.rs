//! Request handler module
//!
//! Responsible for request routing dispatch and the archive endpoint.

pub mod archive;
pub mod router;

// Re-export main entry point
pub use router::{handle_request, RequestContext};
