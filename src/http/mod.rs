//! HTTP protocol layer module
//!
//! Provides response bodies and status builders, decoupled from the archive pipeline.

pub mod body;
pub mod response;

// Re-export commonly used types
pub use body::{channel, empty, full, ChannelBody, ChannelWriter, ResponseBody};
pub use response::{
    build_404_response, build_405_response, build_413_response, build_error_response,
    build_health_response, build_options_response, build_zip_response,
};
