//! Multi-file ZIP download server
//!
//! Serves `GET /zip?files=a,b,c`: the named files under a configured base
//! directory are packed into one ZIP archive and returned as an attachment.

pub mod archive;
pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
