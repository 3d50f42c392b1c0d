// Server module entry
// Listener setup, connection handling, accept loop and shutdown signals

mod connection;
mod listener;
mod signal;

// `loop` is a keyword, so the module is renamed
#[path = "loop.rs"]
mod server_loop;

pub use listener::create_listener;
pub use server_loop::{run, serve};
pub use signal::shutdown_signal;
