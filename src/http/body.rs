//! Response body types
//!
//! Every handler answers with `ResponseBody`. Small bodies are built with
//! `full`/`empty`; archives that are produced on a blocking thread reach the
//! connection through `channel`.

use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::{Body, Bytes, Frame};
use tokio::sync::mpsc;

pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

/// Body holding a complete buffer
pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Create a bounded pipe from a blocking writer into a response body.
/// At most `capacity` chunks wait in the pipe.
pub fn channel(capacity: usize) -> (ChannelWriter, ChannelBody) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelWriter { tx }, ChannelBody { rx })
}

/// Receiving half of `channel`, polled by hyper
pub struct ChannelBody {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.rx
            .poll_recv(cx)
            .map(|chunk| chunk.map(|res| res.map(Frame::data)))
    }
}

/// Sending half of `channel`.
///
/// Must only be used off the async runtime (e.g. inside `spawn_blocking`),
/// since each write blocks until the connection has room for the chunk.
pub struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl ChannelWriter {
    /// End the body with an error; hyper then aborts the connection
    /// instead of completing the response.
    pub fn abort(&self, err: io::Error) {
        // The receiver may already be gone, nothing left to notify then
        let _ = self.tx.blocking_send(Err(err));
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
