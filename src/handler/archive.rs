//! Archive endpoint
//!
//! `GET /zip?files=a.txt,b.txt` answers with a ZIP of the named files. The
//! prepare phase runs to completion before any response head is built, so
//! a missing or unreadable file is always reported with an error status.

use std::io::{self, BufWriter};
use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::{Response, StatusCode};
use tokio::task::JoinError;

use crate::archive::{self, ArchiveError, ArchivePlan, FileRequest};
use crate::config::{AppState, ArchiveStrategy, Compression};
use crate::handler::router::RequestContext;
use crate::http::{self, ChannelWriter, ResponseBody};
use crate::logger;

/// Serve the archive endpoint
pub async fn serve_archive(
    ctx: &RequestContext<'_>,
    state: &Arc<AppState>,
) -> Response<ResponseBody> {
    let request = match FileRequest::from_query(ctx.query) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    let plan = match prepare(request, state).await {
        Ok(plan) => plan,
        Err(resp) => return resp,
    };
    logger::log_debug(&format!(
        "Prepared archive with {} entries ({} bytes uncompressed)",
        plan.len(),
        plan.total_size()
    ));

    let config = &state.config.archive;
    if ctx.is_head {
        return http::build_zip_response(http::empty(), &config.download_name, None);
    }

    match config.strategy {
        ArchiveStrategy::Buffered => send_buffered(plan, state).await,
        ArchiveStrategy::Streaming => send_streaming(plan, state),
    }
}

async fn prepare(
    request: FileRequest,
    state: &Arc<AppState>,
) -> Result<ArchivePlan, Response<ResponseBody>> {
    let base_dir = state.base_dir.clone();
    let naming = state.config.archive.entry_names;

    match tokio::task::spawn_blocking(move || ArchivePlan::prepare(&base_dir, &request, naming))
        .await
    {
        Ok(Ok(plan)) => Ok(plan),
        Ok(Err(e)) => Err(error_response(&e)),
        Err(e) => Err(join_error_response(&e)),
    }
}

/// Build the whole archive, then answer with a `Content-Length`
async fn send_buffered(plan: ArchivePlan, state: &Arc<AppState>) -> Response<ResponseBody> {
    let compression = state.config.archive.compression;

    match tokio::task::spawn_blocking(move || archive::build_in_memory(&plan, compression)).await {
        Ok(Ok(bytes)) => {
            let len = bytes.len() as u64;
            http::build_zip_response(
                http::full(bytes),
                &state.config.archive.download_name,
                Some(len),
            )
        }
        Ok(Err(e)) => error_response(&e),
        Err(e) => join_error_response(&e),
    }
}

/// Answer immediately and let a blocking task feed the body
fn send_streaming(plan: ArchivePlan, state: &Arc<AppState>) -> Response<ResponseBody> {
    let config = &state.config.archive;
    let (writer, body) = http::channel(config.channel_capacity);
    let compression = config.compression;
    let chunk_size = config.chunk_size.max(1);

    tokio::task::spawn_blocking(move || {
        let _ = stream_archive(&plan, compression, writer, chunk_size);
    });

    http::build_zip_response(body.boxed_unsync(), &config.download_name, None)
}

/// Write the archive into the body. A failure is logged and, unless the
/// client is already gone, ends the body with an error.
fn stream_archive(
    plan: &ArchivePlan,
    compression: Compression,
    writer: ChannelWriter,
    chunk_size: usize,
) -> Result<(), ArchiveError> {
    let mut sink = BufWriter::with_capacity(chunk_size, writer);
    let Err(e) = archive::write_to_stream(plan, compression, &mut sink) else {
        return Ok(());
    };

    if is_disconnect(&e) {
        logger::log_warning("Client disconnected while the archive was streaming");
        return Err(e);
    }

    let message = describe(&e);
    logger::log_error(&format!("Archive stream aborted: {message}"));
    // Unsent bytes are dropped; the body ends with an error instead
    let (writer, _unsent) = sink.into_parts();
    writer.abort(io::Error::other(message));
    Err(e)
}

fn is_disconnect(err: &ArchiveError) -> bool {
    let source = match err {
        ArchiveError::Write { source, .. } | ArchiveError::Finalize(source) => source,
        _ => return false,
    };
    matches!(source, zip::result::ZipError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
}

fn error_response(err: &ArchiveError) -> Response<ResponseBody> {
    if err.is_client_error() {
        logger::log_warning(&format!("Rejected archive request: {err}"));
    } else {
        logger::log_error(&describe(err));
    }
    http::build_error_response(err.status(), &err.to_string())
}

fn join_error_response(err: &JoinError) -> Response<ResponseBody> {
    logger::log_error(&format!("Archive task failed: {err}"));
    http::build_error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

/// Error message followed by its source chain
fn describe(err: &ArchiveError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EntryNaming};
    use std::io::{Cursor, Read};

    fn state(dir: &tempfile::TempDir, strategy: ArchiveStrategy) -> Arc<AppState> {
        let mut config = Config::default();
        config.archive.base_dir = dir.path().join("base").display().to_string();
        config.archive.strategy = strategy;
        config.logging.access_log = false;
        Arc::new(AppState::new(config).unwrap())
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base");
        std::fs::create_dir_all(base.join("docs")).unwrap();
        std::fs::write(base.join("a.txt"), "hello").unwrap();
        std::fs::write(base.join("b.txt"), "world").unwrap();
        std::fs::write(base.join("docs/c.txt"), "nested").unwrap();
        std::fs::write(dir.path().join("secret.txt"), "top secret").unwrap();
        dir
    }

    async fn get(state: &Arc<AppState>, query: Option<&str>) -> (StatusCode, Vec<u8>) {
        let ctx = RequestContext {
            path: "/zip",
            query,
            is_head: false,
        };
        let resp = serve_archive(&ctx, state).await;
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    fn entries(bytes: Vec<u8>) -> Vec<(String, String)> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut file = zip.by_index(i).unwrap();
                let mut content = String::new();
                file.read_to_string(&mut content).unwrap();
                (file.name().unwrap().into_owned(), content)
            })
            .collect()
    }

    const BOTH: [ArchiveStrategy; 2] = [ArchiveStrategy::Buffered, ArchiveStrategy::Streaming];

    #[tokio::test]
    async fn test_two_files_in_request_order() {
        let dir = fixture();
        for strategy in BOTH {
            let (status, body) = get(&state(&dir, strategy), Some("files=a.txt,b.txt")).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(
                entries(body),
                vec![
                    ("a.txt".to_string(), "hello".to_string()),
                    ("b.txt".to_string(), "world".to_string()),
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_missing_or_empty_files_param() {
        let dir = fixture();
        let state = state(&dir, ArchiveStrategy::Streaming);
        for query in [None, Some("files="), Some("other=1")] {
            let (status, body) = get(&state, query).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, b"No files specified");
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_500_with_no_archive_bytes() {
        let dir = fixture();
        // The streaming strategy answers 500 too: nothing is sent before every file checks out
        for strategy in BOTH {
            let state = state(&dir, strategy);
            let (status, body) = get(&state, Some("files=a.txt,missing.txt,b.txt")).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            let text = String::from_utf8(body).unwrap();
            assert!(text.contains("missing.txt"), "body: {text}");
            assert!(!text.starts_with("PK"));
        }
    }

    #[tokio::test]
    async fn test_single_missing_file_names_it() {
        let dir = fixture();
        let state = state(&dir, ArchiveStrategy::Buffered);
        let (status, body) = get(&state, Some("files=missing.txt")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, b"Failed to open file: missing.txt");
    }

    #[tokio::test]
    async fn test_duplicate_name_fails_on_second_occurrence() {
        let dir = fixture();
        let state = state(&dir, ArchiveStrategy::Streaming);
        let (status, body) = get(&state, Some("files=a.txt,a.txt")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, b"Duplicate archive entry: a.txt");
    }

    #[tokio::test]
    async fn test_parent_traversal_is_rejected() {
        let dir = fixture();
        for query in ["files=../secret.txt", "files=a.txt,..%2Fsecret.txt"] {
            let (status, body) = get(&state(&dir, ArchiveStrategy::Buffered), Some(query)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            let text = String::from_utf8(body).unwrap();
            assert!(text.contains("../secret.txt"), "body: {text}");
            assert!(!text.contains("top secret"));
        }
    }

    #[tokio::test]
    async fn test_nested_names_keep_relative_path() {
        let dir = fixture();
        let state = state(&dir, ArchiveStrategy::Streaming);
        let (status, body) = get(&state, Some("files=docs/c.txt")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            entries(body),
            vec![("docs/c.txt".to_string(), "nested".to_string())]
        );
    }

    #[tokio::test]
    async fn test_base_name_convention() {
        let dir = fixture();
        let mut config = Config::default();
        config.archive.base_dir = dir.path().join("base").display().to_string();
        config.archive.entry_names = EntryNaming::BaseName;
        let state = Arc::new(AppState::new(config).unwrap());

        let (status, body) = get(&state, Some("files=docs/c.txt")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            entries(body),
            vec![("c.txt".to_string(), "nested".to_string())]
        );
    }

    #[tokio::test]
    async fn test_buffered_sets_content_length() {
        let dir = fixture();
        let state = state(&dir, ArchiveStrategy::Buffered);
        let ctx = RequestContext {
            path: "/zip",
            query: Some("files=a.txt"),
            is_head: false,
        };
        let resp = serve_archive(&ctx, &state).await;
        let len: usize = resp.headers()[hyper::header::CONTENT_LENGTH]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.len(), len);
    }

    #[tokio::test]
    async fn test_head_validates_without_body() {
        let dir = fixture();
        let state = state(&dir, ArchiveStrategy::Streaming);

        let ctx = RequestContext {
            path: "/zip",
            query: Some("files=a.txt"),
            is_head: true,
        };
        let resp = serve_archive(&ctx, &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[hyper::header::CONTENT_TYPE],
            "application/zip"
        );
        assert!(resp.into_body().collect().await.unwrap().to_bytes().is_empty());

        let ctx = RequestContext {
            path: "/zip",
            query: Some("files=missing.txt"),
            is_head: true,
        };
        let resp = serve_archive(&ctx, &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    fn prepared(dir: &tempfile::TempDir, files: &str) -> ArchivePlan {
        let base = dir.path().join("base").canonicalize().unwrap();
        let request = FileRequest::parse(files).unwrap();
        ArchivePlan::prepare(&base, &request, EntryNaming::Relative).unwrap()
    }

    #[tokio::test]
    async fn test_file_vanishing_mid_stream_fails_the_body() {
        let dir = fixture();
        let plan = prepared(&dir, "a.txt,b.txt");
        std::fs::remove_file(dir.path().join("base/b.txt")).unwrap();

        let (writer, body) = http::channel(4);
        let task = tokio::task::spawn_blocking(move || {
            stream_archive(&plan, Compression::Stored, writer, 16)
        });

        assert!(body.collect().await.is_err());
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ArchiveError::FileAccess { ref name, .. } if name == "b.txt"));
    }

    #[tokio::test]
    async fn test_dropped_body_stops_the_writer() {
        let dir = fixture();
        let big: Vec<u8> = (0..100_000u32).flat_map(u32::to_le_bytes).collect();
        std::fs::write(dir.path().join("base/big.bin"), &big).unwrap();
        let plan = prepared(&dir, "big.bin");

        let (writer, body) = http::channel(1);
        drop(body);
        let err = tokio::task::spawn_blocking(move || {
            stream_archive(&plan, Compression::Stored, writer, 1024)
        })
        .await
        .unwrap()
        .unwrap_err();
        assert!(is_disconnect(&err), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_complete_stream_reads_back() {
        let dir = fixture();
        let plan = prepared(&dir, "a.txt,docs/c.txt");

        let (writer, body) = http::channel(2);
        let task = tokio::task::spawn_blocking(move || {
            stream_archive(&plan, Compression::Deflated, writer, 8)
        });

        let bytes = body.collect().await.unwrap().to_bytes();
        task.await.unwrap().unwrap();
        assert_eq!(
            entries(bytes.to_vec()),
            vec![
                ("a.txt".to_string(), "hello".to_string()),
                ("docs/c.txt".to_string(), "nested".to_string()),
            ]
        );
    }

    #[test]
    fn test_disconnect_detection() {
        let gone = ArchiveError::write("a.txt", io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(is_disconnect(&gone));
        let missing = ArchiveError::write("a.txt", io::Error::from(io::ErrorKind::NotFound));
        assert!(!is_disconnect(&missing));
        assert!(!is_disconnect(&ArchiveError::NoFiles));
    }

    #[test]
    fn test_describe_includes_source() {
        let err = ArchiveError::write("a.txt", io::Error::other("disk on fire"));
        let text = describe(&err);
        assert!(text.starts_with("Failed to write file to zip: a.txt"));
        assert!(text.ends_with("disk on fire"));
    }
}
