use std::future::Future;
use std::sync::Arc;

use axum::extract::{OriginalUri, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use log::{debug, error, info};
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;

use crate::key::KeyPath;
use crate::{AdminService, Result};

/// Serves binary records under one key namespace as files.
///
/// `GET /<namespace>/a/b.png` returns the bytes stored at
/// `["<namespace>", "a", "b.png"]` with a content type guessed from `b.png`.
/// The adapter never writes.
pub struct FileServer {
    admin: Arc<AdminService>,
    namespace: String,
}

impl FileServer {
    pub fn new(admin: Arc<AdminService>, namespace: impl Into<String>) -> Self {
        Self {
            admin,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn router(self: Arc<Self>) -> axum::Router {
        axum::Router::new()
            .route(&format!("/{}/{{*path}}", self.namespace), get(serve_file))
            .with_state(self)
    }

    /// Binds `0.0.0.0:<port>` and serves until the process is stopped.
    pub async fn listen(self: Arc<Self>, port: &str) -> Result<()> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        info!("Serving /{}/ on port {}", self.namespace, port);
        self.serve(listener, std::future::pending()).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Maps a raw request path such as `/files/a%2Fb.png` to a key.
///
/// The path is split on `/` before percent-decoding, so an encoded slash
/// stays inside its segment. Returns `None` unless the first segment is
/// `namespace` and every segment is non-empty valid UTF-8.
pub fn file_key(namespace: &str, raw_path: &str) -> Option<KeyPath> {
    let raw_path = raw_path.strip_prefix('/').unwrap_or(raw_path);
    let segments = raw_path
        .split('/')
        .map(|raw| percent_decode_str(raw).decode_utf8().ok().map(|s| s.into_owned()))
        .collect::<Option<Vec<String>>>()?;
    if segments.len() < 2 || segments[0] != namespace {
        return None;
    }
    KeyPath::new(segments).ok()
}

/// Content type for the final path segment, falling back to `application/octet-stream`.
pub fn content_type(key: &KeyPath) -> String {
    key.last()
        .map(|name| mime_guess::from_path(name).first_or_octet_stream())
        .unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM)
        .to_string()
}

async fn serve_file(State(files): State<Arc<FileServer>>, OriginalUri(uri): OriginalUri) -> Response {
    let Some(key) = file_key(&files.namespace, uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match files.admin.get_binary(&key).await {
        Ok(Some(bytes)) => {
            debug!("GET {} -> {} bytes", key, bytes.len());
            ([(header::CONTENT_TYPE, content_type(&key))], bytes).into_response()
        }
        Ok(None) => {
            debug!("GET {} -> not found", key);
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            error!("Failed to read {}: {}", key, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_key_splits_request_path() {
        let key = file_key("files", "/files/img/avatar.png").unwrap();
        assert_eq!(key.segments(), ["files", "img", "avatar.png"]);
        assert_eq!(file_key("files", "/files/a.png").unwrap().segments(), ["files", "a.png"]);
    }

    #[test]
    fn test_file_key_decodes_each_segment_after_splitting() {
        let slash = file_key("files", "/files/a%2Fb.png").unwrap();
        assert_eq!(slash.segments(), ["files", "a/b.png"]);
        let nested = file_key("files", "/files/a/b.png").unwrap();
        assert_eq!(nested.segments(), ["files", "a", "b.png"]);
        assert_ne!(slash, nested);

        let spaced = file_key("files", "/files/my%20photo.jpg").unwrap();
        assert_eq!(spaced.segments(), ["files", "my photo.jpg"]);
    }

    #[test]
    fn test_file_key_rejects_bad_paths() {
        assert!(file_key("files", "/files").is_none());
        assert!(file_key("files", "/files/").is_none());
        assert!(file_key("files", "/files/a//b.png").is_none());
        assert!(file_key("files", "/files/dir/").is_none());
        assert!(file_key("files", "/other/a.png").is_none());
        assert!(file_key("files", "/files/%FF.png").is_none());
    }

    #[test]
    fn test_content_type_from_extension() {
        let png = file_key("files", "/files/avatar.png").unwrap();
        assert_eq!(content_type(&png), "image/png");
        let html = file_key("files", "/files/index.html").unwrap();
        assert_eq!(content_type(&html), "text/html");
        let unknown = file_key("files", "/files/blob").unwrap();
        assert_eq!(content_type(&unknown), "application/octet-stream");
    }
}
