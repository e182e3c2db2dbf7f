//! Serving static files from a directory.

use crate::error::HttpError;
use crate::handler::Output;
use crate::reply::Reply;

use hyper::header::{self, HeaderValue};
use hyper::{Method, StatusCode};
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

/// A handler serving files below a root directory.
///
/// Registered on a catch-all template such as `/static/*`, the captured tail
/// is resolved below the root. Directories resolve to their index file. Paths
/// that would leave the root are answered with `404 Not Found`.
#[derive(Debug, Clone)]
pub struct Resource {
    root: PathBuf,
    index: String,
}

impl Resource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: "index.html".to_owned(),
        }
    }

    /// The file served for directory requests. Defaults to `index.html`.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a request tail to a path below the root.
    fn resolve(&self, tail: &str) -> Option<PathBuf> {
        let relative = Path::new(tail);
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(resolved)
    }

    /// Reads the file for `tail` into `reply`.
    ///
    /// While the reply may be cached, the file carries an `ETag` built from
    /// its length and modification time, and a matching `If-None-Match` is
    /// answered with `304 Not Modified`.
    pub(crate) async fn serve(
        &self,
        method: &Method,
        tail: &str,
        if_none_match: Option<&HeaderValue>,
        mut reply: Reply,
    ) -> Result<Output, HttpError> {
        if tail.contains('\0') || tail.contains('\\') {
            return Err(HttpError::not_found());
        }
        let mut path = self.resolve(tail).ok_or_else(HttpError::not_found)?;

        let mut meta = tokio::fs::metadata(&path).await?;
        if meta.is_dir() {
            path.push(&self.index);
            meta = tokio::fs::metadata(&path).await?;
        }

        if reply.cache() {
            if let Some(tag) = etag(&meta) {
                let fresh = if_none_match.map_or(false, |header| matches_etag(header, &tag));
                if let Ok(value) = HeaderValue::from_str(&tag) {
                    reply.set_header(header::ETAG, value);
                }
                if fresh {
                    tracing::debug!(file = %path.display(), etag = %tag, "resource not modified");
                    reply.set_status(StatusCode::NOT_MODIFIED);
                    return Ok(reply.empty());
                }
            }
        }

        let body = tokio::fs::read(&path).await?;

        tracing::debug!(file = %path.display(), len = body.len(), "serving resource");

        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        if reply.content_type().is_none() {
            if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
                reply.set_content_type(value);
            }
        }
        reply.set_header(header::CONTENT_LENGTH, HeaderValue::from(body.len()));

        if method == Method::HEAD {
            Ok(reply.empty())
        } else {
            Ok(reply.send(body))
        }
    }
}

/// A strong entity tag from the file length and modification time.
fn etag(meta: &Metadata) -> Option<String> {
    let modified = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
    Some(format!("\"{:x}-{:x}\"", meta.len(), modified.as_millis()))
}

/// Whether an `If-None-Match` list names `tag`, or is `*`.
fn matches_etag(header: &HeaderValue, tag: &str) -> bool {
    header.to_str().map_or(false, |list| {
        list.split(',')
            .map(str::trim)
            .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == tag)
    })
}
