//! Request dispatch: mapping a parsed request to response content.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use http::{HeaderValue, Method, StatusCode};
use mime::Mime;
use tracing::debug;

use crate::server::ConnectionRecord;

/// Fills in the response of the exchange held by a [`ConnectionRecord`].
///
/// Invoked once per request by the connection's dispatch state. Errors of the
/// application are expressed through the response status.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, record: &mut ConnectionRecord);
}

/// A [`Dispatcher`] backed by a plain function.
#[derive(Debug)]
pub struct DispatcherFn<F> {
    f: F,
}

#[async_trait]
impl<F> Dispatcher for DispatcherFn<F>
where
    F: Fn(&mut ConnectionRecord) + Send + Sync,
{
    async fn dispatch(&self, record: &mut ConnectionRecord) {
        (self.f)(record);
    }
}

pub fn make_dispatcher<F>(f: F) -> DispatcherFn<F>
where
    F: Fn(&mut ConnectionRecord) + Send + Sync,
{
    DispatcherFn { f }
}

/// Serves files below a root directory, `GET` and `HEAD` only.
#[derive(Debug, Clone)]
pub struct FileDispatcher {
    root: PathBuf,
}

impl FileDispatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a request path below the root; `..` and absolute components are refused.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for component in Path::new(request_path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(path)
    }
}

#[async_trait]
impl Dispatcher for FileDispatcher {
    async fn dispatch(&self, record: &mut ConnectionRecord) {
        let Some(request) = record.request() else {
            record.set_status(StatusCode::BAD_REQUEST);
            return;
        };

        if request.method() != Method::GET && request.method() != Method::HEAD {
            record.set_status(StatusCode::METHOD_NOT_ALLOWED);
            return;
        }

        match self.resolve(request.uri().path()) {
            Some(path) => {
                debug!(path = %path.display(), "serve file");
                record.serve_file(path);
            }
            None => record.set_status(StatusCode::FORBIDDEN),
        }
    }
}

const OCTET_STREAM: &str = "application/octet-stream";

/// Content type of a file derived from its extension.
///
/// Unknown extensions map to `application/x-<ext>`, no extension to
/// `application/octet-stream`.
pub fn content_type_for(path: &Path) -> HeaderValue {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return HeaderValue::from_static(OCTET_STREAM);
    };

    let ext = ext.to_ascii_lowercase();
    let known: Option<Mime> = match ext.as_str() {
        "html" | "htm" => Some(mime::TEXT_HTML_UTF_8),
        "txt" => Some(mime::TEXT_PLAIN_UTF_8),
        "css" => Some(mime::TEXT_CSS_UTF_8),
        "js" => Some(mime::TEXT_JAVASCRIPT),
        "json" => Some(mime::APPLICATION_JSON),
        "png" => Some(mime::IMAGE_PNG),
        "jpg" | "jpeg" => Some(mime::IMAGE_JPEG),
        "gif" => Some(mime::IMAGE_GIF),
        "svg" => Some(mime::IMAGE_SVG),
        "pdf" => Some(mime::APPLICATION_PDF),
        _ => None,
    };

    match known {
        Some(mime) => HeaderValue::from_str(mime.as_ref()),
        None => HeaderValue::from_str(&format!("application/x-{ext}")),
    }
    .unwrap_or_else(|_e| HeaderValue::from_static(OCTET_STREAM))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type_for(Path::new("a.PNG")), "image/png");
        assert_eq!(content_type_for(Path::new("data.bin")), "application/x-bin");
        assert_eq!(content_type_for(Path::new("README")), "application/octet-stream");
    }

    #[test]
    fn resolve_stays_below_root() {
        let dispatcher = FileDispatcher::new("/srv/www");
        assert_eq!(dispatcher.resolve("/files/a.bin"), Some(PathBuf::from("/srv/www/files/a.bin")));
        assert_eq!(dispatcher.resolve("/./a.bin"), Some(PathBuf::from("/srv/www/a.bin")));
        assert_eq!(dispatcher.resolve("/../etc/passwd"), None);
    }
}
