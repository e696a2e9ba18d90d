//! Static mounts: the front-end bundle, its index page and the raw-data
//! directory.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::app::AppState;
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::status::Status;

/// Joins a request path onto `root`, refusing anything that could escape it.
pub(crate) fn resolve(root: &Path, rel: &str) -> Option<PathBuf> {
    let rel = Path::new(rel);
    let mut path = root.to_path_buf();
    let mut any = false;
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                any = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    any.then_some(path)
}

async fn serve_file(path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(body) => {
            let ct = path.extension()
                .and_then(|e| e.to_str())
                .map_or(ContentType::OctetStream, ContentType::from_extension);
            Response::builder().bytes(ct, body)
        }
        Err(e) => {
            debug!(path = %path.display(), "static file not served: {e}");
            Response::status(Status::NotFound)
        }
    }
}

async fn serve_under(root: &Path, req: &Request) -> Response {
    match req.param("path").and_then(|rel| resolve(root, rel)) {
        Some(path) => serve_file(&path).await,
        None => Response::status(Status::NotFound),
    }
}

/// `GET /`
pub async fn index(state: Arc<AppState>, _req: Request) -> Response {
    serve_file(&state.frontend_dir.join("index.html")).await
}

/// `GET /static/{*path}`
pub async fn frontend(state: Arc<AppState>, req: Request) -> Response {
    serve_under(&state.frontend_dir.join("static"), &req).await
}

/// `GET /data/{*path}`
pub async fn data(state: Arc<AppState>, req: Request) -> Response {
    serve_under(&state.data_dir, &req).await
}
