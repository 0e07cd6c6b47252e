//! Static file server for the publish directory.
//!
//! Serves files as they are on disk, `index.html` for directories, and a
//! plain-text 404 for everything else. Requests are handled one at a time.

use anyhow::Result;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_HOST: &str = "0.0.0.0";

const NOT_FOUND_BODY: &str = "404 Not Found";
const TEXT_PLAIN: &str = "text/plain; charset=UTF-8";
const TEXT_HTML: &str = "text/html; charset=UTF-8";

/// What a request path maps to inside the served root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    File { path: PathBuf, content_type: &'static str },
    NotFound,
}

/// Content type by extension. Matching is exact, so `.JSON` is served as bytes.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" => TEXT_HTML,
        "css" => "text/css; charset=UTF-8",
        "js" => "text/javascript; charset=UTF-8",
        "json" => "application/json; charset=UTF-8",
        "txt" | "md5" => TEXT_PLAIN,
        "jar" => "application/java-archive",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Maps a raw request target such as `/channel1/api.json?x=1` onto `root`.
pub fn resolve_request(root: &Path, url: &str) -> Resolved {
    let raw_path = url.split_once('?').map_or(url, |(path, _)| path);
    let decoded = match urlencoding::decode(raw_path) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(url, error = %e, "Request path is not valid UTF-8 after decoding");
            return Resolved::NotFound;
        }
    };

    let mut target = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            // `..`, a drive prefix or a second root would leave the served tree
            _ => {
                warn!(url, "Rejecting request path outside the served directory");
                return Resolved::NotFound;
            }
        }
    }

    if target.is_dir() {
        let index = target.join("index.html");
        return if index.is_file() {
            Resolved::File {
                path: index,
                content_type: TEXT_HTML,
            }
        } else {
            Resolved::NotFound
        };
    }
    if target.is_file() {
        let content_type = content_type_for(&target);
        return Resolved::File {
            path: target,
            content_type,
        };
    }
    Resolved::NotFound
}

fn content_type_header(content_type: &str) -> Option<Header> {
    Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()).ok()
}

fn not_found(request: Request, method: &str, url: &str) {
    let mut response =
        Response::from_data(NOT_FOUND_BODY.as_bytes().to_vec()).with_status_code(StatusCode(404));
    if let Some(header) = content_type_header(TEXT_PLAIN) {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        warn!(method, url, error = %e, "Failed to send 404 response");
    }
}

/// Answers one request from `root`.
pub fn handle_request(root: &Path, request: Request) {
    let method = request.method().to_string();
    let url = request.url().to_string();
    info!("{} {}", method, url);

    let (path, content_type) = match resolve_request(root, &url) {
        Resolved::File { path, content_type } => (path, content_type),
        Resolved::NotFound => return not_found(request, &method, &url),
    };
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Resolved file could not be opened");
            return not_found(request, &method, &url);
        }
    };

    let mut response = Response::from_file(file);
    if let Some(header) = content_type_header(content_type) {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        warn!(method = %method, url = %url, error = %e, "Failed to send response");
    }
}

/// Binds `host:port`. Port 0 picks a free port.
pub fn bind(host: &str, port: u16) -> Result<Server> {
    let addr = format!("{}:{}", host, port);
    Server::http(&addr).map_err(|e| anyhow::anyhow!("Failed to start server on {addr}: {e}"))
}

/// Serves `root` until the process is stopped.
pub fn serve(root: &Path, host: &str, port: u16) -> Result<()> {
    let server = bind(host, port)?;
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    info!(
        address = %format!("http://{host}:{port}/"),
        root = %root.display(),
        "Static server running"
    );
    for request in server.incoming_requests() {
        handle_request(&root, request);
    }
    Ok(())
}
