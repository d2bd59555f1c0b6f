use crate::{logi, logw};
use anyhow::{Result, anyhow};
use percent_encoding::percent_decode_str;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tiny_http::{Header, Response, Server};

/// Throwaway local HTTP server so the renderer, which cannot read the local
/// filesystem directly, can fetch generated audio by URL. One instance per
/// run; the worker thread is torn down when the guard drops, including on
/// early-error paths.
pub struct FileServer {
    server: Arc<Server>,
    worker: Option<JoinHandle<()>>,
    root: PathBuf,
    port: u16,
}

impl FileServer {
    /// Bind `127.0.0.1:port` and serve `root` from a background thread.
    /// Port 0 picks a free port (used by tests).
    pub fn start(port: u16, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let root = root
            .canonicalize()
            .map_err(|e| anyhow!("Server root {} is not usable: {}", root.display(), e))?;

        let server = Server::http(("127.0.0.1", port))
            .map_err(|e| anyhow!("Failed to bind local server on port {}: {}", port, e))?;
        let server = Arc::new(server);
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(port);

        let worker_server = Arc::clone(&server);
        let worker_root = root.clone();
        let worker = std::thread::spawn(move || {
            for request in worker_server.incoming_requests() {
                serve_one(&worker_root, request);
            }
        });

        logi(format!("Local file server listening on http://localhost:{}", port));
        Ok(Self {
            server,
            worker: Some(worker),
            root,
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL under this server for a file inside the served root, with forward
    /// slashes regardless of platform. None if the path escapes the root.
    pub fn url_for(&self, path: &Path) -> Option<String> {
        let abs = path
            .canonicalize()
            .or_else(|_| std::path::absolute(path))
            .ok()?;
        let rel = pathdiff::diff_paths(&abs, &self.root)?;
        let mut segments = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_str()?.to_string()),
                _ => return None,
            }
        }
        Some(format!(
            "http://localhost:{}/{}",
            self.port,
            segments.join("/")
        ))
    }
}

impl Drop for FileServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        logi("Local file server stopped.");
    }
}

/// Map a request URL to a file under the root. Anything that is not a plain
/// GET of an existing file inside the root gets a 404.
fn resolve_request_path(root: &Path, url: &str) -> Option<PathBuf> {
    let path_part = url.split('?').next().unwrap_or(url);
    let decoded = percent_decode_str(path_part).decode_utf8().ok()?;

    let mut resolved = root.to_path_buf();
    for segment in decoded.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return None;
        }
        resolved.push(segment);
    }

    if resolved.is_file() { Some(resolved) } else { None }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn serve_one(root: &Path, request: tiny_http::Request) {
    let path = match resolve_request_path(root, request.url()) {
        Some(path) => path,
        None => {
            let _ = request.respond(Response::from_string("not found").with_status_code(404));
            return;
        }
    };

    match File::open(&path) {
        Ok(file) => {
            // Static, known-valid header bytes.
            let header = Header::from_bytes("Content-Type", content_type_for(&path)).unwrap();
            let _ = request.respond(Response::from_file(file).with_header(header));
        }
        Err(err) => {
            logw(format!("Failed to serve {}: {}", path.display(), err));
            let _ = request.respond(Response::from_string("read error").with_status_code(500));
        }
    }
}
