use std::collections::BTreeMap;
use std::path::Path;

pub const SERVER_HEADER: &str = "webserv/1.0";

#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Option<Vec<u8>>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new(200)
    }
}

impl HttpResponse {
    /// Every response starts with `Server` and `Connection: close`.
    pub fn new(status: u16) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Server".to_string(), SERVER_HEADER.to_string());
        headers.insert("Connection".to_string(), "close".to_string());
        Self { status, headers, body: None }
    }

    /// Shorthand for a `text/html` response carrying `body`.
    pub fn html(status: u16, body: impl Into<Vec<u8>>) -> Self {
        let mut response = Self::new(status);
        response.set_header("Content-Type", "text/html");
        response.set_body(body);
        response
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        self.headers.insert(key.to_string(), value.into());
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Sets the body and derives `Content-Length` from it.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        let body = body.into();
        self.headers.insert("Content-Length".to_string(), body.len().to_string());
        self.body = Some(body);
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Drops the body but keeps the headers, `Content-Length` included.
    pub fn strip_body(&mut self) {
        self.body = None;
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.body.as_ref().map_or(0, Vec::len));
        out.extend_from_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status, status_text(self.status)).as_bytes()
        );
        for (key, value) in &self.headers {
            out.extend_from_slice(format!("{}: {}\r\n", key, value).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }
}

pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        _ => "Unknown",
    }
}

/// MIME type by file extension; unknown or missing extensions are binary.
pub fn content_type(path: &Path) -> &'static str {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => {
            return "application/octet-stream";
        }
    };

    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
