use crate::http::form;
use std::collections::{ BTreeMap, HashMap };
use std::path::Path;

/// Where `HttpRequest::parse` stores uploaded files.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Header sections larger than this without a terminator are rejected.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("incomplete request: missing end of headers")]
    Incomplete,
    #[error("invalid request line")]
    InvalidRequestLine,
    #[error("invalid HTTP version: {0}")]
    InvalidVersion(String),
    #[error("invalid header format: {0}")]
    InvalidHeader(String),
    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),
    #[error("request headers exceed {max} bytes", max = MAX_HEADER_BYTES)]
    HeadersTooLarge,
}

#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub uri: String,
    pub version: String,
    /// Lower-cased names; the last duplicate wins.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub complete: bool,
    pub form_fields: BTreeMap<String, String>,
    /// Field name -> stored file path.
    pub uploaded_files: BTreeMap<String, String>,
    body_decoded: bool,
}

impl HttpRequest {
    /// Parses a raw buffer and, for a complete POST, decodes its body,
    /// storing uploaded files under `DEFAULT_UPLOAD_DIR`.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let mut request = Self::parse_message(raw)?;
        if request.method == "POST" && request.complete {
            request.decode_body(Path::new(DEFAULT_UPLOAD_DIR));
        }
        Ok(request)
    }

    /// Framing only: request line, headers, body bytes and completeness.
    /// The body is left undecoded so the caller can pick the upload directory.
    pub fn parse_message(raw: &[u8]) -> Result<Self, ParseError> {
        let header_end = match find_bytes(raw, b"\r\n\r\n", 0) {
            Some(pos) => pos,
            None => {
                if raw.len() > MAX_HEADER_BYTES {
                    return Err(ParseError::HeadersTooLarge);
                }
                return Err(ParseError::Incomplete);
            }
        };

        let head = String::from_utf8_lossy(&raw[..header_end]);
        let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        let [method, uri, version] = parts[..] else {
            return Err(ParseError::InvalidRequestLine);
        };
        if !version.starts_with("HTTP/") {
            return Err(ParseError::InvalidVersion(version.to_string()));
        }

        let mut headers = HashMap::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))?;
            headers.insert(key.trim().to_ascii_lowercase(), trim_header_value(value).to_string());
        }

        let body = raw[header_end + 4..].to_vec();
        let complete = match headers.get("content-length") {
            Some(raw_len) => {
                let expected = raw_len
                    .parse::<usize>()
                    .map_err(|_| ParseError::InvalidContentLength(raw_len.clone()))?;
                body.len() >= expected
            }
            None => true,
        };

        Ok(HttpRequest {
            method: method.to_string(),
            uri: uri.to_string(),
            version: version.to_string(),
            headers,
            body,
            complete,
            ..HttpRequest::default()
        })
    }

    /// Fills `form_fields` / `uploaded_files` from the body. Runs at most once.
    pub fn decode_body(&mut self, upload_dir: &Path) {
        if self.body_decoded {
            return;
        }
        self.body_decoded = true;

        let content_type = self.header("content-type").unwrap_or("").to_string();
        if content_type.contains("multipart/form-data") {
            let parts = form::parse_multipart(&content_type, &self.body, upload_dir);
            self.form_fields = parts.fields;
            self.uploaded_files = parts.files;
        } else {
            self.form_fields = form::parse_urlencoded(&self.body);
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }

    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(self.uri.as_str(), |(path, _)| path)
    }

    pub fn query_string(&self) -> &str {
        self.uri.split_once('?').map_or("", |(_, query)| query)
    }

    /// Query parameters as sent. Unlike form bodies these are not percent-decoded.
    pub fn query_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        for pair in self.query_string().split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((k, v)) => params.insert(k.to_string(), v.to_string()),
                None => params.insert(pair.to_string(), String::new()),
            };
        }
        params
    }
}

fn trim_header_value(value: &str) -> &str {
    value.trim_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .get(start..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_get() {
        let req = HttpRequest::parse(b"GET /a?x=1 HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path(), "/a");
        assert_eq!(req.query_string(), "x=1");
        assert_eq!(req.query_params().get("x").map(String::as_str), Some("1"));
        assert_eq!(req.header("Host"), Some("h"));
        assert!(req.complete);
        assert!(req.body.is_empty());
    }

    #[test]
    fn missing_terminator_is_incomplete() {
        let err = HttpRequest::parse(b"GET / HTTP/1.1\r\nHost: h\r\n").unwrap_err();
        assert_eq!(err, ParseError::Incomplete);
        assert!(err.to_string().contains("incomplete"));
    }

    #[test]
    fn oversized_head_without_terminator_is_rejected() {
        let raw = vec![b'a'; MAX_HEADER_BYTES + 1];
        assert_eq!(HttpRequest::parse_message(&raw).unwrap_err(), ParseError::HeadersTooLarge);
    }

    #[test]
    fn rejects_malformed_request_lines() {
        assert_eq!(HttpRequest::parse(b"GET /\r\n\r\n").unwrap_err(), ParseError::InvalidRequestLine);
        assert_eq!(HttpRequest::parse(b"\r\n\r\n").unwrap_err(), ParseError::InvalidRequestLine);
        assert!(matches!(
            HttpRequest::parse(b"GET / FTP/1.0\r\n\r\n").unwrap_err(),
            ParseError::InvalidVersion(_)
        ));
        assert!(matches!(
            HttpRequest::parse(b"GET / HTTP/1.1\r\nBroken header\r\n\r\n").unwrap_err(),
            ParseError::InvalidHeader(_)
        ));
    }

    #[test]
    fn headers_are_lowercased_trimmed_last_wins() {
        let raw = b"GET / HTTP/1.1\r\nX-Thing:  one \t\r\nx-thing: two\r\n\r\n";
        let req = HttpRequest::parse(raw).unwrap();
        assert_eq!(req.headers.get("x-thing").map(String::as_str), Some("two"));
        assert_eq!(req.header("X-THING"), Some("two"));
    }

    #[test]
    fn content_length_drives_completeness() {
        let partial = HttpRequest::parse(b"POST /f HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc").unwrap();
        assert!(!partial.complete);
        assert!(partial.form_fields.is_empty());

        let full = HttpRequest::parse(b"POST /f HTTP/1.1\r\nContent-Length: 3\r\n\r\na=1").unwrap();
        assert!(full.complete);
        assert_eq!(full.body, b"a=1");
        assert_eq!(full.form_fields.get("a").map(String::as_str), Some("1"));

        let bad = HttpRequest::parse(b"POST /f HTTP/1.1\r\nContent-Length: -4\r\n\r\n").unwrap_err();
        assert!(matches!(bad, ParseError::InvalidContentLength(_)));
    }

    #[test]
    fn query_params_keep_raw_encoding() {
        let req = HttpRequest::parse(b"GET /s?q=a%20b&flag&&k=v=w HTTP/1.1\r\n\r\n").unwrap();
        let params = req.query_params();
        assert_eq!(params.get("q").map(String::as_str), Some("a%20b"));
        assert_eq!(params.get("flag").map(String::as_str), Some(""));
        assert_eq!(params.get("k").map(String::as_str), Some("v=w"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn uri_without_query() {
        let req = HttpRequest::parse_message(b"DELETE /x/y HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(req.path(), "/x/y");
        assert_eq!(req.query_string(), "");
        assert!(req.query_params().is_empty());
    }
}
