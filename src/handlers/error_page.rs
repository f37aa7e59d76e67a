use crate::config::ServerConfig;
use crate::config::models::DEFAULT_ROOT;
use crate::http::HttpResponse;
use crate::http::response::{ content_type, status_text };
use crate::utils::{ fs, join_paths };
use html_escape::encode_text;
use log::warn;
use std::path::Path;

/// Error response for `status`, using the server's `error_page` when one is
/// configured and readable, else a generated page carrying `message`.
pub fn error_response(server: Option<&ServerConfig>, status: u16, message: &str) -> HttpResponse {
    if let Some(page) = server.and_then(|s| custom_page(s, status)) {
        return page;
    }

    let reason = status_text(status);
    let body = format!(
        "<html><head><title>{code} {reason}</title></head>\
         <body><h1>{code} {reason}</h1><p>{message}</p></body></html>",
        code = status,
        reason = reason,
        message = encode_text(message)
    );
    HttpResponse::html(status, body)
}

fn custom_page(server: &ServerConfig, status: u16) -> Option<HttpResponse> {
    let page = server.error_pages.get(&status)?;
    let root = if server.root.is_empty() { DEFAULT_ROOT } else { server.root.as_str() };
    let full_path = join_paths(root, page);

    match fs::read_file(Path::new(&full_path)) {
        Ok(content) => {
            let mut response = HttpResponse::new(status);
            response.set_header("Content-Type", content_type(Path::new(&full_path)));
            response.set_body(content);
            Some(response)
        }
        Err(e) => {
            warn!("[Config] error_page {} for {} could not be read: {}", full_path, status, e);
            None
        }
    }
}
