use crate::handlers::error_page::error_response;
use crate::http::response::content_type;
use crate::http::{ HttpRequest, HttpResponse };
use crate::server::router::Route;
use crate::utils::{ fs, join_paths };
use html_escape::{ encode_double_quoted_attribute, encode_text };
use log::{ debug, error, warn };
use std::io;
use std::path::Path;

/// GET and HEAD. With `include_body == false` files are sized from their
/// metadata and never read.
pub fn serve(route: &Route, request: &HttpRequest, include_body: bool) -> HttpResponse {
    let uri_path = request.path();
    let file_path = route.resolve_path(uri_path);
    let target = Path::new(&file_path);
    debug!("[Static] uri={} file={}", uri_path, file_path);

    if !fs::file_exists(target) {
        return not_found(route, uri_path);
    }

    if fs::is_directory(target) {
        if route.autoindex() {
            return match render_autoindex(target, uri_path) {
                Ok(body) => HttpResponse::html(200, body),
                Err(e) => {
                    warn!("[Static] cannot list {}: {}", file_path, e);
                    forbidden(route, uri_path)
                }
            };
        }

        let index_path = join_paths(&file_path, route.index());
        let index = Path::new(&index_path);
        if fs::file_exists(index) && !fs::is_directory(index) && fs::is_readable(index) {
            return send_file(route, index, include_body);
        }
        return forbidden(route, uri_path);
    }

    if !fs::is_readable(target) {
        return forbidden(route, uri_path);
    }
    send_file(route, target, include_body)
}

fn send_file(route: &Route, path: &Path, include_body: bool) -> HttpResponse {
    let mut response = HttpResponse::new(200);
    response.set_header("Content-Type", content_type(path));

    let result = if include_body {
        fs::read_file(path).map(|content| response.set_body(content))
    } else {
        fs::file_size(path).map(|size| response.set_header("Content-Length", size.to_string()))
    };

    match result {
        Ok(()) => response,
        Err(e) => {
            error!("[Static] failed to read {}: {}", path.display(), e);
            error_response(route.server, 500, "Error reading file")
        }
    }
}

/// HTML listing of `dir`; links are built relative to `uri`.
pub fn render_autoindex(dir: &Path, uri: &str) -> io::Result<String> {
    let names = fs::list_directory(dir)?;
    let base = if uri.ends_with('/') { uri.to_string() } else { format!("{}/", uri) };
    let title = encode_text(uri);

    let mut body = format!(
        "<html><head><title>Index of {0}</title></head><body><h1>Index of {0}</h1><ul>",
        title
    );
    for name in names {
        let suffix = if fs::is_directory(&dir.join(&name)) { "/" } else { "" };
        body.push_str(&format!(
            "<li><a href=\"{}{}{}\">{}{}</a></li>",
            encode_double_quoted_attribute(&base),
            urlencoding::encode(&name),
            suffix,
            encode_text(&name),
            suffix
        ));
    }
    body.push_str("</ul></body></html>");
    Ok(body)
}

fn not_found(route: &Route, uri: &str) -> HttpResponse {
    error_response(
        route.server,
        404,
        &format!("The requested URL {} was not found on this server.", uri)
    )
}

fn forbidden(route: &Route, uri: &str) -> HttpResponse {
    error_response(
        route.server,
        403,
        &format!("You don't have permission to access {} on this server.", uri)
    )
}
