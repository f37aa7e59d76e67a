use crate::handlers::error_page::error_response;
use crate::http::{ HttpRequest, HttpResponse };
use crate::server::router::Route;
use html_escape::encode_text;
use log::{ info, warn };
use std::path::Path;

pub fn handle_post(route: &Route, request: &mut HttpRequest) -> HttpResponse {
    if !route.allows("POST") {
        warn!("[Upload] POST not allowed on {}", request.path());
        let mut response = error_response(route.server, 405, "POST is not allowed for this location");
        if let Some(loc) = route.location {
            response.set_header("Allow", loc.methods.join(", "));
        }
        return response;
    }

    if let Some(response) = body_too_large(route, request) {
        return response;
    }

    request.decode_body(Path::new(route.upload_dir()));
    info!(
        "[Upload] path={} fields={} files={}",
        request.path(),
        request.form_fields.len(),
        request.uploaded_files.len()
    );

    HttpResponse::html(200, render_summary(request))
}

/// 413 when the declared (or received) body size is over the route's limit.
pub(crate) fn body_too_large(route: &Route, request: &HttpRequest) -> Option<HttpResponse> {
    let limit = route.body_limit()?;
    let declared = request.content_length().unwrap_or(request.body.len());
    if declared <= limit {
        return None;
    }
    warn!("[Upload] body of {} bytes exceeds limit {}", declared, limit);
    Some(
        error_response(
            route.server,
            413,
            &format!("Request body of {} bytes exceeds the {} byte limit", declared, limit)
        )
    )
}

fn render_summary(request: &HttpRequest) -> String {
    let mut body = String::from(
        "<html><head><title>POST received</title></head><body><h1>POST received</h1>"
    );

    body.push_str("<h2>Form fields</h2><ul>");
    for (key, value) in &request.form_fields {
        body.push_str(&format!("<li><b>{}</b>: {}</li>", encode_text(key), encode_text(value)));
    }
    body.push_str("</ul>");

    body.push_str("<h2>Uploaded files</h2><ul>");
    for (field, stored) in &request.uploaded_files {
        body.push_str(&format!("<li><b>{}</b>: {}</li>", encode_text(field), encode_text(stored)));
    }
    body.push_str("</ul></body></html>");
    body
}
