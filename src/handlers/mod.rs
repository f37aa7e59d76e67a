pub mod delete;
pub mod error_page;
pub mod static_files;
pub mod upload;

use crate::config::{ Redirect, ServerConfig };
use crate::http::{ HttpRequest, HttpResponse };
use crate::server::router::Route;
use html_escape::{ encode_double_quoted_attribute, encode_text };
use log::debug;

/// Routes a complete request and produces its response.
pub fn dispatch(servers: &[ServerConfig], request: &mut HttpRequest) -> HttpResponse {
    let route = Route::resolve(servers, request.header("host"), request.path());
    debug!(
        "[Router] host={:?} path={} server={:?} location={:?}",
        request.header("host"),
        request.path(),
        route.server.map(|s| s.server_name.as_str()),
        route.location.map(|l| l.path.as_str())
    );

    let mut response = match route.location.and_then(|l| l.redirect.as_ref()) {
        Some(redirect) => redirect_response(redirect),
        None => {
            match request.method.as_str() {
                "GET" => static_files::serve(&route, request, true),
                "HEAD" => static_files::serve(&route, request, false),
                "POST" => upload::handle_post(&route, request),
                "DELETE" => delete::handle_delete(&route, request),
                other => {
                    error_page::error_response(
                        route.server,
                        405,
                        &format!("Method {} is not supported", other)
                    )
                }
            }
        }
    };

    if request.method == "HEAD" {
        response.strip_body();
    }
    response
}

/// Response for a request whose body is still arriving, when the headers
/// already decide the outcome. Only a POST that `dispatch` would send to
/// the body size check qualifies; anything else waits for the full body.
pub fn reject_early(servers: &[ServerConfig], request: &HttpRequest) -> Option<HttpResponse> {
    if request.method != "POST" {
        return None;
    }
    let route = Route::resolve(servers, request.header("host"), request.path());
    if route.location.is_some_and(|l| l.redirect.is_some()) || !route.allows("POST") {
        return None;
    }
    upload::body_too_large(&route, request)
}

fn redirect_response(redirect: &Redirect) -> HttpResponse {
    let mut response = HttpResponse::html(
        redirect.status,
        format!(
            "<html><body>Moved to <a href=\"{}\">{}</a></body></html>",
            encode_double_quoted_attribute(&redirect.target),
            encode_text(&redirect.target)
        )
    );
    response.set_header("Location", redirect.target.clone());
    response
}
