use crate::handlers::error_page::error_response;
use crate::http::{ HttpRequest, HttpResponse };
use crate::server::router::Route;
use crate::utils::{ fs, is_within };
use html_escape::encode_text;
use log::{ info, warn };
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    IsDirectory,
    Forbidden(&'static str),
    OsError(String),
}

impl DeleteOutcome {
    pub fn status(&self) -> u16 {
        match self {
            DeleteOutcome::Deleted => 200,
            DeleteOutcome::NotFound | DeleteOutcome::IsDirectory => 404,
            DeleteOutcome::Forbidden(_) => 403,
            DeleteOutcome::OsError(_) => 500,
        }
    }

    fn message(&self, uri: &str) -> String {
        match self {
            DeleteOutcome::Deleted => format!("{} deleted", uri),
            DeleteOutcome::NotFound => format!("{} not found", uri),
            DeleteOutcome::IsDirectory => format!("Cannot delete directory {}", uri),
            DeleteOutcome::Forbidden(reason) => format!("Access denied: {}", reason),
            DeleteOutcome::OsError(reason) => format!("Delete failed: {}", reason),
        }
    }
}

pub fn handle_delete(route: &Route, request: &HttpRequest) -> HttpResponse {
    let uri = request.path();
    if uri.contains('\0') || uri.contains("%00") {
        warn!("[Delete] null byte in {:?}", uri);
        return error_response(route.server, 400, "Request path contains a null byte");
    }

    let outcome = delete_target(route, uri);
    match &outcome {
        DeleteOutcome::Deleted => info!("[Delete] removed {}", uri),
        other => warn!("[Delete] {} refused: {:?}", uri, other),
    }

    let title = if outcome == DeleteOutcome::Deleted { "Deleted" } else { "Delete failed" };
    let body = format!(
        "<html><head><title>{0}</title></head><body><h1>{0}</h1><p>{1}</p></body></html>",
        title,
        encode_text(&outcome.message(uri))
    );
    HttpResponse::html(outcome.status(), body)
}

/// Removes the file `uri` maps to. Method and traversal checks run before
/// the filesystem is touched.
pub fn delete_target(route: &Route, uri: &str) -> DeleteOutcome {
    if !route.allows("DELETE") {
        return DeleteOutcome::Forbidden("method not allowed");
    }
    if uri.contains("..") || uri.contains("//") || uri.contains("./") {
        return DeleteOutcome::Forbidden("path traversal");
    }

    let root = route.root();
    let physical = route.physical_path(uri);
    if !is_within(root, &physical) {
        return DeleteOutcome::Forbidden("outside document root");
    }

    let target = Path::new(&physical);
    if !fs::file_exists(target) {
        return DeleteOutcome::NotFound;
    }
    if fs::is_directory(target) {
        return DeleteOutcome::IsDirectory;
    }
    if !fs::is_readable(target) {
        return DeleteOutcome::Forbidden("access denied");
    }

    match std::fs::remove_file(target) {
        Ok(()) => DeleteOutcome::Deleted,
        Err(e) if e.kind() == io::ErrorKind::NotFound => DeleteOutcome::NotFound,
        Err(e) => DeleteOutcome::OsError(e.to_string()),
    }
}
