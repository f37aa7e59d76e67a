use crate::config::models::{ DEFAULT_INDEX, DEFAULT_ROOT };
use crate::config::{ LocationConfig, ServerConfig };
use crate::http::request::DEFAULT_UPLOAD_DIR;
use crate::utils::{ join_paths, normalize_path };

/// The virtual server and location a request was matched to.
#[derive(Debug, Clone, Copy)]
pub struct Route<'a> {
    pub server: Option<&'a ServerConfig>,
    pub location: Option<&'a LocationConfig>,
}

impl<'a> Route<'a> {
    pub fn resolve(servers: &'a [ServerConfig], host: Option<&str>, path: &str) -> Self {
        let server = select_server(servers, host);
        let location = server.and_then(|s| find_location(path, s));
        Route { server, location }
    }

    /// Location root, else server root, else the process default.
    pub fn root(&self) -> &'a str {
        if let Some(loc) = self.location.filter(|l| !l.root.is_empty()) {
            return &loc.root;
        }
        match self.server.filter(|s| !s.root.is_empty()) {
            Some(server) => &server.root,
            None => DEFAULT_ROOT,
        }
    }

    pub fn autoindex(&self) -> bool {
        self.location.is_some_and(|l| l.autoindex)
    }

    pub fn index(&self) -> &'a str {
        match self.location.filter(|l| !l.index.is_empty()) {
            Some(loc) => &loc.index,
            None => DEFAULT_INDEX,
        }
    }

    pub fn allows(&self, method: &str) -> bool {
        self.location.is_none_or(|l| l.allows(method))
    }

    pub fn body_limit(&self) -> Option<usize> {
        match self.server {
            Some(server) => server.body_limit(self.location),
            None => self.location.map(|l| l.max_body_size).filter(|n| *n > 0),
        }
    }

    pub fn upload_dir(&self) -> &'a str {
        match self.location.filter(|l| !l.upload_dir.is_empty()) {
            Some(loc) => &loc.upload_dir,
            None => DEFAULT_UPLOAD_DIR,
        }
    }

    /// Filesystem target for a request path: the location prefix is
    /// replaced by the root, and a bare directory request maps to the
    /// index file unless autoindex is on.
    pub fn resolve_path(&self, uri_path: &str) -> String {
        let Some(location) = self.location else {
            return join_paths(self.root(), &normalize_path(&format!("/{}", uri_path)));
        };

        let mut relative = strip_location(uri_path, location);
        if (relative.is_empty() || relative == "/") && !location.autoindex {
            relative = format!("/{}", self.index());
        }
        join_paths(self.root(), &normalize_path(&relative))
    }

    /// Like `resolve_path` but never substitutes an index file.
    pub fn physical_path(&self, uri_path: &str) -> String {
        let relative = match self.location {
            Some(location) => strip_location(uri_path, location),
            None => uri_path.to_string(),
        };
        join_paths(self.root(), &normalize_path(&format!("/{}", relative)))
    }
}

/// Server whose `server_name` equals the Host header (port stripped),
/// falling back to the first configured server.
pub fn select_server<'a>(servers: &'a [ServerConfig], host: Option<&str>) -> Option<&'a ServerConfig> {
    if let Some(name) = host.map(strip_port) {
        if let Some(found) = servers.iter().find(|s| !s.server_name.is_empty() && s.server_name == name) {
            return Some(found);
        }
    }
    servers.first()
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Exact match first, then the longest prefix ending on a path boundary.
/// `/` only wins when nothing more specific matched.
pub fn find_location<'a>(path: &str, server: &'a ServerConfig) -> Option<&'a LocationConfig> {
    if let Some(exact) = server.locations.iter().find(|l| l.path == path) {
        return Some(exact);
    }

    let mut best: Option<&LocationConfig> = None;
    for loc in &server.locations {
        let candidate = &loc.path;
        if candidate == "/" {
            if best.is_none() {
                best = Some(loc);
            }
            continue;
        }
        if !path.starts_with(candidate.as_str()) {
            continue;
        }
        if !candidate.ends_with('/') && path.len() > candidate.len() && path.as_bytes()[candidate.len()] != b'/' {
            continue;
        }
        if best.is_none_or(|b| candidate.len() > b.path.len()) {
            best = Some(loc);
        }
    }
    best
}

/// Request path with the location prefix removed, always starting with `/`.
pub fn strip_location(uri_path: &str, location: &LocationConfig) -> String {
    if location.path == "/" {
        return uri_path.to_string();
    }
    let rest = uri_path.strip_prefix(location.path.as_str()).unwrap_or(uri_path);
    if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{}", rest)
    }
}
