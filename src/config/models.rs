use std::collections::{ BTreeMap, HashMap };
use std::fmt;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_INDEX: &str = "index.html";
pub const DEFAULT_ROOT: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenEndpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for ListenEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub status: u16,
    pub target: String,
}

#[derive(Debug, Clone, Default)]
pub struct LocationConfig {
    pub path: String,
    pub root: String,
    pub index: String,
    pub autoindex: bool,
    /// Empty means every method is allowed.
    pub methods: Vec<String>,
    pub upload_dir: String,
    /// `cgi_pass` entries, extension -> interpreter. Parsed, never executed.
    pub cgi: BTreeMap<String, String>,
    pub redirect: Option<Redirect>,
    /// 0 inherits the server's limit.
    pub max_body_size: usize,
}

impl LocationConfig {
    pub fn allows(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m == method)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub listen: Vec<ListenEndpoint>,
    pub server_name: String,
    pub root: String,
    pub error_pages: HashMap<u16, String>,
    /// 0 means unbounded.
    pub client_max_body_size: usize,
    pub locations: Vec<LocationConfig>,
}

impl ServerConfig {
    /// Location override first, then the server value; `None` when unbounded.
    pub fn body_limit(&self, location: Option<&LocationConfig>) -> Option<usize> {
        let limit = match location {
            Some(loc) if loc.max_body_size > 0 => loc.max_body_size,
            _ => self.client_max_body_size,
        };
        if limit > 0 { Some(limit) } else { None }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub servers: Vec<ServerConfig>,
}

impl Config {
    /// Every distinct endpoint across all servers, in file order.
    pub fn listen_list(&self) -> Vec<ListenEndpoint> {
        let mut list: Vec<ListenEndpoint> = Vec::new();
        for endpoint in self.servers.iter().flat_map(|s| s.listen.iter()) {
            if !list.contains(endpoint) {
                list.push(endpoint.clone());
            }
        }
        list
    }
}
