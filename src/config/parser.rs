use crate::config::error::ConfigError;
use crate::config::models::{
    Config,
    ListenEndpoint,
    LocationConfig,
    Redirect,
    ServerConfig,
    DEFAULT_HOST,
};
use std::fs;
use std::path::Path;

/// A non-empty, comment-free source line and its 1-based number in the file.
#[derive(Debug)]
struct Line {
    number: usize,
    text: String,
}

enum Item<'a> {
    Directive(&'a Line),
    Block {
        header: &'a Line,
        body: &'a [Line],
    },
}

/// Cleaned input lines. Blocks are isolated as sub-slices so every helper
/// stays a pure function of its slice.
struct ParseContext {
    lines: Vec<Line>,
}

impl ParseContext {
    fn new(content: &str) -> Self {
        let lines = content
            .lines()
            .enumerate()
            .filter_map(|(idx, raw)| {
                let code = raw.split_once('#').map_or(raw, |(code, _)| code);
                let text = code.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(Line { number: idx + 1, text: text.to_string() })
                }
            })
            .collect();
        Self { lines }
    }
}

pub fn parse_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&content)
}

pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let ctx = ParseContext::new(content);
    let mut config = Config::default();

    for item in split_items(&ctx.lines, "server")? {
        // Top-level directives outside a server block carry no meaning.
        if let Item::Block { header, body } = item {
            config.servers.push(parse_server_block(header, body)?);
        }
    }

    Ok(config)
}

/// Splits `lines` into plain directives and `keyword { ... }` blocks.
/// Brace depth counts every `{` and `}` on a line.
fn split_items<'a>(lines: &'a [Line], keyword: &'static str) -> Result<Vec<Item<'a>>, ConfigError> {
    let mut items = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        if !opens_block(&line.text, keyword) {
            items.push(Item::Directive(line));
            i += 1;
            continue;
        }

        let mut depth = brace_delta(&line.text);
        let mut end = i;
        while depth > 0 {
            end += 1;
            match lines.get(end) {
                Some(next) => {
                    depth += brace_delta(&next.text);
                }
                None => {
                    return Err(ConfigError::Unterminated { block: keyword, line: line.number });
                }
            }
        }

        let body = if end > i { &lines[i + 1..end] } else { &lines[i + 1..i + 1] };
        items.push(Item::Block { header: line, body });
        i = end + 1;
    }

    Ok(items)
}

fn opens_block(text: &str, keyword: &str) -> bool {
    match text.strip_prefix(keyword) {
        Some(rest) => {
            text.contains('{') &&
                rest.chars().next().is_some_and(|c| c.is_whitespace() || c == '{')
        }
        None => false,
    }
}

fn brace_delta(text: &str) -> i64 {
    let opens = text.matches('{').count() as i64;
    let closes = text.matches('}').count() as i64;
    opens - closes
}

/// `"listen 80;"` -> `["listen", "80"]`
fn tokenize(text: &str) -> Vec<&str> {
    let text = text.trim_end();
    let text = text.strip_suffix(';').unwrap_or(text);
    text.split_whitespace().collect()
}

fn required<'a>(tokens: &[&'a str], idx: usize, line: &Line, what: &str) -> Result<&'a str, ConfigError> {
    tokens
        .get(idx)
        .copied()
        .ok_or_else(|| ConfigError::directive(line.number, tokens[0], format!("missing {}", what)))
}

fn parse_size(tokens: &[&str], line: &Line) -> Result<usize, ConfigError> {
    let raw = required(tokens, 1, line, "size")?;
    raw.parse::<usize>().map_err(|_| {
        ConfigError::directive(line.number, tokens[0], format!("`{}` is not a byte count", raw))
    })
}

fn parse_server_block(header: &Line, body: &[Line]) -> Result<ServerConfig, ConfigError> {
    let mut server = ServerConfig::default();

    for item in split_items(body, "location")? {
        let line = match item {
            Item::Block { header, body } => {
                server.locations.push(parse_location_block(header, body)?);
                continue;
            }
            Item::Directive(line) => line,
        };

        let tokens = tokenize(&line.text);
        let Some(&keyword) = tokens.first() else {
            continue;
        };

        match keyword {
            "listen" => {
                let value = required(&tokens, 1, line, "address")?;
                server.listen.push(parse_listen(value, line)?);
            }
            "server_name" => {
                server.server_name = required(&tokens, 1, line, "name")?.to_string();
            }
            "root" => {
                server.root = required(&tokens, 1, line, "path")?.to_string();
            }
            "error_page" => parse_error_page(&tokens, line, &mut server)?,
            "client_max_body_size" => {
                server.client_max_body_size = parse_size(&tokens, line)?;
            }
            _ => {}
        }
    }

    if server.listen.is_empty() {
        return Err(ConfigError::MissingListen { line: header.number });
    }
    Ok(server)
}

fn parse_location_block(header: &Line, body: &[Line]) -> Result<LocationConfig, ConfigError> {
    let path = header.text
        .strip_prefix("location")
        .and_then(|rest| rest.split(|c: char| c.is_whitespace() || c == '{').find(|t| !t.is_empty()))
        .ok_or(ConfigError::MissingLocationPath { line: header.number })?;

    let mut loc = LocationConfig {
        path: path.to_string(),
        ..LocationConfig::default()
    };

    for line in body {
        let tokens = tokenize(&line.text);
        let Some(&keyword) = tokens.first() else {
            continue;
        };

        match keyword {
            "root" => {
                loc.root = required(&tokens, 1, line, "path")?.to_string();
            }
            "index" => {
                loc.index = required(&tokens, 1, line, "file name")?.to_string();
            }
            "autoindex" => {
                loc.autoindex = match required(&tokens, 1, line, "on|off")? {
                    "on" => true,
                    "off" => false,
                    other => {
                        return Err(
                            ConfigError::directive(line.number, keyword, format!("expected on|off, got `{}`", other))
                        );
                    }
                };
            }
            "limit_except" => {
                required(&tokens, 1, line, "method list")?;
                loc.methods = tokens[1..].iter().map(|m| m.to_string()).collect();
            }
            "upload_store" => {
                loc.upload_dir = required(&tokens, 1, line, "directory")?.to_string();
            }
            "cgi_pass" => {
                let ext = required(&tokens, 1, line, "extension")?;
                let interpreter = required(&tokens, 2, line, "interpreter path")?;
                loc.cgi.insert(ext.to_string(), interpreter.to_string());
            }
            "return" => {
                loc.redirect = Some(parse_return(&tokens, line)?);
            }
            "client_max_body_size" => {
                loc.max_body_size = parse_size(&tokens, line)?;
            }
            _ => {}
        }
    }

    Ok(loc)
}

/// `host:port` or a bare `port`; host defaults to 0.0.0.0.
fn parse_listen(value: &str, line: &Line) -> Result<ListenEndpoint, ConfigError> {
    let invalid = || ConfigError::directive(line.number, "listen", value);

    let (host, port_str) = match value.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() || port.is_empty() {
                return Err(invalid());
            }
            (host, port)
        }
        None => (DEFAULT_HOST, value),
    };

    if !port_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let port = match port_str.parse::<u16>() {
        Ok(p) if p >= 1 => p,
        _ => {
            return Err(invalid());
        }
    };

    Ok(ListenEndpoint { host: host.to_string(), port })
}

/// `error_page CODE [CODE...] PATH`
fn parse_error_page(tokens: &[&str], line: &Line, server: &mut ServerConfig) -> Result<(), ConfigError> {
    if tokens.len() < 3 {
        return Err(ConfigError::directive(line.number, "error_page", "expected a status code and a path"));
    }
    let path = tokens[tokens.len() - 1];
    for raw in &tokens[1..tokens.len() - 1] {
        let code = match raw.parse::<u16>() {
            Ok(c) if (300..=599).contains(&c) => c,
            _ => {
                return Err(
                    ConfigError::directive(line.number, "error_page", format!("`{}` is not an error status", raw))
                );
            }
        };
        server.error_pages.insert(code, path.to_string());
    }
    Ok(())
}

/// `return TARGET` or `return CODE TARGET`.
fn parse_return(tokens: &[&str], line: &Line) -> Result<Redirect, ConfigError> {
    let first = required(tokens, 1, line, "target")?;
    match tokens.get(2) {
        Some(target) => {
            let status = match first.parse::<u16>() {
                Ok(c) if (300..=399).contains(&c) => c,
                _ => {
                    return Err(
                        ConfigError::directive(line.number, "return", format!("`{}` is not a redirect status", first))
                    );
                }
            };
            Ok(Redirect { status, target: target.to_string() })
        }
        None => Ok(Redirect { status: 301, target: first.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# sample
server {
    listen 127.0.0.1:8080;
    listen 8081;   # bare port
    server_name example.com;
    root ./www;
    error_page 404 /errors/404.html;
    client_max_body_size 1024;

    location / {
        index home.html;
        autoindex off;
    }

    location /upload {
        root ./data;
        limit_except GET POST;
        upload_store ./data/uploads;
        cgi_pass .py /usr/bin/python3;
        client_max_body_size 64;
    }

    location /old {
        return 302 /new;
    }
}

server {
    listen 127.0.0.1:8080;
    server_name other.test;
}
";

    #[test]
    fn parses_servers_and_locations() {
        let config = parse_config_str(SAMPLE).unwrap();
        assert_eq!(config.servers.len(), 2);

        let srv = &config.servers[0];
        assert_eq!(srv.listen[0], ListenEndpoint { host: "127.0.0.1".into(), port: 8080 });
        assert_eq!(srv.listen[1], ListenEndpoint { host: "0.0.0.0".into(), port: 8081 });
        assert_eq!(srv.server_name, "example.com");
        assert_eq!(srv.root, "./www");
        assert_eq!(srv.error_pages.get(&404).map(String::as_str), Some("/errors/404.html"));
        assert_eq!(srv.client_max_body_size, 1024);
        assert_eq!(srv.locations.len(), 3);

        let root = &srv.locations[0];
        assert_eq!(root.path, "/");
        assert_eq!(root.index, "home.html");
        assert!(!root.autoindex);
        assert!(root.methods.is_empty());

        let upload = &srv.locations[1];
        assert_eq!(upload.root, "./data");
        assert_eq!(upload.methods, vec!["GET", "POST"]);
        assert_eq!(upload.upload_dir, "./data/uploads");
        assert_eq!(upload.cgi.get(".py").map(String::as_str), Some("/usr/bin/python3"));
        assert_eq!(upload.max_body_size, 64);

        let old = &srv.locations[2];
        assert_eq!(old.redirect, Some(Redirect { status: 302, target: "/new".into() }));
    }

    #[test]
    fn listen_list_is_deduplicated_in_file_order() {
        let config = parse_config_str(SAMPLE).unwrap();
        let list = config.listen_list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].to_string(), "127.0.0.1:8080");
        assert_eq!(list[1].to_string(), "0.0.0.0:8081");
    }

    #[test]
    fn missing_listen_names_server_line() {
        let err = parse_config_str("\n\nserver {\n  server_name a;\n}\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingListen { line: 3 }));
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn location_without_path_fails() {
        let src = "server {\n  listen 80;\n  location {\n    root x;\n  }\n}\n";
        let err = parse_config_str(src).unwrap_err();
        assert!(matches!(err, ConfigError::MissingLocationPath { line: 3 }));
    }

    #[test]
    fn bad_port_reports_line_and_value() {
        for bad in ["listen 0;", "listen 70000;", "listen 80a;", "listen :80;", "listen host:;"] {
            let src = format!("server {{\n\n  {}\n}}\n", bad);
            let err = parse_config_str(&src).unwrap_err();
            assert_eq!(err.line(), Some(3), "{}", bad);
            assert!(err.to_string().contains("listen"), "{}", err);
        }
    }

    #[test]
    fn missing_values_are_errors() {
        let cases = [
            "server_name;",
            "root;",
            "error_page 404;",
            "error_page abc /x.html;",
            "client_max_body_size;",
            "client_max_body_size ten;",
        ];
        for case in cases {
            let src = format!("server {{\n  listen 80;\n  {}\n}}\n", case);
            let err = parse_config_str(&src).unwrap_err();
            assert_eq!(err.line(), Some(3), "{}", case);
        }

        let in_location = ["root;", "index;", "autoindex maybe;", "limit_except;", "cgi_pass .py;", "return;"];
        for case in in_location {
            let src = format!("server {{\n  listen 80;\n  location /a {{\n    {}\n  }}\n}}\n", case);
            let err = parse_config_str(&src).unwrap_err();
            assert_eq!(err.line(), Some(4), "{}", case);
        }
    }

    #[test]
    fn comments_do_not_shift_line_numbers() {
        let src = "# one\n\n# three\nserver { # four\n  listen 80; # five\n  listen nope;\n}\n";
        let err = parse_config_str(src).unwrap_err();
        assert_eq!(err.line(), Some(6));
    }

    #[test]
    fn unknown_directives_are_ignored() {
        let src = "worker_processes 4;\nserver {\n  listen 80;\n  gzip on;\n  location /x {\n    expires 1d;\n  }\n}\n";
        let config = parse_config_str(src).unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].locations[0].path, "/x");
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let err = parse_config_str("server {\n  listen 80;\n  location / {\n").unwrap_err();
        assert!(matches!(err, ConfigError::Unterminated { block: "server", line: 1 }));
    }

    #[test]
    fn return_without_code_defaults_to_301() {
        let src = "server {\n  listen 80;\n  location /a {\n    return https://example.com/;\n  }\n}\n";
        let config = parse_config_str(src).unwrap();
        let redirect = config.servers[0].locations[0].redirect.clone().unwrap();
        assert_eq!(redirect.status, 301);
        assert_eq!(redirect.target, "https://example.com/");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_config(dir.path().join("absent.conf")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert_eq!(err.line(), None);
    }
}
