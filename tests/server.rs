use std::fs;
use std::io::{ Read, Write };
use std::net::{ TcpListener, TcpStream };
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use webserv::config::parse_config_str;
use webserv::server::Server;

fn free_port() -> u16 {
    let probe = TcpListener::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap().port()
}

/// Starts a server on a free loopback port and returns the port once it
/// is listening. The thread runs until the test process exits.
fn start(root: &Path) -> u16 {
    launch(|port| {
        format!(
            "server {{
                listen 127.0.0.1:{port};
                server_name localhost;
                root {root};
                client_max_body_size 100;
                location / {{
                    limit_except GET POST;
                }}
            }}",
            port = port,
            root = root.display()
        )
    })
}

/// Like `start`, with the config text built for the chosen port.
fn launch(config_for: impl FnOnce(u16) -> String) -> u16 {
    let port = free_port();
    let config = parse_config_str(&config_for(port)).unwrap();

    let (ready_tx, ready_rx) = mpsc::channel();
    thread::spawn(move || {
        let mut server = Server::new(config, Duration::from_secs(5)).unwrap();
        server.bind().unwrap();
        assert_eq!(server.local_addrs()[0].port(), port);
        ready_tx.send(()).unwrap();
        server.run().unwrap();
    });
    ready_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    port
}

fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hello.txt"), "hello world").unwrap();
    dir
}

fn exchange(port: u16, chunks: &[&[u8]]) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    for chunk in chunks {
        stream.write_all(chunk).unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(50));
    }
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// Status line of the reply. The server may answer and close before every
/// chunk is written, so late write and read errors are tolerated.
fn status_line(port: u16, chunks: &[&[u8]]) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    for chunk in chunks {
        if stream.write_all(chunk).is_err() {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    let mut response = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => response.extend_from_slice(&buf[..n]),
        }
    }
    let text = String::from_utf8_lossy(&response).into_owned();
    text.lines().next().unwrap_or_default().to_string()
}

#[test]
fn fragmented_request_is_buffered_until_complete() {
    let dir = site();
    let port = start(dir.path());

    let response = exchange(port, &[b"GET /hello.txt HT", b"TP/1.1\r\nHost: local", b"host\r\n\r\n"]);
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{}", response);
    assert!(response.contains("Content-Type: text/plain\r\n"));
    assert!(response.contains("Connection: close\r\n"));
    assert!(response.ends_with("\r\n\r\nhello world"));
}

#[test]
fn body_sent_after_headers_is_awaited() {
    let dir = site();
    let port = start(dir.path());

    let response = exchange(
        port,
        &[
            b"POST /form HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 9\r\n\r\n",
            b"city=",
            b"Oslo",
        ]
    );
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{}", response);
    assert!(response.contains("<b>city</b>: Oslo"));
}

#[test]
fn malformed_request_gets_400() {
    let dir = site();
    let port = start(dir.path());

    let response = exchange(port, &[b"NONSENSE\r\n\r\n"]);
    assert!(response.starts_with("HTTP/1.1 400 "), "{}", response);
}

#[test]
fn oversized_body_is_refused_before_it_arrives() {
    let dir = site();
    let port = start(dir.path());

    let response = exchange(port, &[b"POST /form HTTP/1.1\r\nContent-Length: 5000\r\n\r\n"]);
    assert!(response.starts_with("HTTP/1.1 413 "), "{}", response);
}

#[test]
fn head_and_missing_files() {
    let dir = site();
    let port = start(dir.path());

    let head = exchange(port, &[b"HEAD /hello.txt HTTP/1.1\r\n\r\n"]);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Content-Length: 11\r\n"));
    assert!(head.ends_with("\r\n\r\n"));

    let missing = exchange(port, &[b"GET /absent HTTP/1.1\r\n\r\n"]);
    assert!(missing.starts_with("HTTP/1.1 404 Not Found\r\n"));

    let denied = exchange(port, &[b"DELETE /hello.txt HTTP/1.1\r\n\r\n"]);
    assert!(denied.starts_with("HTTP/1.1 403 "));
    assert!(dir.path().join("hello.txt").exists());
}

#[test]
fn status_does_not_depend_on_how_the_body_arrives() {
    let dir = site();
    let root = dir.path().to_path_buf();
    let port = launch(|port| {
        format!(
            "server {{
                listen 127.0.0.1:{port};
                root {root};
                client_max_body_size 10;
                location / {{
                    limit_except GET;
                }}
                location /form {{
                    limit_except POST;
                }}
                location /old {{
                    return 301 /new;
                }}
            }}",
            port = port,
            root = root.display()
        )
    });

    let body: &[u8] = b"01234567890123456789";
    let cases = [
        ("GET /hello.txt", "HTTP/1.1 200 OK"),
        ("HEAD /hello.txt", "HTTP/1.1 200 OK"),
        ("POST /", "HTTP/1.1 405 Method Not Allowed"),
        ("GET /old", "HTTP/1.1 301 Moved Permanently"),
        ("DELETE /hello.txt", "HTTP/1.1 403 Forbidden"),
        ("POST /form", "HTTP/1.1 413 Payload Too Large"),
    ];
    for (request_line, expected) in cases {
        let head = format!("{} HTTP/1.1\r\nContent-Length: {}\r\n\r\n", request_line, body.len());
        let whole = [head.as_bytes(), body].concat();

        assert_eq!(status_line(port, &[whole.as_slice()]), expected, "{} in one segment", request_line);
        assert_eq!(status_line(port, &[head.as_bytes(), body]), expected, "{} split", request_line);
    }
    assert!(dir.path().join("hello.txt").exists());
}
