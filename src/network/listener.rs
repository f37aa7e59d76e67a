use crate::config::ListenEndpoint;
use mio::net::TcpListener;
use std::io;
use std::net::ToSocketAddrs;

/// Binds a non-blocking listener for `endpoint`, trying each address the
/// host resolves to until one succeeds.
pub fn bind_endpoint(endpoint: &ListenEndpoint) -> io::Result<TcpListener> {
    let addrs = (endpoint.host.as_str(), endpoint.port).to_socket_addrs()?;

    let mut last_err = None;
    for addr in addrs {
        match TcpListener::bind(addr) {
            Ok(listener) => {
                return Ok(listener);
            }
            Err(e) => {
                last_err = Some(e);
            }
        }
    }
    Err(
        last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, format!("{} resolved to no address", endpoint))
        })
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_loopback_with_ephemeral_port() {
        let endpoint = ListenEndpoint { host: "127.0.0.1".to_string(), port: 0 };
        let listener = bind_endpoint(&endpoint).unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn unresolvable_host_is_an_error() {
        let endpoint = ListenEndpoint { host: "no such host.invalid".to_string(), port: 80 };
        assert!(bind_endpoint(&endpoint).is_err());
    }
}
