pub mod connection;
pub mod router;

use crate::config::{ Config, ListenEndpoint };
use crate::handlers::{ self, error_page::error_response };
use crate::http::{ HttpRequest, HttpResponse, ParseError };
use crate::network::bind_endpoint;
use crate::server::connection::{ Connection, ConnectionState, ReadStatus };

use log::{ debug, error, info, warn };
use mio::event::Event;
use mio::net::TcpListener;
use mio::{ Events, Interest, Poll, Token };
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::{ Duration, Instant };

/// Tokens below this are reserved for listeners.
const LISTENER_TOKEN_MAX: usize = 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(1000);

pub struct Server {
    poll: Poll,
    listeners: HashMap<Token, ListenerEntry>,
    connections: HashMap<Token, Connection>,
    config: Config,
    next_token: usize,
    idle_timeout: Duration,
}

struct ListenerEntry {
    listener: TcpListener,
    endpoint: ListenEndpoint,
}

impl Server {
    pub fn new(config: Config, idle_timeout: Duration) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            listeners: HashMap::new(),
            connections: HashMap::new(),
            config,
            next_token: LISTENER_TOKEN_MAX,
            idle_timeout,
        })
    }

    /// Opens one listener per distinct endpoint. Endpoints that fail are
    /// logged and skipped; it is an error only if none could be bound.
    pub fn bind(&mut self) -> io::Result<()> {
        for endpoint in self.config.listen_list() {
            if self.listeners.len() >= LISTENER_TOKEN_MAX {
                warn!("[Setup] Too many listeners, skipping {}", endpoint);
                continue;
            }

            let mut listener = match bind_endpoint(&endpoint) {
                Ok(listener) => listener,
                Err(e) => {
                    error!("[Setup] Failed to bind {}: {}", endpoint, e);
                    continue;
                }
            };

            let token = Token(self.listeners.len());
            if let Err(e) = self.poll.registry().register(&mut listener, token, Interest::READABLE) {
                error!("[Setup] Failed to register {}: {}", endpoint, e);
                continue;
            }

            info!("[Setup] Listening on http://{}", endpoint);
            self.listeners.insert(token, ListenerEntry { listener, endpoint });
        }

        if self.listeners.is_empty() {
            return Err(io::Error::new(io::ErrorKind::AddrNotAvailable, "no listen endpoint could be bound"));
        }
        Ok(())
    }

    /// Addresses actually bound, in listener order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        let mut tokens: Vec<&Token> = self.listeners.keys().collect();
        tokens.sort();
        tokens
            .into_iter()
            .filter_map(|t| self.listeners[t].listener.local_addr().ok())
            .collect()
    }

    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(1024);

        info!("[Reactor] Event loop started with {} listener(s)", self.listeners.len());
        loop {
            if let Err(e) = self.poll.poll(&mut events, Some(POLL_INTERVAL)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!("[Reactor] poll failed: {}", e);
                return Err(e);
            }

            for event in events.iter() {
                let token = event.token();
                if self.listeners.contains_key(&token) {
                    self.accept_connections(token);
                } else {
                    self.handle_client_event(token, event);
                }
            }
            self.check_timeouts();
        }
    }

    fn accept_connections(&mut self, listener_token: Token) {
        loop {
            let Some(entry) = self.listeners.get_mut(&listener_token) else {
                return;
            };

            match entry.listener.accept() {
                Ok((mut stream, peer)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;

                    if let Err(e) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
                        error!("[Network] Failed to register client {}: {}", peer, e);
                        continue;
                    }
                    debug!("[Network] Accepted {} on {} as {:?}", peer, entry.endpoint, token);
                    let endpoint = entry.endpoint.clone();
                    self.connections.insert(token, Connection::new(stream, endpoint));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                    continue;
                }
                Err(e) => {
                    warn!("[Network] accept failed: {}", e);
                    return;
                }
            }
        }
    }

    fn handle_client_event(&mut self, token: Token, event: &Event) {
        if event.is_readable() {
            self.read_from_client(token);
        }
        if event.is_writable() {
            self.write_to_client(token);
        }
        if event.is_error() {
            self.close_connection(token);
        }
    }

    fn read_from_client(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        if conn.state != ConnectionState::ReadRequest {
            return;
        }

        let peer_closed = match conn.fill_read_buffer() {
            Ok(ReadStatus::Pending) => false,
            Ok(ReadStatus::Closed) => true,
            Err(e) => {
                debug!("[Network] read error on {:?}: {}", token, e);
                self.close_connection(token);
                return;
            }
        };

        match self.build_response(token) {
            Some(response) => self.finalize_response(token, response),
            None if peer_closed => self.close_connection(token),
            None => {}
        }
    }

    /// `None` while the request has to keep buffering.
    fn build_response(&self, token: Token) -> Option<HttpResponse> {
        let conn = self.connections.get(&token)?;
        let servers = &self.config.servers;

        let mut request = match HttpRequest::parse_message(&conn.read_buffer) {
            Ok(request) => request,
            Err(ParseError::Incomplete) => {
                return None;
            }
            Err(e) => {
                warn!("[Http] Bad request on {}: {}", conn.endpoint, e);
                return Some(error_response(servers.first(), 400, &e.to_string()));
            }
        };

        if !request.complete {
            let response = handlers::reject_early(servers, &request)?;
            info!(
                "[Http] endpoint={} method={} path={} status={} (body not awaited)",
                conn.endpoint,
                request.method,
                request.uri,
                response.status()
            );
            return Some(response);
        }

        let response = handlers::dispatch(servers, &mut request);
        info!(
            "[Http] endpoint={} method={} path={} status={}",
            conn.endpoint,
            request.method,
            request.uri,
            response.status()
        );
        Some(response)
    }

    fn finalize_response(&mut self, token: Token, response: HttpResponse) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        conn.queue_response(response.to_bytes());

        if let Err(e) = self.poll.registry().reregister(&mut conn.stream, token, Interest::WRITABLE) {
            error!("[Reactor] Failed to reregister {:?}: {}", token, e);
            self.close_connection(token);
            return;
        }
        // Try straight away; the writable event only matters if this blocks.
        self.write_to_client(token);
    }

    fn write_to_client(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        if conn.state != ConnectionState::WriteResponse {
            return;
        }

        match conn.flush_write_buffer() {
            Ok(true) => {
                debug!("[Network] Response sent to {:?}", token);
                self.close_connection(token);
            }
            Ok(false) => {}
            Err(e) => {
                warn!("[Network] write to {:?} failed: {}", token, e);
                self.close_connection(token);
            }
        }
    }

    fn check_timeouts(&mut self) {
        let now = Instant::now();
        let expired: Vec<Token> = self.connections
            .iter()
            .filter(|(_, conn)| conn.is_idle(now, self.idle_timeout))
            .map(|(&t, _)| t)
            .collect();

        for token in expired {
            debug!("[Network] Closing idle connection {:?}", token);
            self.close_connection(token);
        }
    }

    fn close_connection(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
        }
    }
}
