use crate::config::ListenEndpoint;
use mio::net::TcpStream;
use std::io::{ self, Read, Write };
use std::time::{ Duration, Instant };

const READ_CHUNK: usize = 4096;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectionState {
    ReadRequest,
    WriteResponse,
}

/// Result of draining the socket after a readiness event.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadStatus {
    /// The peer has nothing more to send right now.
    Pending,
    /// The peer closed its side.
    Closed,
}

pub struct Connection {
    pub stream: TcpStream,
    pub state: ConnectionState,
    pub read_buffer: Vec<u8>,
    pub write_buffer: Vec<u8>,
    pub bytes_written: usize,
    pub last_activity: Instant,
    /// Listener the connection arrived on.
    pub endpoint: ListenEndpoint,
}

impl Connection {
    pub fn new(stream: TcpStream, endpoint: ListenEndpoint) -> Self {
        Self {
            stream,
            state: ConnectionState::ReadRequest,
            read_buffer: Vec::with_capacity(8192),
            write_buffer: Vec::new(),
            bytes_written: 0,
            last_activity: Instant::now(),
            endpoint,
        }
    }

    /// Reads until the socket would block. Readiness is edge-triggered, so
    /// stopping early would leave bytes that never raise another event.
    pub fn fill_read_buffer(&mut self) -> io::Result<ReadStatus> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    return Ok(ReadStatus::Closed);
                }
                Ok(n) => {
                    self.read_buffer.extend_from_slice(&buf[..n]);
                    self.last_activity = Instant::now();
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(ReadStatus::Pending);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                    continue;
                }
                Err(e) => {
                    return Err(e);
                }
            }
        }
    }

    pub fn queue_response(&mut self, bytes: Vec<u8>) {
        self.write_buffer = bytes;
        self.bytes_written = 0;
        self.state = ConnectionState::WriteResponse;
        self.last_activity = Instant::now();
    }

    /// Writes as much of the pending response as the socket accepts.
    /// Returns `true` once everything has been sent.
    pub fn flush_write_buffer(&mut self) -> io::Result<bool> {
        while self.bytes_written < self.write_buffer.len() {
            match self.stream.write(&self.write_buffer[self.bytes_written..]) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::WriteZero, "peer stopped accepting data"));
                }
                Ok(n) => {
                    self.bytes_written += n;
                    self.last_activity = Instant::now();
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(false);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                    continue;
                }
                Err(e) => {
                    return Err(e);
                }
            }
        }
        Ok(true)
    }

    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.duration_since(self.last_activity) > timeout
    }
}
