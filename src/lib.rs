//! A single-threaded HTTP/1.1 server driven by nginx-style configuration.

pub mod config;
pub mod handlers;
pub mod http;
pub mod network;
pub mod server;
pub mod utils;
