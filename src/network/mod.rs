pub mod listener;

pub use listener::bind_endpoint;
