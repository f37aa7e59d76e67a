mod error;
pub mod models;
mod parser;

pub use error::ConfigError;
pub use models::{ Config, ListenEndpoint, LocationConfig, Redirect, ServerConfig };
pub use parser::{ parse_config, parse_config_str };
