use clap::Parser;
use log::{ error, info };
use std::process;
use std::time::Duration;
use webserv::config::parse_config;
use webserv::server::Server;

#[derive(Parser, Debug)]
#[command(name = "webserv", version, about = "Serve static files, form posts and deletes from an nginx-style config")]
struct Cli {
    /// Configuration file
    #[arg(default_value = "conf/default.conf")]
    config: String,

    /// Seconds a connection may sit idle before it is closed
    #[arg(long, default_value_t = 30)]
    idle_timeout: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match parse_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Fatal config error in {}: {}", cli.config, e);
            process::exit(1);
        }
    };
    info!("[Setup] Loaded {} server block(s) from {}", config.servers.len(), cli.config);

    let mut server = match Server::new(config, Duration::from_secs(cli.idle_timeout)) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Fatal: cannot create event loop: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = server.bind() {
        eprintln!("Fatal: {}", e);
        process::exit(1);
    }

    if let Err(e) = server.run() {
        error!("[Reactor] stopped: {}", e);
        process::exit(1);
    }
}
