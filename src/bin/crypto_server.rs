use std::{error::Error, net::IpAddr, process, time::Duration};

use clap::Parser;
use crypto_echo::protocol::{DEFAULT_PORT, EchoServer, ServerConfig};
use log::info;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    address: IpAddr,
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Drop clients that send nothing for this many seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    read_timeout: Option<u64>,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            address: cli.address,
            port: cli.port,
            read_timeout: cli.read_timeout.map(Duration::from_secs),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    ctrlc::set_handler(|| {
        info!("interrupted, stopping server");
        process::exit(0);
    })?;

    let config: ServerConfig = Cli::parse().into();
    let server = EchoServer::bind(&config)?;

    let served = server.listen();
    info!("server shutdown complete after {served} connection(s)");
    Ok(())
}
