use std::{
    error::Error,
    io::{self, Write},
    net::{IpAddr, SocketAddr, TcpStream},
};

use clap::Parser;
use crypto_echo::{
    Command, prompt,
    protocol::{CryptoClient, DEFAULT_PORT, TransportError},
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1")]
    address: IpAddr,
    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let stream = TcpStream::connect(SocketAddr::new(cli.address, cli.port))?;
    let mut client = CryptoClient::new(stream);

    println!(
        "connected. '#' exchanges keys, '!text' sends encrypted, \
         'exit' leaves, '=' stops the server"
    );

    loop {
        let cmd = match prompt(io::stdin().lock(), io::stdout().lock()) {
            Ok(cmd) => cmd,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };
        let done = matches!(cmd, Command::ExitClient | Command::ExitServer);

        match client.execute(cmd) {
            Ok(Some(out)) => println!("{out}"),
            Ok(None) => {}
            Err(TransportError::ConnectionClosed) => {
                eprintln!("server closed the connection");
                break;
            }
            Err(e) => eprintln!("error: {e}"),
        }
        io::stdout().flush()?;

        if done {
            break;
        }
    }

    Ok(())
}
