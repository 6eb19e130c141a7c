//! `relaynet <port>` starts a relay on the given port; `relaynet <port>
//! client` starts the client driver instead (spec §6).

use anyhow::Result;
use relaynet_daemon::{logging, run_client, run_relay, Mode};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mode = match Mode::parse(&args) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(2);
        }
    };

    let result = match mode {
        Mode::Relay { port } => {
            let _guard = logging::init(&logging::node_log_stem(port));
            run_relay(port).await
        }
        Mode::Client { port } => {
            let _guard = logging::init(&logging::client_log_stem(port));
            run_client(port).await
        }
    };

    if let Err(e) = result {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}
