//! Top-level run loop for each invocation mode (spec §6 "Invocation
//! surface"): `<program> <port>` starts a relay; `<program> <port> client`
//! starts the client driver against a default onion-style target drawn
//! from the known relay set.

use anyhow::{bail, Context, Result};
use relaynet_common::RelayConfig;
use relaynet_core::Relay;
use std::time::Duration;
use tracing::info;

/// The two shapes `<program> <port> [client]` can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Relay { port: u16 },
    Client { port: u16 },
}

impl Mode {
    pub fn parse(args: &[String]) -> Result<Self> {
        let port: u16 = args
            .get(1)
            .context("usage: relaynet <port> [client]")?
            .parse()
            .context("port must be a number in 0..=65535")?;

        match args.get(2).map(String::as_str) {
            None => Ok(Mode::Relay { port }),
            Some("client") => Ok(Mode::Client { port }),
            Some(other) => bail!("unknown mode {other:?}; expected \"client\" or nothing"),
        }
    }
}

/// Start a relay on `port`, bound to the default known set, and run until
/// `ctrl_c` (spec §3 lifecycle: initialized -> listening -> stopping ->
/// stopped).
pub async fn run_relay(port: u16) -> Result<()> {
    let config = RelayConfig::new();
    let relay = std::sync::Arc::new(Relay::with_default_static_body(port));

    let handle = relay
        .clone()
        .start(&config)
        .await
        .context("failed to bind relay listener")?;

    info!(port, "relay listening; press ctrl-c to stop");
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;

    info!(port, "shutdown signal received");
    handle.stop().await.context("relay shutdown failed")?;
    info!(port, "relay stopped");
    Ok(())
}

/// Drive a single request through the default known set, targeting the
/// last known relay as exit with an `N.onion`-style payload (spec §4.5,
/// SPEC_FULL's "`N.onion`-style request payloads" supplement).
pub async fn run_client(local_port: u16) -> Result<()> {
    let config = RelayConfig::new();
    let known = config.known_endpoints();
    let Some(exit) = known.last() else {
        bail!("known relay set is empty");
    };
    let exit_port = exit
        .as_str()
        .rsplit(':')
        .next()
        .context("malformed exit endpoint")?;
    let payload = format!("{exit_port}.onion").into_bytes();

    let client = relaynet_core::Client::bind(&relaynet_common::Endpoint::new(format!(
        "127.0.0.1:{local_port}"
    )))
    .await
    .context("failed to bind client listener")?;

    info!(local_port, target = exit_port, "sending request");
    let response = client
        .send(
            &known,
            config.random_path_length,
            payload,
            Duration::from_secs(5),
            Duration::from_secs(30),
        )
        .await
        .context("request failed")?;

    println!("{}", String::from_utf8_lossy(&response));
    Ok(())
}
