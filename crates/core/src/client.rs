//! The client driver (spec §4.5): build a circuit, originate the request
//! cell toward its first hop, and wait for a response cell to arrive
//! back at a locally bound listening endpoint.

use crate::cell::RelayCell;
use crate::circuit::{self, Circuit};
use crate::path;
use crate::transport;
use relaynet_common::{Endpoint, RelayNetError};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::debug;

/// An originator that builds circuits and correlates responses on its
/// own listening endpoint (spec §4.5, §6: "clients... listen on an
/// endpoint and carry it in `prev_addr`").
pub struct Client {
    listener: TcpListener,
    local_addr: Endpoint,
}

impl Client {
    /// Bind the endpoint that will receive the response.
    pub async fn bind(addr: &Endpoint) -> Result<Self, RelayNetError> {
        let listener = transport::bind(addr).await?;
        let local_addr = Endpoint::from(listener.local_addr().map_err(RelayNetError::Io)?);
        Ok(Self { listener, local_addr })
    }

    pub fn local_addr(&self) -> &Endpoint {
        &self.local_addr
    }

    /// Build a circuit of `length` over `known`, send `payload` through
    /// it, and wait up to `wait_timeout` for the response (spec §4.5
    /// steps 1–4).
    pub async fn send(
        &self,
        known: &[Endpoint],
        length: usize,
        payload: Vec<u8>,
        connect_timeout: Duration,
        wait_timeout: Duration,
    ) -> Result<Vec<u8>, RelayNetError> {
        let built = circuit::build_circuit(known, length)?;
        self.send_via_circuit(&built, payload, connect_timeout, wait_timeout).await
    }

    /// Send through an already-built circuit. Useful for tests that need
    /// a deterministic path, and used internally by [`Client::send`].
    pub async fn send_via_circuit(
        &self,
        circuit: &Circuit,
        payload: Vec<u8>,
        connect_timeout: Duration,
        wait_timeout: Duration,
    ) -> Result<Vec<u8>, RelayNetError> {
        let entry = circuit.entry().endpoint.clone();
        let remaining: Vec<Endpoint> =
            circuit.hops()[1..].iter().map(|hop| hop.endpoint.clone()).collect();

        let initial = RelayCell {
            prev_addr: path::encode(&[self.local_addr.clone()]),
            next_addr: path::encode(&remaining),
            payload,
            is_exit_request: remaining.is_empty(),
            is_exit_response: false,
        };

        debug!(entry = %entry, hops = circuit.len(), "dialing entry relay");
        transport::send_cell(&entry, &initial, connect_timeout).await?;

        self.await_response(wait_timeout).await
    }

    /// The degenerate single-hop case (spec §4.4 keeps `L < 2` out of
    /// the public circuit builder; this is the internal path the
    /// original's `len(circuit) == 1` branch corresponds to, used only
    /// for a relay's own loopback self-test — see SPEC_FULL.md).
    pub async fn send_via_single_hop(
        &self,
        exit: &Endpoint,
        payload: Vec<u8>,
        connect_timeout: Duration,
        wait_timeout: Duration,
    ) -> Result<Vec<u8>, RelayNetError> {
        let initial = RelayCell {
            prev_addr: path::encode(&[self.local_addr.clone()]),
            next_addr: Endpoint::default(),
            payload,
            is_exit_request: true,
            is_exit_response: false,
        };
        transport::send_cell(exit, &initial, connect_timeout).await?;
        self.await_response(wait_timeout).await
    }

    async fn await_response(&self, wait_timeout: Duration) -> Result<Vec<u8>, RelayNetError> {
        let (mut stream, _) = tokio::time::timeout(wait_timeout, self.listener.accept())
            .await
            .map_err(|_| RelayNetError::Timeout)?
            .map_err(RelayNetError::Io)?;

        let cell = transport::read_cell(&mut stream, wait_timeout)
            .await?
            .ok_or_else(|| RelayNetError::decode("connection closed before any response cell"))?;

        if !cell.is_exit_response {
            return Err(RelayNetError::decode("expected a response cell"));
        }

        Ok(cell.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::Relay;
    use relaynet_common::RelayConfig;
    use std::sync::Arc;

    fn connect_timeout() -> Duration {
        Duration::from_secs(2)
    }

    fn wait_timeout() -> Duration {
        Duration::from_secs(2)
    }

    #[tokio::test]
    async fn two_hop_request_round_trips_through_entry_and_exit() {
        let entry = Arc::new(Relay::new(19101, b"unused".to_vec()));
        let exit = Arc::new(Relay::with_default_static_body(19102));

        let entry_config = RelayConfig::new();
        let exit_config = RelayConfig::new();
        let entry_handle = entry.clone().start(&entry_config).await.unwrap();
        let exit_handle = exit.clone().start(&exit_config).await.unwrap();

        let known = vec![entry.self_addr.clone(), exit.self_addr.clone()];

        let client = Client::bind(&Endpoint::new("127.0.0.1:0")).await.unwrap();
        let response = client
            .send(&known, 2, b"ping".to_vec(), connect_timeout(), wait_timeout())
            .await
            .unwrap();

        assert_eq!(response, exit.static_response_body);

        entry_handle.stop().await.unwrap();
        exit_handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn three_hop_request_traverses_a_middle_relay() {
        let entry = Arc::new(Relay::new(19103, b"unused".to_vec()));
        let middle = Arc::new(Relay::new(19104, b"unused".to_vec()));
        let exit = Arc::new(Relay::with_default_static_body(19105));

        let config = RelayConfig::new();
        let entry_handle = entry.clone().start(&config).await.unwrap();
        let middle_handle = middle.clone().start(&config).await.unwrap();
        let exit_handle = exit.clone().start(&config).await.unwrap();

        let known = vec![
            entry.self_addr.clone(),
            middle.self_addr.clone(),
            exit.self_addr.clone(),
        ];

        let client = Client::bind(&Endpoint::new("127.0.0.1:0")).await.unwrap();
        let response = client
            .send(&known, 3, b"hello".to_vec(), connect_timeout(), wait_timeout())
            .await
            .unwrap();

        assert_eq!(response, exit.static_response_body);

        entry_handle.stop().await.unwrap();
        middle_handle.stop().await.unwrap();
        exit_handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn single_hop_loopback_self_test() {
        let exit = Arc::new(Relay::with_default_static_body(19106));
        let config = RelayConfig::new();
        let exit_handle = exit.clone().start(&config).await.unwrap();

        let client = Client::bind(&Endpoint::new("127.0.0.1:0")).await.unwrap();
        let response = client
            .send_via_single_hop(&exit.self_addr, b"9003.onion".to_vec(), connect_timeout(), wait_timeout())
            .await
            .unwrap();

        assert_eq!(response, exit.static_response_body);
        exit_handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn no_response_within_wait_window_times_out() {
        let client = Client::bind(&Endpoint::new("127.0.0.1:0")).await.unwrap();
        let known = vec![Endpoint::new("127.0.0.1:1"), Endpoint::new("127.0.0.1:2")];

        let result = client
            .send(&known, 2, b"ping".to_vec(), Duration::from_millis(100), Duration::from_millis(200))
            .await;

        assert!(result.is_err());
    }
}
