//! Multi-relay scenarios that cross module boundaries (spec §8's S3, S4,
//! S6): invalid-length rejection opens no sockets, cover traffic runs
//! alongside genuine traffic without interfering, and a relay stopped
//! mid-handler drains cleanly within its deadline.

use relaynet_common::{Endpoint, RelayConfig};
use relaynet_core::{build_circuit, Client, Relay};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn invalid_circuit_length_rejects_without_opening_any_sockets() {
    let known = vec![Endpoint::new("127.0.0.1:19201")];
    let err = build_circuit(&known, 1).unwrap_err();
    assert!(matches!(err, relaynet_common::RelayNetError::InvalidCircuit(_)));
}

#[tokio::test]
async fn cover_traffic_does_not_interfere_with_a_genuine_request() {
    let entry = Arc::new(Relay::new(19202, b"unused".to_vec()));
    let exit = Arc::new(Relay::with_default_static_body(19203));

    let config = RelayConfig::new()
        .with_known_ports(vec![19202, 19203])
        .with_random_traffic(true, 1);

    let entry_handle = entry.clone().start(&config).await.unwrap();
    let exit_handle = exit.clone().start(&config).await.unwrap();

    // Let a few cover-traffic ticks fire in the background.
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let known = vec![entry.self_addr.clone(), exit.self_addr.clone()];
    let client = Client::bind(&Endpoint::new("127.0.0.1:0")).await.unwrap();
    let response = client
        .send(&known, 2, b"ping".to_vec(), Duration::from_secs(2), Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(response, exit.static_response_body);

    entry_handle.stop().await.unwrap();
    exit_handle.stop().await.unwrap();
}

#[tokio::test]
async fn stop_drains_an_in_flight_handler_within_its_deadline() {
    let relay = Arc::new(Relay::with_default_static_body(19204));
    let config = RelayConfig::new().with_known_ports(vec![19204]);
    let handle = relay.clone().start(&config).await.unwrap();

    // Fire a real request at the relay, then stop it immediately — the
    // in-flight handler must still be allowed to finish.
    let client = Client::bind(&Endpoint::new("127.0.0.1:0")).await.unwrap();
    let request = tokio::spawn({
        let known = vec![relay.self_addr.clone()];
        let client_addr = client.local_addr().clone();
        async move {
            let cell = relaynet_core::RelayCell {
                prev_addr: client_addr,
                next_addr: Endpoint::default(),
                payload: b"19204.onion".to_vec(),
                is_exit_request: true,
                is_exit_response: false,
            };
            relaynet_core::transport::send_cell(&known[0], &cell, Duration::from_secs(1)).await
        }
    });

    let stop_result = tokio::time::timeout(Duration::from_secs(5), handle.stop()).await;
    assert!(stop_result.is_ok(), "stop() did not return within its deadline");

    // The in-flight write either completes or errors within its own
    // deadline (spec §8 S6) — either is acceptable, it must simply not hang.
    let request_result = tokio::time::timeout(Duration::from_secs(2), request).await;
    assert!(request_result.is_ok(), "in-flight handler did not resolve within its deadline");

    assert_eq!(relay.state().await, relaynet_core::LifecycleState::Stopped);
}
