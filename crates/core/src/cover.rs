//! Cover traffic: periodic dummy cells, indistinguishable on the wire from
//! real cells, sent to obscure genuine traffic patterns (spec §4.6).

use crate::cell::RelayCell;
use crate::transport;
use relaynet_common::Endpoint;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Sentinel payload prefix a receiving relay recognizes and drops rather
/// than genuinely forwarding (spec §4.6, §9 open question ii).
pub const DUMMY_TRAFFIC_TAG: &[u8] = b"[DUMMY_TRAFFIC]";

/// True if a forward-leg cell is cover traffic rather than a real request,
/// judged purely by its payload tag — a receiving relay has no other way
/// to distinguish the two, by design.
pub fn is_cover_cell(cell: &RelayCell) -> bool {
    !cell.is_exit_request && !cell.is_exit_response && cell.payload.starts_with(DUMMY_TRAFFIC_TAG)
}

fn random_ascii_payload(len: usize) -> Vec<u8> {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    crate::rng::with_rng(|rng| {
        use rand::Rng;
        (0..len).map(|_| CHARSET[rng.gen_range(0..CHARSET.len())]).collect()
    })
}

fn build_dummy_cell(target: &Endpoint) -> RelayCell {
    let mut payload = DUMMY_TRAFFIC_TAG.to_vec();
    payload.push(b' ');
    payload.extend(random_ascii_payload(8));

    RelayCell {
        prev_addr: Endpoint::default(),
        next_addr: target.clone(),
        payload,
        is_exit_request: false,
        is_exit_response: false,
    }
}

/// Spawn the periodic cover-traffic task. It shares only the relay's
/// shutdown signal with the accept loop (spec §5) and its send failures
/// are logged and otherwise ignored — cover traffic must never block or
/// crash the relay.
pub fn spawn(
    self_addr: Endpoint,
    peers: Vec<Endpoint>,
    interval: Duration,
    connect_timeout: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let candidates: Vec<Endpoint> = peers.into_iter().filter(|p| p != &self_addr).collect();
        if candidates.is_empty() {
            debug!("no peers available for cover traffic, task exiting");
            return;
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    let target = crate::rng::with_rng(|rng| {
                        use rand::seq::SliceRandom;
                        candidates.choose(rng).cloned()
                    });
                    let Some(target) = target else { continue };

                    let cell = build_dummy_cell(&target);
                    match transport::send_cell(&target, &cell, connect_timeout).await {
                        Ok(()) => trace!(%target, "sent cover cell"),
                        Err(e) => debug!(%target, error = %e, "cover cell send failed, ignoring"),
                    }
                }
            }
        }
    })
}
