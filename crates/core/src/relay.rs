//! The relay node runtime (spec §4.3): bind a listening endpoint, accept
//! cells concurrently with every other in-flight handler, and dispatch
//! each one by the flag/address combination it carries — a relay needs
//! no stored circuit membership to do this correctly (spec §3, §4.3,
//! §9 "Polymorphism over roles").
//!
//! Routing beyond the immediate next hop is resolved through
//! [`crate::path`]; see that module's docs for why the literal
//! single-endpoint reading of `next_addr`/`prev_addr` only covers a
//! two-hop circuit on its own.

use crate::cell::RelayCell;
use crate::cover;
use crate::crypto::{CipherSuite, EphemeralKeyPair, IdentityCipher};
use crate::path;
use crate::transport;
use relaynet_common::{Endpoint, RelayConfig, RelayNetError, RelayRole};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// A relay's lifecycle (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Initialized,
    Listening,
    Stopping,
    Stopped,
}

/// The outcome of routing one received cell, returned so callers (tests,
/// mainly) can assert on dispatch without re-parsing a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Forwarded { to: Endpoint },
    Responded { to: Endpoint },
    DeliveredLocally { payload: Vec<u8> },
    DroppedCover,
    DroppedMalformed,
}

/// A long-lived, process-scoped relay (spec §3).
pub struct Relay {
    pub id: String,
    pub self_addr: Endpoint,
    pub keypair: EphemeralKeyPair,
    pub static_response_body: Vec<u8>,
    cipher: Box<dyn CipherSuite>,
    role: RwLock<RelayRole>,
    state: RwLock<LifecycleState>,
}

impl Relay {
    pub fn new(port: u16, static_response_body: impl Into<Vec<u8>>) -> Self {
        Self {
            id: format!("relay-{port}"),
            self_addr: Endpoint::new(format!("127.0.0.1:{port}")),
            keypair: EphemeralKeyPair::generate(),
            static_response_body: static_response_body.into(),
            cipher: Box::new(IdentityCipher),
            role: RwLock::new(RelayRole::Unassigned),
            state: RwLock::new(LifecycleState::Initialized),
        }
    }

    /// A relay whose exit response is the original's default HTML body
    /// (spec §8 S2, SPEC_FULL's "Exit HTML body format" supplement).
    pub fn with_default_static_body(port: u16) -> Self {
        let body = format!("<html><body><h1>Hello from port {port}</h1></body></html>");
        Self::new(port, body.into_bytes())
    }

    /// Substitute the encryption boundary (spec §4.7, §9 "Opaque
    /// encryption"): the base [`IdentityCipher`] can be swapped for a real
    /// binding without touching the dispatch logic in [`Relay::route`].
    pub fn with_cipher(mut self, cipher: impl CipherSuite + 'static) -> Self {
        self.cipher = Box::new(cipher);
        self
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    /// The role this relay is currently tagged with. A debugging aid
    /// only (spec §4.3, §9): dispatch never consults it.
    pub async fn role(&self) -> RelayRole {
        *self.role.read().await
    }

    pub async fn set_role(&self, role: RelayRole) {
        *self.role.write().await = role;
    }

    /// Bind, start accepting connections, and return a handle that can
    /// stop the relay gracefully.
    pub async fn start(self: Arc<Self>, config: &RelayConfig) -> Result<RelayHandle, RelayNetError> {
        let listener = transport::bind(&self.self_addr).await?;
        *self.state.write().await = LifecycleState::Listening;
        if let Some(role) = config.role_override {
            self.set_role(role).await;
        }
        info!(relay = %self.id, addr = %self.self_addr, role = %self.role().await, "relay listening");

        let (shutdown_tx, mut accept_shutdown_rx) = broadcast::channel(1);
        let handlers: Arc<Mutex<JoinSet<()>>> = Arc::new(Mutex::new(JoinSet::new()));
        let connect_timeout = transport::default_connect_timeout();
        let read_deadline = transport::default_read_deadline();

        let accept_task = {
            let relay = self.clone();
            let handlers = handlers.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = accept_shutdown_rx.recv() => break,
                        accepted = listener.accept() => {
                            match accepted {
                                Ok((stream, peer)) => {
                                    debug!(relay = %relay.id, %peer, "accepted connection");
                                    let relay = relay.clone();
                                    handlers.lock().await.spawn(async move {
                                        if let Err(e) =
                                            relay.handle_connection(stream, read_deadline, connect_timeout).await
                                        {
                                            warn!(relay = %relay.id, error = %e, "handler error");
                                        }
                                    });
                                }
                                // Accept errors while stopping are silent (spec §4.3); here they are
                                // simply logged, since the listener is torn down by dropping it below.
                                Err(e) => debug!(relay = %relay.id, error = %e, "accept error"),
                            }
                        }
                    }
                }
            })
        };

        let cover_task = if config.enable_random_traffic {
            Some(cover::spawn(
                self.self_addr.clone(),
                config.known_endpoints(),
                Duration::from_secs(config.random_traffic_interval_sec),
                connect_timeout,
                shutdown_tx.subscribe(),
            ))
        } else {
            None
        };

        Ok(RelayHandle {
            relay: self,
            shutdown_tx,
            accept_task,
            cover_task,
            handlers,
        })
    }

    async fn handle_connection(
        &self,
        mut stream: TcpStream,
        read_deadline: Duration,
        connect_timeout: Duration,
    ) -> Result<(), RelayNetError> {
        let Some(cell) = transport::read_cell(&mut stream, read_deadline).await? else {
            // Peer closed without sending a cell: an empty connection, not an error (spec §4.2).
            return Ok(());
        };
        drop(stream);
        self.route(cell, connect_timeout).await.map(|_| ())
    }

    /// Route one received cell per the dispatch table in spec §4.3.
    pub async fn route(
        &self,
        cell: RelayCell,
        connect_timeout: Duration,
    ) -> Result<RouteOutcome, RelayNetError> {
        if cover::is_cover_cell(&cell) {
            debug!(relay = %self.id, "dropped cover cell");
            return Ok(RouteOutcome::DroppedCover);
        }
        if cell.is_malformed() {
            warn!(relay = %self.id, "dropped malformed cell");
            return Ok(RouteOutcome::DroppedMalformed);
        }

        if cell.is_exit_request {
            self.respond_as_exit(cell, connect_timeout).await
        } else if cell.is_exit_response {
            self.continue_response(cell, connect_timeout).await
        } else if !cell.next_addr.is_empty() {
            self.forward_request(cell, connect_timeout).await
        } else {
            warn!(relay = %self.id, "dropped malformed cell: no forwarding instruction");
            Ok(RouteOutcome::DroppedMalformed)
        }
    }

    /// `is_exit_request` (spec §4.3 row 1): synthesize a response and send
    /// it back along the return leg recorded in `prev_addr`.
    async fn respond_as_exit(
        &self,
        cell: RelayCell,
        connect_timeout: Duration,
    ) -> Result<RouteOutcome, RelayNetError> {
        let plain = self.cipher.decrypt(&cell.payload).map_err(crypto_as_dial)?;
        info!(
            relay = %self.id,
            payload = %String::from_utf8_lossy(&plain),
            "acting as exit"
        );

        let Some((dial_target, remaining)) = path::pop_front(&cell.prev_addr) else {
            warn!(relay = %self.id, "exit request carried no return path");
            return Ok(RouteOutcome::DroppedMalformed);
        };

        let sealed = self
            .cipher
            .encrypt(&self.static_response_body)
            .map_err(crypto_as_dial)?;
        let response = RelayCell {
            prev_addr: remaining,
            next_addr: Endpoint::default(),
            payload: sealed,
            is_exit_request: false,
            is_exit_response: true,
        };
        transport::send_cell(&dial_target, &response, connect_timeout).await?;
        Ok(RouteOutcome::Responded { to: dial_target })
    }

    /// `is_exit_response` (spec §4.3 rows 2–3): continue stepping the
    /// response back along its return leg, or — once the breadcrumb is
    /// exhausted — this *is* the origin and the payload is delivered
    /// locally. In the ordinary protocol that terminal case belongs to
    /// the client's own listener ([`crate::client::Client`]), not a
    /// relay; it's handled here too for the degenerate loopback case.
    async fn continue_response(
        &self,
        cell: RelayCell,
        connect_timeout: Duration,
    ) -> Result<RouteOutcome, RelayNetError> {
        let plain = self.cipher.decrypt(&cell.payload).map_err(crypto_as_dial)?;

        let Some((dial_target, remaining)) = path::pop_front(&cell.prev_addr) else {
            return Ok(RouteOutcome::DeliveredLocally { payload: plain });
        };

        let sealed = self.cipher.encrypt(&plain).map_err(crypto_as_dial)?;
        let forwarded = RelayCell {
            prev_addr: remaining,
            next_addr: Endpoint::default(),
            payload: sealed,
            is_exit_request: false,
            is_exit_response: true,
        };
        transport::send_cell(&dial_target, &forwarded, connect_timeout).await?;
        Ok(RouteOutcome::Forwarded { to: dial_target })
    }

    /// Neither flag set, `next_addr` nonempty (spec §4.3 row 4): forward
    /// toward the next hop, rewriting `prev_addr` to our own endpoint so
    /// the return leg can retrace its steps (spec §4.5).
    async fn forward_request(
        &self,
        cell: RelayCell,
        connect_timeout: Duration,
    ) -> Result<RouteOutcome, RelayNetError> {
        let Some((dial_target, remaining)) = path::pop_front(&cell.next_addr) else {
            warn!(relay = %self.id, "dropped malformed cell: unparseable next_addr");
            return Ok(RouteOutcome::DroppedMalformed);
        };

        let plain = self.cipher.decrypt(&cell.payload).map_err(crypto_as_dial)?;
        let sealed = self.cipher.encrypt(&plain).map_err(crypto_as_dial)?;

        let is_exit_request = remaining.is_empty();
        let forwarded = RelayCell {
            prev_addr: path::prepend(&self.self_addr, &cell.prev_addr),
            next_addr: if is_exit_request { Endpoint::default() } else { remaining },
            payload: sealed,
            is_exit_request,
            is_exit_response: false,
        };
        transport::send_cell(&dial_target, &forwarded, connect_timeout).await?;
        Ok(RouteOutcome::Forwarded { to: dial_target })
    }
}

/// The encryption boundary's failure kind is `CryptoError` (spec §7), but
/// its disposition at the affected hop is the same as a dial failure: the
/// originator sees no response and the error is recovered locally, not a
/// relay crash.
fn crypto_as_dial(e: RelayNetError) -> RelayNetError {
    match e {
        RelayNetError::Crypto(msg) => RelayNetError::dial(format!("encryption boundary: {msg}")),
        other => other,
    }
}

/// A handle returned by [`Relay::start`]; owns the shutdown signal and
/// the set of in-flight handlers so `stop` can drain them (spec §4.3,
/// §5).
pub struct RelayHandle {
    pub relay: Arc<Relay>,
    shutdown_tx: broadcast::Sender<()>,
    accept_task: JoinHandle<()>,
    cover_task: Option<JoinHandle<()>>,
    handlers: Arc<Mutex<JoinSet<()>>>,
}

impl RelayHandle {
    /// Unblock the accept loop, close the listener, wait for every
    /// in-flight handler to finish, and transition to `Stopped`.
    pub async fn stop(self) -> Result<(), RelayNetError> {
        *self.relay.state.write().await = LifecycleState::Stopping;
        let _ = self.shutdown_tx.send(());

        let _ = self.accept_task.await;
        if let Some(cover_task) = self.cover_task {
            let _ = cover_task.await;
        }

        let mut handlers = self.handlers.lock().await;
        while handlers.join_next().await.is_some() {}

        *self.relay.state.write().await = LifecycleState::Stopped;
        info!(relay = %self.relay.id, "relay stopped");
        Ok(())
    }
}
