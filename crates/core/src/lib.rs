pub mod cell;
pub mod circuit;
pub mod client;
pub mod cover;
pub mod crypto;
pub mod path;
pub mod relay;
pub mod rng;
pub mod transport;

pub use cell::RelayCell;
pub use circuit::{build_circuit, build_circuit_excluding, Circuit, CircuitHop};
pub use client::Client;
pub use crypto::{CipherSuite, EphemeralKeyPair, IdentityCipher, SimulatedRemoteCipher};
pub use relay::{LifecycleState, Relay, RelayHandle, RouteOutcome};
