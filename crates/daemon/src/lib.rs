//! Process wiring shared between the relay and client invocation modes.
//! The protocol itself lives in `relaynet-core`; this crate only owns
//! argument parsing, logging setup, and the top-level run loop.

pub mod logging;
pub mod run;

pub use run::{run_client, run_relay, Mode};
