mod builder;
mod types;

pub use builder::{build_circuit, build_circuit_excluding};
pub use types::{Circuit, CircuitHop};
