//! Random path selection (spec §4.4).
//!
//! Uniformly shuffle the known relay set, take the first `L` entries, and
//! assign roles: first is entry, last is exit, interior is middle.

use super::types::{Circuit, CircuitHop};
use relaynet_common::config::routing::MIN_CIRCUIT_LENGTH;
use relaynet_common::{Endpoint, RelayNetError, RelayRole};

/// Build a circuit of length `length` from the known relay set `known`.
///
/// `length == 0` means "choose uniformly in `[2, known.len()]`".
pub fn build_circuit(known: &[Endpoint], length: usize) -> Result<Circuit, RelayNetError> {
    let length = resolve_length(known.len(), length)?;
    if length < MIN_CIRCUIT_LENGTH {
        return Err(RelayNetError::invalid_circuit(format!(
            "invalid path length: {length}"
        )));
    }
    if length > known.len() {
        return Err(RelayNetError::invalid_circuit(format!(
            "invalid path length: {length} exceeds known relay count {}",
            known.len()
        )));
    }

    let mut shuffled = known.to_vec();
    crate::rng::with_rng(|rng| {
        use rand::seq::SliceRandom;
        shuffled.shuffle(rng);
    });

    let chosen = shuffled.into_iter().take(length).collect::<Vec<_>>();
    Ok(assign_roles(chosen))
}

/// Build a circuit for an outbound request originated *by* a relay rather
/// than a fresh client (spec §4.4's gateway case): `current` and `final_hop`
/// are excluded from the middle-candidate pool, and the circuit always
/// terminates at `final_hop` regardless of the shuffle.
pub fn build_circuit_excluding(
    known: &[Endpoint],
    length: usize,
    current: &Endpoint,
    final_hop: &Endpoint,
) -> Result<Circuit, RelayNetError> {
    let length = resolve_length(known.len(), length)?;
    if length < MIN_CIRCUIT_LENGTH {
        return Err(RelayNetError::invalid_circuit(format!(
            "invalid path length: {length}"
        )));
    }

    let middle_pool: Vec<Endpoint> = known
        .iter()
        .filter(|ep| *ep != current && *ep != final_hop)
        .cloned()
        .collect();

    let wanted_middles = length.saturating_sub(1);
    let mut shuffled = middle_pool;
    crate::rng::with_rng(|rng| {
        use rand::seq::SliceRandom;
        shuffled.shuffle(rng);
    });

    // If exclusions exhausted the pool below what was wanted, reduce the
    // circuit length to what's available rather than fail outright.
    let actual_middles = wanted_middles.min(shuffled.len());
    let mut chosen: Vec<Endpoint> = shuffled.into_iter().take(actual_middles).collect();
    chosen.push(final_hop.clone());

    Ok(assign_roles(chosen))
}

fn resolve_length(known_count: usize, requested: usize) -> Result<usize, RelayNetError> {
    if requested == 0 {
        if known_count < MIN_CIRCUIT_LENGTH {
            return Err(RelayNetError::invalid_circuit(format!(
                "not enough known relays to build a circuit: {known_count}"
            )));
        }
        return Ok(crate::rng::with_rng(|rng| {
            use rand::Rng;
            rng.gen_range(MIN_CIRCUIT_LENGTH..=known_count)
        }));
    }
    Ok(requested)
}

fn assign_roles(path: Vec<Endpoint>) -> Circuit {
    let last = path.len() - 1;
    let hops = path
        .into_iter()
        .enumerate()
        .map(|(i, endpoint)| {
            // Check `last` first: a single-hop path (the gateway case's
            // fully-exhausted pool) must be tagged `Exit`, not `Entry`.
            let role = if i == last {
                RelayRole::Exit
            } else if i == 0 {
                RelayRole::Entry
            } else {
                RelayRole::Middle
            };
            CircuitHop { endpoint, role }
        })
        .collect();
    Circuit::new(hops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn known(n: usize) -> Vec<Endpoint> {
        (0..n)
            .map(|i| Endpoint::new(format!("127.0.0.1:{}", 9001 + i)))
            .collect()
    }

    #[test]
    fn rejects_length_below_two() {
        let err = build_circuit(&known(5), 1).unwrap_err();
        assert!(matches!(err, RelayNetError::InvalidCircuit(_)));
    }

    #[test]
    fn assigns_entry_middle_exit_roles() {
        let circuit = build_circuit(&known(5), 3).unwrap();
        assert_eq!(circuit.len(), 3);
        assert_eq!(circuit.entry().role, RelayRole::Entry);
        assert_eq!(circuit.exit().role, RelayRole::Exit);
        assert_eq!(circuit.hops()[1].role, RelayRole::Middle);
    }

    #[test]
    fn two_hop_circuit_has_no_middles() {
        let circuit = build_circuit(&known(5), 2).unwrap();
        assert_eq!(circuit.len(), 2);
        assert_eq!(circuit.entry().role, RelayRole::Entry);
        assert_eq!(circuit.exit().role, RelayRole::Exit);
    }

    #[test]
    fn hops_are_distinct() {
        let circuit = build_circuit(&known(10), 5).unwrap();
        let unique: HashSet<_> = circuit.hops().iter().map(|h| h.endpoint.clone()).collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn zero_length_resolves_within_bounds() {
        for _ in 0..50 {
            let circuit = build_circuit(&known(6), 0).unwrap();
            assert!(circuit.len() >= 2 && circuit.len() <= 6);
        }
    }

    #[test]
    fn middle_position_distribution_is_roughly_uniform() {
        let candidates = known(6);
        let mut counts = vec![0u32; candidates.len()];

        for _ in 0..2000 {
            let circuit = build_circuit(&candidates, 3).unwrap();
            for hop in circuit.hops() {
                let idx = candidates.iter().position(|e| e == &hop.endpoint).unwrap();
                counts[idx] += 1;
            }
        }

        let max = *counts.iter().max().unwrap();
        let min = *counts.iter().min().unwrap();
        assert!(max < min * 3, "counts not roughly uniform: {counts:?}");
    }

    #[test]
    fn gateway_case_excludes_current_and_always_ends_at_final() {
        let candidates = known(6);
        let current = candidates[0].clone();
        let final_hop = candidates[1].clone();

        for _ in 0..20 {
            let circuit = build_circuit_excluding(&candidates, 3, &current, &final_hop).unwrap();
            assert_eq!(circuit.exit().endpoint, final_hop);
            assert!(circuit.hops().iter().all(|h| h.endpoint != current));
        }
    }

    #[test]
    fn gateway_case_shrinks_length_when_pool_exhausted() {
        let candidates = known(3);
        let current = candidates[0].clone();
        let final_hop = candidates[1].clone();

        // Only one non-excluded relay remains, so a requested length of 3
        // (2 middles + exit) shrinks to a 2-hop circuit.
        let circuit = build_circuit_excluding(&candidates, 3, &current, &final_hop).unwrap();
        assert_eq!(circuit.len(), 2);
        assert_eq!(circuit.exit().endpoint, final_hop);
    }

    #[test]
    fn gateway_case_fully_exhausted_pool_still_tags_exit_not_entry() {
        let candidates = known(2);
        let current = candidates[0].clone();
        let final_hop = candidates[1].clone();

        // current and final_hop are the only two known relays, so the
        // middle-candidate pool is empty and the circuit collapses to the
        // single hop `final_hop`. That sole hop must be Exit, not Entry.
        let circuit = build_circuit_excluding(&candidates, 3, &current, &final_hop).unwrap();
        assert_eq!(circuit.len(), 1);
        assert_eq!(circuit.exit().endpoint, final_hop);
        assert_eq!(circuit.exit().role, RelayRole::Exit);
        assert_eq!(circuit.hops()[0].role, RelayRole::Exit);
    }
}
