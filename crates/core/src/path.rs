//! Multi-hop routing lists folded into a single wire address field.
//!
//! The wire format's `next_addr`/`prev_addr` fields are each a single
//! endpoint (spec §3), and the base protocol's dispatch table (§4.3)
//! only ever forwards to the one endpoint a cell names. That is enough
//! for a two-hop circuit (entry dials exit directly) but not for a
//! longer one: nothing in the literal wire format lets an entry relay
//! tell a middle relay what comes after it, since relays hold no stored
//! circuit state (§3) and the cell carries no dedicated path-list field.
//!
//! This resolves the gap the same way the rest of the protocol already
//! works: by rewriting an address field at each hop. A relay's one
//! remaining forward leg, and the breadcrumb of hops already visited
//! that the response will retrace, are each packed into the existing
//! `next_addr`/`prev_addr` strings as a delimited list. A single-entry
//! list is byte-identical to a literal endpoint, so the two-hop case
//! (spec §8 S1) is unaffected; this only matters once a circuit has an
//! interior middle hop.

use relaynet_common::Endpoint;

const DELIM: char = ';';

/// Pack an ordered list of hops into one wire address field.
pub fn encode(hops: &[Endpoint]) -> Endpoint {
    Endpoint::new(
        hops.iter()
            .map(Endpoint::as_str)
            .collect::<Vec<_>>()
            .join(&DELIM.to_string()),
    )
}

/// Unpack a wire address field into its constituent hops. An empty field
/// decodes to an empty list.
pub fn decode(addr: &Endpoint) -> Vec<Endpoint> {
    if addr.is_empty() {
        return Vec::new();
    }
    addr.as_str().split(DELIM).map(Endpoint::new).collect()
}

/// Split the first hop off an encoded list, returning it alongside the
/// remainder re-encoded for the next hop to pop in turn. `None` if the
/// field decodes to an empty list.
pub fn pop_front(addr: &Endpoint) -> Option<(Endpoint, Endpoint)> {
    let mut hops = decode(addr);
    if hops.is_empty() {
        return None;
    }
    let first = hops.remove(0);
    Some((first, encode(&hops)))
}

/// Prepend a hop to an already-encoded list. Used on the forward leg to
/// grow the return-routing breadcrumb by one hop at a time.
pub fn prepend(hop: &Endpoint, addr: &Endpoint) -> Endpoint {
    let mut hops = vec![hop.clone()];
    hops.extend(decode(addr));
    encode(&hops)
}
