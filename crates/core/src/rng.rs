//! Process-wide pseudorandom source, shared by circuit building and cover
//! traffic (spec §5). Seeded once from the system clock unless a caller
//! requests reproducibility via [`seed`].

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Mutex, OnceLock};

static SHARED_RNG: OnceLock<Mutex<StdRng>> = OnceLock::new();

fn shared() -> &'static Mutex<StdRng> {
    SHARED_RNG.get_or_init(|| Mutex::new(StdRng::from_entropy()))
}

/// Re-seed the process-wide RNG for reproducible runs. Must be called
/// before the first use of [`with_rng`] to take effect, since the RNG is
/// otherwise lazily seeded from entropy on first use.
pub fn seed(value: u64) {
    let rng = StdRng::seed_from_u64(value);
    match SHARED_RNG.set(Mutex::new(rng)) {
        Ok(()) => {}
        Err(_) => {
            // Already initialized: overwrite in place.
            *shared().lock().expect("rng mutex poisoned") = StdRng::seed_from_u64(value);
        }
    }
}

/// Run a closure with exclusive access to the shared RNG.
pub fn with_rng<R>(f: impl FnOnce(&mut StdRng) -> R) -> R {
    let mut guard = shared().lock().expect("rng mutex poisoned");
    f(&mut guard)
}
