//! Random number generation for parameter initialisation.
//!
//! Components draw their initial parameters from a `StdRng`. A `seed=` key in
//! the config line makes that draw reproducible; without one the generator is
//! seeded from the operating system.

use crate::config::ConfigLine;
use crate::error::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Generator for an explicit seed, or an OS-seeded one.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Consumes the optional `seed` key and builds the matching generator.
pub fn rng_from_config(cfg: &mut ConfigLine) -> Result<StdRng> {
    Ok(rng_from_seed(cfg.get_u64("seed")?))
}
