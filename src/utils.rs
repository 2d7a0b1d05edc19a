use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Reproducible stimulus source. The same seed yields the same traffic.
#[inline]
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Uniform value that fits in `width` bits.
#[inline]
pub fn rand_data(rng: &mut impl Rng, width: u8) -> u32 {
    if width >= 32 {
        rng.gen()
    } else {
        rng.gen_range(0..(1u32 << width))
    }
}

/// True with probability `p`.
#[inline]
pub fn chance(rng: &mut impl Rng, p: f64) -> bool {
    rng.gen::<f64>() < p
}
