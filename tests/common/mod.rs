// Shared helpers for integration tests: deterministic random texts and
// queries derived from them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random text over the first `alphabet` letters starting at 'A'.
pub fn rand_text(len: usize, alphabet: u8, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| b'A' + rng.gen_range(0..alphabet)).collect()
}

/// Queries cut from the text, with roughly one byte in ten corrupted so that
/// some matches need their mismatch budget.
pub fn rand_queries(text: &[u8], count: usize, len: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let start = rng.gen_range(0..=text.len().saturating_sub(len));
            text[start..start + len]
                .iter()
                .map(|&b| if rng.gen_bool(0.1) { b'-' } else { b })
                .collect()
        })
        .collect()
}
