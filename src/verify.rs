//! Hamming verification of candidate positions.
//!
//! The filtering index only proposes candidates; every reported match is
//! confirmed here by counting byte mismatches against the full query. On
//! x86_64 with AVX2 the comparison runs 32 bytes per step; everything else
//! uses the portable scalar loop. The capability probe runs once per process
//! and is cached.

use std::sync::OnceLock;

/// Verification kernel selected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdLevel {
    /// Portable byte-at-a-time loop.
    Scalar,
    /// 256-bit compare/movemask/popcount loop (x86_64 only).
    #[cfg(target_arch = "x86_64")]
    Avx2,
}

static SIMD_LEVEL: OnceLock<SimdLevel> = OnceLock::new();

/// Probes CPU features once and caches the result.
///
/// `SEED_SIEVE_FORCE_SCALAR=1` skips the probe and pins the scalar kernel
/// (useful for testing kernel parity).
pub fn simd_level() -> SimdLevel {
    *SIMD_LEVEL.get_or_init(|| {
        if std::env::var("SEED_SIEVE_FORCE_SCALAR").map(|v| v == "1").unwrap_or(false) {
            log::info!("SEED_SIEVE_FORCE_SCALAR=1: using scalar verification");
            return SimdLevel::Scalar;
        }
        #[cfg(target_arch = "x86_64")]
        if is_x86_feature_detected!("avx2") {
            log::debug!("AVX2 detected: using 256-bit verification");
            return SimdLevel::Avx2;
        }
        SimdLevel::Scalar
    })
}

/// Does `text[pos..pos + query.len()]` lie within Hamming distance `k` of
/// `query`?
///
/// Out-of-bounds positions are not an error, they are simply not a match.
/// A budget of `query.len()` or more always matches in bounds. The counting
/// loop short-circuits as soon as the budget is exceeded.
pub fn verify(text: &[u8], pos: usize, query: &[u8], k: usize) -> bool {
    let Some(end) = pos.checked_add(query.len()) else {
        return false;
    };
    if end > text.len() {
        return false;
    }
    let window = &text[pos..end];

    match simd_level() {
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Avx2 => unsafe { verify_avx2(window, query, k) },
        SimdLevel::Scalar => verify_scalar(window, query, k),
    }
}

/// Portable mismatch count with early exit.
pub(crate) fn verify_scalar(window: &[u8], query: &[u8], k: usize) -> bool {
    let mut budget = k;
    for (&t, &q) in window.iter().zip(query) {
        if t != q {
            if budget == 0 {
                return false;
            }
            budget -= 1;
        }
    }
    true
}

/// 32 bytes per step: compare for equality, movemask the equality vector,
/// and popcount the inverted mask to count mismatching lanes. The sub-32
/// tail falls back to the scalar loop with the remaining budget.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
pub(crate) unsafe fn verify_avx2(window: &[u8], query: &[u8], k: usize) -> bool {
    use std::arch::x86_64::{__m256i, _mm256_cmpeq_epi8, _mm256_loadu_si256, _mm256_movemask_epi8};

    debug_assert_eq!(window.len(), query.len());
    let len = query.len();
    let mut mismatches = 0usize;
    let mut i = 0;

    while i + 32 <= len {
        let t = _mm256_loadu_si256(window.as_ptr().add(i) as *const __m256i);
        let q = _mm256_loadu_si256(query.as_ptr().add(i) as *const __m256i);
        let equal = _mm256_cmpeq_epi8(t, q);
        let mask = _mm256_movemask_epi8(equal) as u32;
        mismatches += (!mask).count_ones() as usize;
        if mismatches > k {
            return false;
        }
        i += 32;
    }

    verify_scalar(&window[i..], &query[i..], k - mismatches)
}
