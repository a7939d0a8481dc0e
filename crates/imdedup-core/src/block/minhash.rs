//! MinHash signatures and LSH banding
//!
//! Shingle hashing goes through SHA-256 so signatures do not depend on the
//! process hasher; permutations are multiply-shift functions derived from
//! the configured seed. Identical text always yields identical band keys.

use sha2::{Digest, Sha256};

use crate::config::LshParams;

/// Character k-shingles of a string.
pub fn shingles(text: &str, k: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < k {
        return Vec::new();
    }
    chars.windows(k).map(|w| w.iter().collect()).collect()
}

/// 64-bit shingle hash, stable across platforms and runs.
fn shingle_hash(shingle: &str) -> u64 {
    let digest = Sha256::digest(shingle.as_bytes());
    u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ])
}

/// splitmix64, used to expand the seed into permutation parameters.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// MinHash signature generator with LSH banding.
pub struct MinHasher {
    k: usize,
    bands: usize,
    rows: usize,
    /// Multiply-shift coefficients, one `(a, b)` pair per permutation.
    coefficients: Vec<(u64, u64)>,
}

impl MinHasher {
    pub fn new(params: &LshParams) -> Self {
        let mut state = params.seed;
        let coefficients = (0..params.num_perm)
            .map(|_| {
                // `a` must be odd for multiply-shift to permute well.
                let a = splitmix64(&mut state) | 1;
                let b = splitmix64(&mut state);
                (a, b)
            })
            .collect();
        Self {
            k: params.k,
            bands: params.bands,
            rows: params.rows,
            coefficients,
        }
    }

    /// MinHash signature of the text, one minimum per permutation.
    /// Empty when the text is too short to shingle.
    pub fn signature(&self, text: &str) -> Vec<u64> {
        let hashes: Vec<u64> = shingles(text, self.k)
            .iter()
            .map(|s| shingle_hash(s))
            .collect();
        if hashes.is_empty() {
            return Vec::new();
        }

        self.coefficients
            .iter()
            .map(|(a, b)| {
                hashes
                    .iter()
                    .map(|h| a.wrapping_mul(*h).wrapping_add(*b))
                    .min()
                    .unwrap_or(u64::MAX)
            })
            .collect()
    }

    /// One key per LSH band; any shared key makes two records candidates.
    pub fn band_keys(&self, text: &str) -> Vec<String> {
        let signature = self.signature(text);
        if signature.is_empty() {
            return Vec::new();
        }

        (0..self.bands)
            .map(|band| {
                let start = band * self.rows;
                let mut hasher = Sha256::new();
                for value in &signature[start..start + self.rows] {
                    hasher.update(value.to_be_bytes());
                }
                let digest = hasher.finalize();
                format!("b{band}:{:016x}", u64::from_be_bytes([
                    digest[0], digest[1], digest[2], digest[3],
                    digest[4], digest[5], digest[6], digest[7],
                ]))
            })
            .collect()
    }
}
