//! Deterministic random number generation for synthetic corpora.
//!
//! RULE: the corpus generator never calls a platform RNG.
//! Every stream is derived from one master seed and a stable slot
//! index, so the same seed always produces the same corpus.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

pub struct CorpusRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl CorpusRng {
    /// The slot index must never change once assigned.
    pub fn new(master_seed: u64, slot_index: u64) -> Self {
        let derived_seed = master_seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn for_slot(master_seed: u64, slot: RngSlot) -> Self {
        let mut rng = Self::new(master_seed, slot as u64);
        rng.name = slot.name();
        rng
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    pub fn next_u64(&mut self) -> u64 {
        use rand::RngCore;
        self.inner.next_u64()
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        use rand::RngCore;
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Roll an i64 in [lo, hi].
    pub fn range_i64(&mut self, lo: i64, hi: i64) -> i64 {
        lo + self.next_u64_below((hi - lo + 1) as u64) as i64
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Approximately normal sample (Irwin-Hall, 12 uniforms).
    pub fn normal(&mut self, mean: f64, std: f64) -> f64 {
        let sum: f64 = (0..12).map(|_| self.next_f64()).sum();
        mean + (sum - 6.0) * std
    }
}

/// Stable stream assignments.
/// NEVER reorder or remove entries; only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum RngSlot {
    Matches = 0,
    Flags = 1,
    Actions = 2,
    Ratings = 3,
}

impl RngSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Matches => "matches",
            Self::Flags => "flags",
            Self::Actions => "actions",
            Self::Ratings => "ratings",
        }
    }
}
