//! Weighted reservoir sampling without replacement (A-ExpJ).
//!
//! Selects `k` distinct indices from `0..n` with inclusion probabilities
//! following the Efraimidis–Spirakis scheme: every candidate gets a key
//! `u^(1/w)` and the `k` largest keys win. The exponential-jump variant draws a
//! random amount of weight to skip instead of a key per candidate, so the
//! expected number of random draws is O(k · log(n / k)).
//!
//! Keys are kept in log space (`ln(u) / w`) which preserves their order while
//! avoiding underflow for small weights.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::Rng;

/// Candidate index with its log-space key.
#[derive(Clone, Copy, Debug)]
struct KeyedIndex {
    log_key: f64,
    index: usize,
}

// Reversed ordering: the heap top is the weakest retained candidate.
impl Ord for KeyedIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .log_key
            .total_cmp(&self.log_key)
            .then_with(|| self.index.cmp(&other.index))
    }
}

impl PartialOrd for KeyedIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyedIndex {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyedIndex {}

/// Reusable weighted reservoir sampler.
///
/// Holds the heap buffer so that repeated calls (one per active agent per
/// iteration) do not reallocate.
#[derive(Clone, Debug, Default)]
pub struct ReservoirSampler {
    heap: BinaryHeap<KeyedIndex>,
}

#[inline]
fn is_selectable(weight: f64) -> bool {
    // Also rejects NaN
    weight > 0.0
}

/// Uniform draw on (0, 1].
#[inline]
fn open_unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    1.0 - rng.gen::<f64>()
}

impl ReservoirSampler {
    /// Create an empty sampler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw up to `k` distinct indices from `0..n` weighted by `weight`.
    ///
    /// Candidates with zero, negative, or NaN weight are never selected. When
    /// fewer than `k` candidates are selectable, all of them are returned.
    /// Results are written to `selected` (cleared first) in descending key
    /// order.
    ///
    /// # Arguments
    /// * `k` - Number of indices to draw
    /// * `n` - Number of candidates
    /// * `weight` - Non-negative weight for each candidate index
    /// * `selected` - Output buffer
    /// * `rng` - Random source
    pub fn sample<F, R>(
        &mut self,
        k: usize,
        n: usize,
        mut weight: F,
        selected: &mut Vec<usize>,
        rng: &mut R,
    ) where
        F: FnMut(usize) -> f64,
        R: Rng + ?Sized,
    {
        selected.clear();
        self.heap.clear();

        if k == 0 {
            return;
        }

        // Fill the reservoir with the first k selectable candidates
        let mut idx = 0;
        while idx < n && self.heap.len() < k {
            let w = weight(idx);
            if is_selectable(w) {
                self.heap.push(KeyedIndex {
                    log_key: open_unit(rng).ln() / w,
                    index: idx,
                });
            }
            idx += 1;
        }

        if self.heap.len() == k {
            self.jump_through(idx, n, &mut weight, rng);
        }

        let mut retained: Vec<KeyedIndex> = self.heap.drain().collect();
        // Ord is reversed, so ascending order is descending key
        retained.sort_unstable();
        selected.extend(retained.iter().map(|item| item.index));
    }

    /// Exponential jumps over the remaining candidates `start..n`.
    fn jump_through<F, R>(&mut self, start: usize, n: usize, weight: &mut F, rng: &mut R)
    where
        F: FnMut(usize) -> f64,
        R: Rng + ?Sized,
    {
        let mut threshold = self.weakest_log_key();
        let mut remaining = open_unit(rng).ln() / threshold;

        for idx in start..n {
            // A key of exactly 1 (infinite weight) cannot be beaten
            if threshold >= 0.0 {
                break;
            }

            let w = weight(idx);
            if !is_selectable(w) {
                continue;
            }

            remaining -= w;
            if remaining <= 0.0 {
                // Key conditioned on beating the current threshold
                let t = (w * threshold).exp();
                let r = t + (1.0 - t) * open_unit(rng);

                self.heap.pop();
                self.heap.push(KeyedIndex {
                    log_key: r.ln() / w,
                    index: idx,
                });

                threshold = self.weakest_log_key();
                remaining = open_unit(rng).ln() / threshold;
            }
        }
    }

    fn weakest_log_key(&self) -> f64 {
        self.heap
            .peek()
            .map(|item| item.log_key)
            .unwrap_or(f64::NEG_INFINITY)
    }
}

/// One-shot convenience wrapper around [`ReservoirSampler::sample`].
pub fn reservoir_sampling_a_expj<F, R>(
    k: usize,
    n: usize,
    weight: F,
    selected: &mut Vec<usize>,
    rng: &mut R,
) where
    F: FnMut(usize) -> f64,
    R: Rng + ?Sized,
{
    ReservoirSampler::new().sample(k, n, weight, selected, rng);
}
