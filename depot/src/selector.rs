//! SRV-style weighted backend ordering.
//!
//! Implements the target-selection algorithm of RFC 2782 over configured
//! backends: strictly ascending priority, weighted-random order within a
//! priority tier. Every invocation produces a fresh permutation, so
//! repeated route operations rebalance load across equal backends over
//! time.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;

use crate::config::BackendDescriptor;

/// Produce a candidate ordering for one route operation.
///
/// Descriptors are grouped into tiers by `priority` (lower value first).
/// Within a tier, entries are drawn one at a time without replacement:
/// a uniform integer in `[0, remaining weight sum]` is drawn, the tier is
/// walked in its original relative order accumulating weights, and the
/// first entry whose cumulative weight reaches the draw is selected.
///
/// A tier whose weights are all zero collapses the draw range to `[0, 0]`
/// and drains in original relative order.
///
/// The caller supplies the RNG; production code passes [`rand::rng`], and
/// tests a seeded [`rand::rngs::StdRng`].
pub fn order_backends<R: Rng + ?Sized>(
    backends: &[Arc<BackendDescriptor>],
    rng: &mut R,
) -> Vec<Arc<BackendDescriptor>> {
    let mut tiers: BTreeMap<u32, Vec<Arc<BackendDescriptor>>> = BTreeMap::new();
    for backend in backends {
        tiers
            .entry(backend.priority)
            .or_default()
            .push(Arc::clone(backend));
    }

    let mut ordered = Vec::with_capacity(backends.len());
    for (_, mut tier) in tiers {
        // u64 accumulator: a full tier of u32::MAX weights cannot overflow
        let mut sum: u64 = tier.iter().map(|b| u64::from(b.weight)).sum();
        while !tier.is_empty() {
            let draw = rng.random_range(0..=sum);
            let mut acc = 0u64;
            let mut pick = tier.len() - 1;
            for (idx, backend) in tier.iter().enumerate() {
                acc += u64::from(backend.weight);
                if acc >= draw {
                    pick = idx;
                    break;
                }
            }
            let chosen = tier.remove(pick);
            sum -= u64::from(chosen.weight);
            ordered.push(chosen);
        }
    }
    ordered
}
