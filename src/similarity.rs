// src/similarity.rs
//! Jaccard similarity over keyword sets.

use std::collections::BTreeSet;

/// |a ∩ b| / |a ∪ b| in `[0.0, 1.0]`.
///
/// An empty set on either side is "no evidence" and scores 0.0.
pub fn similarity<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(b).count();
    // |a ∪ b| = |a| + |b| - |a ∩ b|
    let union = a.len() + b.len() - intersection;

    intersection as f64 / union as f64
}
