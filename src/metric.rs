//! Distance-capable items stored in a [`BkTree`](crate::bktree::BkTree).

/// An item living in a discrete metric space.
///
/// `distance` must return 0 for an item compared with itself. Search pruning
/// is only exact when the distance also satisfies the triangle inequality;
/// the tree does not verify this.
pub trait Metric {
    /// Non-negative integer distance to `other`.
    fn distance(&self, other: &Self) -> u32;

    /// Identity of the item within a tree.
    fn name(&self) -> &str;
}

/// Hamming distance between two equal-length byte strings.
///
/// Extra trailing bytes in the longer input count as fully differing.
pub fn hamming(a: &[u8], b: &[u8]) -> u32 {
    let common: u32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum();
    let tail = a.len().abs_diff(b.len()) as u32 * 8;
    common + tail
}
