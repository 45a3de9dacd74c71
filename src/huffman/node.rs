//! The Huffman tree: a strict binary tree of inner nodes and leaves, built
//! once per member file from its byte-frequency table.

/// A node in a static Huffman tree.
///
/// There are no ownership cycles: each inner node exclusively owns its two
/// children, so ordinary recursive `Drop` is sufficient (unlike the original
/// C implementation's explicit `node_delete` visitor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf { value: u8, count: u64 },
    Inner { left: Box<Node>, right: Box<Node>, count: u64, bit_count: u64 },
}

impl Node {
    pub fn count(&self) -> u64 {
        match self {
            Node::Leaf { count, .. } => *count,
            Node::Inner { count, .. } => *count,
        }
    }

    /// Weighted external path length of the subtree rooted here: the number
    /// of payload bits needed to encode every occurrence of every symbol
    /// under this node. Zero for leaves.
    pub fn bit_count(&self) -> u64 {
        match self {
            Node::Leaf { .. } => 0,
            Node::Inner { bit_count, .. } => *bit_count,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

fn combine(left: Node, right: Node) -> Node {
    let count = left.count() + right.count();
    let bit_count = (left.bit_count() + left.count()) + (right.bit_count() + right.count());
    Node::Inner { left: Box::new(left), right: Box::new(right), count, bit_count }
}

/// Builds a static Huffman tree from a 256-entry frequency table.
///
/// Leaves are materialised for every symbol with `count > 0`; if fewer than
/// two such symbols occur, synthetic zero-count leaves with value `0` are
/// appended until there are at least two, guaranteeing an inner node (and
/// therefore a non-empty code) exists even for a single-symbol or empty
/// input. The two lowest-weight nodes are then repeatedly combined — ties
/// broken by a stable sort, so nodes already present are consumed ahead of
/// nodes inserted after them — until one root remains.
pub fn build_tree(freq: &[u64; 256]) -> Node {
    let mut pool: Vec<Node> = (0u16..256)
        .filter_map(|v| {
            let v = v as u8;
            let count = freq[v as usize];
            (count > 0).then_some(Node::Leaf { value: v, count })
        })
        .collect();

    while pool.len() < 2 {
        pool.push(Node::Leaf { value: 0, count: 0 });
    }

    while pool.len() > 1 {
        // Stable descending sort: equal-count nodes keep their relative
        // insertion order, so the two lowest-weight nodes always sit at the
        // tail and ties are resolved by "earlier insertions consumed first".
        pool.sort_by(|a, b| b.count().cmp(&a.count()));
        let lowest = pool.pop().expect("pool has >= 2 nodes");
        let second_lowest = pool.pop().expect("pool has >= 1 node left");
        pool.push(combine(second_lowest, lowest));
    }

    pool.pop().expect("pool never empties below one root")
}

/// Number of leaves in the alphabet after degenerate-alphabet filler has
/// been applied (`L_final` in the core spec, used to pre-size the serialised
/// tree without walking it).
pub fn leaf_count(freq: &[u64; 256]) -> usize {
    let real = freq.iter().filter(|&&c| c > 0).count();
    real.max(2)
}

/// Size in bits of the serialised tree for a given final leaf count:
/// `L_final * 9 + (L_final - 1)`.
pub fn serialized_tree_bits(final_leaf_count: usize) -> u64 {
    final_leaf_count as u64 * 9 + (final_leaf_count as u64 - 1)
}
