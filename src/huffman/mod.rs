//! Static Huffman coding: tree construction, serialisation, and the
//! per-symbol code table derived from it.

pub mod codec;
pub mod node;

pub use codec::Tree;
pub use node::{build_tree, leaf_count, serialized_tree_bits, Node};
