//! Hash addresses (ADRS) providing domain separation for every keyed hash.

pub(crate) const ADDR_TYPE_OTS: u32 = 0;
pub(crate) const ADDR_TYPE_LTREE: u32 = 1;
pub(crate) const ADDR_TYPE_HASHTREE: u32 = 2;

/// A 32-byte hash address: eight big-endian 32-bit words.
///
/// Word 0 is the layer, words 1-2 hold the 64-bit tree index, word 3 the
/// address type. Words 4-6 are type-dependent; word 7 selects between key
/// and bitmask derivation in `rand_hash`.
///
/// Addresses are mutated before almost every hash call and must therefore be
/// treated as values: copy on descent, never share a mutable address across
/// recursive calls or workers.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Address([u32; 8]);

impl Address {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_layer(&mut self, layer: u32) {
        self.0[0] = layer;
    }

    pub fn set_tree(&mut self, tree: u64) {
        self.0[1] = (tree >> 32) as u32;
        #[allow(clippy::cast_possible_truncation)]
        {
            self.0[2] = tree as u32;
        }
    }

    pub fn set_type(&mut self, type_val: u32) {
        self.0[3] = type_val;
    }

    /// OTS key pair index (type 0).
    pub fn set_ots(&mut self, ots: u32) {
        self.0[4] = ots;
    }

    /// Chain index within a WOTS+ key (type 0).
    pub fn set_chain(&mut self, chain: u32) {
        self.0[5] = chain;
    }

    /// Iteration index within a chain (type 0).
    pub fn set_hash(&mut self, hash: u32) {
        self.0[6] = hash;
    }

    /// Leaf index of the L-tree being compressed (type 1).
    pub fn set_ltree(&mut self, ltree: u32) {
        self.0[4] = ltree;
    }

    /// Node height within an L-tree or the main tree (types 1 and 2).
    pub fn set_tree_height(&mut self, height: u32) {
        self.0[5] = height;
    }

    /// Node index at that height (types 1 and 2).
    pub fn set_tree_index(&mut self, index: u32) {
        self.0[6] = index;
    }

    pub fn set_key_and_mask(&mut self, key_and_mask: u32) {
        self.0[7] = key_and_mask;
    }

    /// Serialises the address for use as PRF input.
    pub fn to_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.0) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        out
    }
}
