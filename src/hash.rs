//! Keyed hash primitives over SHA-256.
//!
//! Every hash flavour is domain-separated by a 32-byte `toByte(tag, 32)`
//! prefix: 0 for the chain hash `F`, 1 for the node hash `H`, 2 for the
//! message hash and 3 for the PRF.

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::address::Address;
use crate::params::N;

const PADDING_F: u8 = 0;
const PADDING_H: u8 = 1;
const PADDING_HASH: u8 = 2;
const PADDING_PRF: u8 = 3;

fn padding(tag: u8) -> [u8; N] {
    let mut out = [0u8; N];
    out[N - 1] = tag;
    out
}

pub(crate) fn xor(a: &[u8; N], b: &[u8; N]) -> [u8; N] {
    core::array::from_fn(|i| a[i] ^ b[i])
}

/// F: single-block keyed hash used by the WOTS+ chain function.
pub(crate) fn hash_f(key: &[u8; N], msg: &[u8; N]) -> [u8; N] {
    let mut hasher = Sha256::new();
    hasher.update(padding(PADDING_F));
    hasher.update(key);
    hasher.update(msg);
    hasher.finalize().into()
}

/// H: keyed compression of two sibling nodes.
pub(crate) fn hash_h(key: &[u8; N], left: &[u8; N], right: &[u8; N]) -> [u8; N] {
    let mut hasher = Sha256::new();
    hasher.update(padding(PADDING_H));
    hasher.update(key);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// H_msg: hashes a message under the `r ‖ root ‖ padded index` prefix.
pub(crate) fn hash_msg(prefix: &[u8; 3 * N], msg: &[u8]) -> [u8; N] {
    let mut hasher = Sha256::new();
    hasher.update(padding(PADDING_HASH));
    hasher.update(prefix);
    hasher.update(msg);
    hasher.finalize().into()
}

/// A PRF bound to a fixed 32-byte seed.
#[derive(Clone)]
pub(crate) struct Prf {
    seed: [u8; N],
}

impl Prf {
    pub fn new(seed: [u8; N]) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> &[u8; N] {
        &self.seed
    }

    fn sum_bytes(&self, input: &[u8; N]) -> [u8; N] {
        let mut hasher = Sha256::new();
        hasher.update(padding(PADDING_PRF));
        hasher.update(self.seed);
        hasher.update(input);
        hasher.finalize().into()
    }

    /// Keyed output for a hash address.
    pub fn sum(&self, adrs: &Address) -> [u8; N] {
        self.sum_bytes(&adrs.to_bytes())
    }

    /// Keyed output for a 32-bit integer, zero-extended into the 32-byte
    /// input slot.
    pub fn sum_int(&self, val: u32) -> [u8; N] {
        let mut input = [0u8; N];
        input[N - 4..].copy_from_slice(&val.to_be_bytes());
        self.sum_bytes(&input)
    }
}

impl Zeroize for Prf {
    fn zeroize(&mut self) {
        self.seed.zeroize();
    }
}

impl Drop for Prf {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Randomised tree-node compression: masks both children with PRF-derived
/// bitmasks, then applies `H` under a PRF-derived key.
///
/// The address must already carry type, height and index; takes the address
/// by value since it is mutated for the key/mask selector.
pub(crate) fn rand_hash(left: &[u8; N], right: &[u8; N], prf: &Prf, mut adrs: Address) -> [u8; N] {
    adrs.set_key_and_mask(0);
    let key = prf.sum(&adrs);
    adrs.set_key_and_mask(1);
    let bm_left = prf.sum(&adrs);
    adrs.set_key_and_mask(2);
    let bm_right = prf.sum(&adrs);
    hash_h(&key, &xor(left, &bm_left), &xor(right, &bm_right))
}
