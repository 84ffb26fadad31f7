//! WOTS+ one-time signatures over a 256-bit message digest, and the L-tree
//! compressing a one-time public key into a single tree leaf.

use crate::address::Address;
use crate::hash::{Prf, hash_f, rand_hash, xor};
use crate::params::{N, WOTS_LEN, WOTS_LEN1, WOTS_W};

/// The `wlen` chain values making up a WOTS+ key or signature.
pub(crate) type Chains = Vec<[u8; N]>;

/// Derives the per-leaf private chains.
///
/// The address must carry layer, tree and OTS leaf index. A per-leaf seed is
/// drawn from the key's WOTS+ PRF, then each chain start is drawn from a PRF
/// bound to that seed.
pub(crate) fn derive_private(wots_prf: &Prf, adrs: &Address) -> Chains {
    let leaf_seed = Prf::new(wots_prf.sum(adrs));
    (0..WOTS_LEN).map(|i| leaf_seed.sum_int(i as u32)).collect()
}

/// Applies `steps` iterations of the chain function to `x`, starting at
/// position `start`. Key and bitmask are re-derived from the public-seed PRF
/// at every step.
fn chain(x: &[u8; N], start: u32, steps: u32, pub_prf: &Prf, mut adrs: Address) -> [u8; N] {
    let mut out = *x;
    for i in start..(start + steps).min(WOTS_W) {
        adrs.set_hash(i);
        adrs.set_key_and_mask(0);
        let key = pub_prf.sum(&adrs);
        adrs.set_key_and_mask(1);
        let bitmask = pub_prf.sum(&adrs);
        out = hash_f(&key, &xor(&out, &bitmask));
    }
    out
}

/// Splits a digest into 64 base-16 message digits followed by 3 checksum
/// digits.
///
/// The checksum is left-shifted into the top of a two-byte big-endian value;
/// its top nibble is dropped and the low twelve bits supply the three digits.
fn chain_lengths(digest: &[u8; N]) -> [u8; WOTS_LEN] {
    let mut lengths = [0u8; WOTS_LEN];
    for (i, byte) in digest.iter().enumerate() {
        lengths[2 * i] = byte >> 4;
        lengths[2 * i + 1] = byte & 0x0f;
    }

    let mut csum: u16 = 0;
    for digit in &lengths[..WOTS_LEN1] {
        csum += u16::from((WOTS_W - 1) as u8 - digit);
    }
    csum <<= 4;
    lengths[WOTS_LEN1] = ((csum >> 8) & 0x0f) as u8;
    lengths[WOTS_LEN1 + 1] = ((csum >> 4) & 0x0f) as u8;
    lengths[WOTS_LEN1 + 2] = (csum & 0x0f) as u8;
    lengths
}

/// Computes the public chain ends from a private key.
pub(crate) fn public_from_private(sk: &Chains, pub_prf: &Prf, adrs: Address) -> Chains {
    let mut adrs = adrs;
    sk.iter()
        .enumerate()
        .map(|(i, x)| {
            adrs.set_chain(i as u32);
            chain(x, 0, WOTS_W - 1, pub_prf, adrs)
        })
        .collect()
}

/// Signs a message digest: advances each chain by its digit.
pub(crate) fn sign(digest: &[u8; N], sk: &Chains, pub_prf: &Prf, adrs: Address) -> Chains {
    let lengths = chain_lengths(digest);
    let mut adrs = adrs;
    sk.iter()
        .zip(lengths)
        .enumerate()
        .map(|(i, (x, digit))| {
            adrs.set_chain(i as u32);
            chain(x, 0, u32::from(digit), pub_prf, adrs)
        })
        .collect()
}

/// Recovers the public chain ends from a signature and the signed digest.
pub(crate) fn public_from_sig(sig: &Chains, digest: &[u8; N], pub_prf: &Prf, adrs: Address) -> Chains {
    let lengths = chain_lengths(digest);
    let mut adrs = adrs;
    sig.iter()
        .zip(lengths)
        .enumerate()
        .map(|(i, (x, digit))| {
            adrs.set_chain(i as u32);
            let digit = u32::from(digit);
            chain(x, digit, WOTS_W - 1 - digit, pub_prf, adrs)
        })
        .collect()
}

/// Folds the chain ends of a WOTS+ public key into a single leaf node.
///
/// The address must carry the L-tree type and leaf index. An odd node at the
/// end of a level is promoted unchanged to the next level.
pub(crate) fn ltree(mut chains: Chains, pub_prf: &Prf, mut adrs: Address) -> [u8; N] {
    let mut l = chains.len();
    let mut height = 0u32;
    adrs.set_tree_height(height);
    while l > 1 {
        for i in 0..l / 2 {
            adrs.set_tree_index(i as u32);
            chains[i] = rand_hash(&chains[2 * i], &chains[2 * i + 1], pub_prf, adrs);
        }
        if l & 1 == 1 {
            chains[l / 2] = chains[l - 1];
        }
        l = l.div_ceil(2);
        height += 1;
        adrs.set_tree_height(height);
    }
    chains[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ADDR_TYPE_LTREE;

    fn test_address() -> Address {
        let mut adrs = Address::new();
        adrs.set_layer(0);
        adrs.set_tree(0);
        adrs.set_ots(5);
        adrs
    }

    #[test]
    fn checksum_digits() {
        // All-zero digest: 64 zero digits, checksum 64 * 15 = 960 = 0x3C0,
        // shifted left a nibble gives digits (12, 0, 0).
        let lengths = chain_lengths(&[0u8; N]);
        assert!(lengths[..WOTS_LEN1].iter().all(|&d| d == 0));
        assert_eq!(&lengths[WOTS_LEN1..], &[12, 0, 0]);

        // All-ones digest: 64 digits of 15, checksum 0.
        let lengths = chain_lengths(&[0xff; N]);
        assert!(lengths[..WOTS_LEN1].iter().all(|&d| d == 15));
        assert_eq!(&lengths[WOTS_LEN1..], &[0, 0, 0]);
    }

    #[test]
    fn digits_come_from_nibbles() {
        let mut digest = [0u8; N];
        digest[0] = 0xA7;
        let lengths = chain_lengths(&digest);
        assert_eq!(lengths[0], 0xA);
        assert_eq!(lengths[1], 0x7);
    }

    #[test]
    fn signature_recovers_public_key() {
        let wots_prf = Prf::new([0x11; N]);
        let pub_prf = Prf::new([0x22; N]);
        let adrs = test_address();

        let sk = derive_private(&wots_prf, &adrs);
        let pk = public_from_private(&sk, &pub_prf, adrs);

        let digest: [u8; N] = core::array::from_fn(|i| (i * 7) as u8);
        let sig = sign(&digest, &sk, &pub_prf, adrs);
        let recovered = public_from_sig(&sig, &digest, &pub_prf, adrs);
        assert_eq!(pk, recovered);

        // A different digest recovers a different key.
        let mut other = digest;
        other[0] ^= 1;
        assert_ne!(public_from_sig(&sig, &other, &pub_prf, adrs), pk);
    }

    #[test]
    fn ltree_folds_to_one_node() {
        let pub_prf = Prf::new([0x33; N]);
        let mut adrs = test_address();
        adrs.set_type(ADDR_TYPE_LTREE);
        adrs.set_ltree(5);

        let chains: Chains = (0..WOTS_LEN)
            .map(|i| core::array::from_fn(|j| (i + j) as u8))
            .collect();
        let leaf = ltree(chains.clone(), &pub_prf, adrs);

        // Deterministic, and sensitive to any single chain value.
        assert_eq!(leaf, ltree(chains.clone(), &pub_prf, adrs));
        let mut tweaked = chains;
        tweaked[WOTS_LEN - 1][0] ^= 1;
        assert_ne!(leaf, ltree(tweaked, &pub_prf, adrs));
    }
}
