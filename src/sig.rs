//! Signature wire layout and root reconstruction.

use crate::address::{ADDR_TYPE_HASHTREE, ADDR_TYPE_LTREE, ADDR_TYPE_OTS, Address};
use crate::error::Error;
use crate::hash::{Prf, rand_hash};
use crate::params::{MAX_HEIGHT, N, WOTS_LEN, sig_len};
use crate::wots;

fn node(chunk: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(chunk);
    out
}

/// A parsed XMSS signature.
///
/// Wire layout (big-endian throughout):
/// `index:u32 ‖ r:[32] ‖ wots:[67][32] ‖ auth:[H][32]`,
/// `4 + 32·(68 + H)` bytes in total.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    index: u32,
    r: [u8; N],
    wots_sig: wots::Chains,
    auth: Vec<[u8; N]>,
}

impl Signature {
    pub(crate) fn new(index: u32, r: [u8; N], wots_sig: wots::Chains, auth: Vec<[u8; N]>) -> Self {
        Self {
            index,
            r,
            wots_sig,
            auth,
        }
    }

    /// Leaf index this signature was produced at.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Tree height of the producing key, implied by the authentication path.
    pub fn height(&self) -> u32 {
        self.auth.len() as u32
    }

    pub(crate) fn r(&self) -> &[u8; N] {
        &self.r
    }

    /// Serialises to the fixed-size wire layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(sig_len(self.height()));
        out.extend_from_slice(&self.index.to_be_bytes());
        out.extend_from_slice(&self.r);
        for chunk in self.wots_sig.iter().chain(&self.auth) {
            out.extend_from_slice(chunk);
        }
        out
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = Error;

    /// Parses a signature, inferring the tree height from the byte length.
    /// The length must equal `4 + 32·(68 + H)` exactly for a supported `H`.
    fn try_from(bytes: &[u8]) -> Result<Self, Error> {
        let fixed = 4 + N + WOTS_LEN * N;
        let auth_bytes = bytes
            .len()
            .checked_sub(fixed)
            .ok_or(Error::InvalidSignatureLength(bytes.len()))?;
        if auth_bytes % N != 0 {
            return Err(Error::InvalidSignatureLength(bytes.len()));
        }
        let height = (auth_bytes / N) as u32;
        if height == 0 || height > MAX_HEIGHT {
            return Err(Error::InvalidSignatureLength(bytes.len()));
        }

        let mut index = [0u8; 4];
        index.copy_from_slice(&bytes[..4]);
        let r = node(&bytes[4..4 + N]);
        let wots_sig = bytes[4 + N..fixed].chunks_exact(N).map(node).collect();
        let auth = bytes[fixed..].chunks_exact(N).map(node).collect();

        Ok(Self {
            index: u32::from_be_bytes(index),
            r,
            wots_sig,
            auth,
        })
    }
}

impl From<Signature> for Vec<u8> {
    fn from(sig: Signature) -> Vec<u8> {
        sig.to_bytes()
    }
}

impl signature::SignatureEncoding for Signature {
    type Repr = Vec<u8>;
}

/// Recomputes the tree root implied by a signature and message digest.
///
/// Recovers the WOTS+ public key from the signature, folds it to the leaf,
/// then climbs the authentication path, ordering the running node by the
/// corresponding index bit at every level.
pub(crate) fn root_from_sig(
    sig: &Signature,
    digest: &[u8; N],
    pub_prf: &Prf,
    layer: u32,
    tree: u64,
) -> [u8; N] {
    let mut adrs = Address::new();
    adrs.set_type(ADDR_TYPE_OTS);
    adrs.set_layer(layer);
    adrs.set_tree(tree);
    adrs.set_ots(sig.index);
    let pk = wots::public_from_sig(&sig.wots_sig, digest, pub_prf, adrs);

    adrs.set_type(ADDR_TYPE_LTREE);
    adrs.set_ltree(sig.index);
    let mut running = wots::ltree(pk, pub_prf, adrs);

    adrs.set_type(ADDR_TYPE_HASHTREE);
    adrs.set_ltree(0);
    let mut idx = sig.index;
    for (k, sibling) in sig.auth.iter().enumerate() {
        adrs.set_tree_height(k as u32);
        adrs.set_tree_index(idx >> 1);
        running = if idx & 1 == 0 {
            rand_hash(&running, sibling, pub_prf, adrs)
        } else {
            rand_hash(sibling, &running, pub_prf, adrs)
        };
        idx >>= 1;
    }
    running
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(height: u32) -> Signature {
        Signature::new(
            3,
            [0xAB; N],
            (0..WOTS_LEN).map(|i| [i as u8; N]).collect(),
            (0..height).map(|h| [h as u8; N]).collect(),
        )
    }

    #[test]
    fn byte_round_trip() {
        let sig = sample(10);
        let bytes = sig.to_bytes();
        assert_eq!(bytes.len(), sig_len(10));
        assert_eq!(Signature::try_from(bytes.as_slice()).unwrap(), sig);
    }

    #[test]
    fn length_must_match_exactly() {
        let bytes = sample(10).to_bytes();
        for len in [0, 4, sig_len(10) - 1, sig_len(10) + 1] {
            let mut cut = bytes.clone();
            cut.resize(len, 0);
            assert!(matches!(
                Signature::try_from(cut.as_slice()),
                Err(Error::InvalidSignatureLength(_))
            ));
        }
        // A whole extra node changes the inferred height instead.
        let mut extended = bytes;
        extended.extend_from_slice(&[0u8; N]);
        assert_eq!(Signature::try_from(extended.as_slice()).unwrap().height(), 11);
    }

    #[test]
    fn empty_auth_path_is_rejected() {
        let fixed = vec![0u8; 4 + N + WOTS_LEN * N];
        assert!(Signature::try_from(fixed.as_slice()).is_err());
    }
}
