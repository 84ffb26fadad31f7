//! XMSS key generation, signing and verification.

use std::thread;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::address::{ADDR_TYPE_OTS, Address};
use crate::error::{Error, XmssResult};
use crate::hash::{Prf, hash_msg};
use crate::merkle::{LeafContext, Traversal};
use crate::params::{MAX_HEIGHT, N};
use crate::sig::{Signature, root_from_sig};
use crate::wots;

type HmacSha256 = Hmac<Sha256>;

/// Derives one of the three scheme seeds from a user seed.
fn derive_seed(user_seed: &[u8], tag: u8) -> [u8; N] {
    let mut mac = HmacSha256::new_from_slice(user_seed).expect("HMAC accepts any key length");
    mac.update(&[tag]);
    mac.finalize().into_bytes().into()
}

/// ceil(log2) of the available parallelism, for the initial tree build.
fn default_proc_log2() -> u32 {
    let cpus = thread::available_parallelism().map_or(1, usize::from);
    (cpus as u32).next_power_of_two().trailing_zeros()
}

// ---------------------------------------------------------------------------
// VerifyingKey
// ---------------------------------------------------------------------------

/// An XMSS verifying key (public key).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyingKey {
    height: u32,
    public_seed: [u8; N],
    root: [u8; N],
}

impl VerifyingKey {
    /// Tree height this key is bound to; the matching signing key covers
    /// `2^height` signatures.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Public seed feeding the hash randomisation.
    pub fn public_seed(&self) -> &[u8; N] {
        &self.public_seed
    }

    /// Merkle tree root.
    pub fn root(&self) -> &[u8; N] {
        &self.root
    }

    /// Verifies a signature over `msg`.
    ///
    /// Every failure mode (wrong height as well as any cryptographic
    /// mismatch) collapses into [`Error::VerificationFailed`].
    pub fn verify(&self, msg: &[u8], sig: &Signature) -> XmssResult<()> {
        if sig.height() != self.height {
            return Err(Error::VerificationFailed);
        }
        let digest = self.message_digest(sig.index(), sig.r(), msg);
        let pub_prf = Prf::new(self.public_seed);
        let root = root_from_sig(sig, &digest, &pub_prf, 0, 0);
        if bool::from(root.ct_eq(&self.root)) {
            Ok(())
        } else {
            Err(Error::VerificationFailed)
        }
    }

    /// Verifies a signature given in wire form.
    pub fn verify_bytes(&self, msg: &[u8], sig: &[u8]) -> XmssResult<()> {
        let sig = Signature::try_from(sig).map_err(|_| Error::VerificationFailed)?;
        self.verify(msg, &sig)
    }

    /// `H_msg` digest of a message under this key's root.
    fn message_digest(&self, index: u32, r: &[u8; N], msg: &[u8]) -> [u8; N] {
        let mut prefix = [0u8; 3 * N];
        prefix[..N].copy_from_slice(r);
        prefix[N..2 * N].copy_from_slice(&self.root);
        prefix[3 * N - 4..].copy_from_slice(&index.to_be_bytes());
        hash_msg(&prefix, msg)
    }

    /// Copies the key into its exportable form.
    pub fn export(&self) -> VerifyingKeyExport {
        VerifyingKeyExport {
            height: self.height,
            public_seed: self.public_seed,
            root: self.root,
        }
    }

    /// Reconstructs a verifying key from exported state.
    pub fn import(export: &VerifyingKeyExport) -> XmssResult<Self> {
        if export.height == 0 || export.height > MAX_HEIGHT {
            return Err(Error::InvalidHeight(export.height));
        }
        Ok(Self {
            height: export.height,
            public_seed: export.public_seed,
            root: export.root,
        })
    }
}

impl signature::Verifier<Signature> for VerifyingKey {
    fn verify(&self, msg: &[u8], signature: &Signature) -> Result<(), signature::Error> {
        VerifyingKey::verify(self, msg, signature).map_err(|_| signature::Error::new())
    }
}

/// Exported verifying-key state.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VerifyingKeyExport {
    /// Tree height.
    pub height: u32,
    /// Public seed.
    pub public_seed: [u8; N],
    /// Merkle tree root.
    pub root: [u8; N],
}

// ---------------------------------------------------------------------------
// SigningKey
// ---------------------------------------------------------------------------

/// An XMSS signing key (private key).
///
/// Carries the traversal state for the next unused leaf. Signing mutates the
/// key, and each leaf index must be consumed at most once; reuse leaks the
/// underlying WOTS+ private key. The type is deliberately not `Clone`, since
/// two live copies of the same state would sign with the same index.
pub struct SigningKey {
    public: VerifyingKey,
    wots_prf: Prf,
    msg_prf: Prf,
    pub_prf: Prf,
    state: Traversal,
}

impl core::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SigningKey")
            .field("height", &self.public.height)
            .field("index", &self.state.leaf())
            .field("seeds", &"[REDACTED]")
            .finish()
    }
}

impl SigningKey {
    /// Builds a key from raw seed material at `(layer, tree)`, rebuilding
    /// the traversal state and fast-forwarding it to `index`.
    fn from_parts(
        height: u32,
        secret_key_seed: [u8; N],
        secret_key_prf: [u8; N],
        public_seed: [u8; N],
        layer: u32,
        tree: u64,
        index: u32,
        proc_log2: u32,
    ) -> XmssResult<Self> {
        if height == 0 || height > MAX_HEIGHT {
            return Err(Error::InvalidHeight(height));
        }
        if u64::from(index) > 1u64 << height {
            return Err(Error::InvalidIndex { index, height });
        }

        let wots_prf = Prf::new(secret_key_seed);
        let msg_prf = Prf::new(secret_key_prf);
        let pub_prf = Prf::new(public_seed);
        let ctx = LeafContext {
            wots_prf: &wots_prf,
            pub_prf: &pub_prf,
        };
        let (mut state, root) = Traversal::build_initial(height, layer, tree, ctx, proc_log2);
        for _ in 0..index {
            state.advance(ctx);
        }

        Ok(Self {
            public: VerifyingKey {
                height,
                public_seed,
                root,
            },
            wots_prf,
            msg_prf,
            pub_prf,
            state,
        })
    }

    /// Next unused leaf index.
    pub fn index(&self) -> u32 {
        self.state.leaf()
    }

    /// Number of signatures this key can still produce.
    pub fn signatures_remaining(&self) -> u64 {
        (1u64 << self.public.height) - u64::from(self.state.leaf())
    }

    /// Signs a message, consuming the current leaf.
    ///
    /// Fails with [`Error::KeyExhausted`] once all `2^height` leaves have
    /// been used; the index never wraps around.
    pub fn sign(&mut self, msg: &[u8]) -> XmssResult<Signature> {
        let index = self.state.leaf();
        if u64::from(index) >= 1u64 << self.public.height {
            return Err(Error::KeyExhausted);
        }

        let r = self.msg_prf.sum_int(index);
        let digest = self.public.message_digest(index, &r, msg);

        let mut adrs = Address::new();
        adrs.set_type(ADDR_TYPE_OTS);
        adrs.set_layer(self.state.layer());
        adrs.set_tree(self.state.tree());
        adrs.set_ots(index);
        let mut sk = wots::derive_private(&self.wots_prf, &adrs);
        let wots_sig = wots::sign(&digest, &sk, &self.pub_prf, adrs);
        sk.zeroize();

        let sig = Signature::new(index, r, wots_sig, self.state.auth().to_vec());

        let ctx = LeafContext {
            wots_prf: &self.wots_prf,
            pub_prf: &self.pub_prf,
        };
        self.state.advance(ctx);

        Ok(sig)
    }

    /// Copies the key's persistent state into its exportable form.
    ///
    /// An embedder that persists keys must store the export (most
    /// importantly its `index`) *before* releasing the corresponding
    /// signature, and must never keep two live keys built from the same
    /// export.
    pub fn export(&self) -> SigningKeyExport {
        SigningKeyExport {
            height: self.public.height,
            public_seed: self.public.public_seed,
            root: self.public.root,
            index: self.state.leaf(),
            secret_key_prf: *self.msg_prf.seed(),
            secret_key_seed: *self.wots_prf.seed(),
        }
    }

    /// Reconstructs a signing key from exported state.
    ///
    /// The traversal state is rebuilt from scratch and fast-forwarded to the
    /// exported index, so the next signature is byte-identical to the one
    /// the exporting key would have produced. Cost grows with the index:
    /// the initial build is `O(2^height)` and the fast-forward adds
    /// `O(index · height)` leaf computations.
    pub fn import(export: &SigningKeyExport) -> XmssResult<Self> {
        Self::from_parts(
            export.height,
            export.secret_key_seed,
            export.secret_key_prf,
            export.public_seed,
            0,
            0,
            export.index,
            default_proc_log2(),
        )
    }
}

impl From<&SigningKey> for VerifyingKey {
    fn from(sk: &SigningKey) -> Self {
        sk.public.clone()
    }
}

impl signature::SignerMut<Signature> for SigningKey {
    fn try_sign(&mut self, msg: &[u8]) -> Result<Signature, signature::Error> {
        self.sign(msg).map_err(|_| signature::Error::new())
    }
}

impl signature::Keypair for SigningKey {
    type VerifyingKey = VerifyingKey;

    fn verifying_key(&self) -> VerifyingKey {
        self.public.clone()
    }
}

/// Exported signing-key state: the seed material plus the next leaf index.
///
/// This is everything needed to re-create the key; treat it like the key
/// itself. Secret seeds are zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SigningKeyExport {
    /// Tree height.
    pub height: u32,
    /// Public seed.
    pub public_seed: [u8; N],
    /// Merkle tree root.
    pub root: [u8; N],
    /// Next unused leaf index.
    pub index: u32,
    /// Seed of the message-randomiser PRF.
    pub secret_key_prf: [u8; N],
    /// Seed for WOTS+ private key generation.
    pub secret_key_seed: [u8; N],
}

impl core::fmt::Debug for SigningKeyExport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SigningKeyExport")
            .field("height", &self.height)
            .field("index", &self.index)
            .field("seeds", &"[REDACTED]")
            .finish()
    }
}

impl Zeroize for SigningKeyExport {
    fn zeroize(&mut self) {
        self.secret_key_prf.zeroize();
        self.secret_key_seed.zeroize();
    }
}

impl Drop for SigningKeyExport {
    fn drop(&mut self) {
        self.zeroize();
    }
}

// ---------------------------------------------------------------------------
// KeyPair
// ---------------------------------------------------------------------------

/// An XMSS key pair.
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generates a key pair bound to `height` from fresh randomness.
    pub fn generate<R: rand::CryptoRng>(height: u32, rng: &mut R) -> XmssResult<Self> {
        let mut seed = [0u8; N];
        rng.fill_bytes(&mut seed);
        let kp = Self::from_seed(height, &seed);
        seed.zeroize();
        kp
    }

    /// Derives a key pair deterministically from a 32-byte user seed.
    ///
    /// The three scheme seeds are separated from the user seed by
    /// HMAC-SHA256 with distinct one-byte tags.
    pub fn from_seed(height: u32, user_seed: &[u8]) -> XmssResult<Self> {
        if user_seed.len() != N {
            return Err(Error::InvalidSeedLength {
                expected: N,
                got: user_seed.len(),
            });
        }
        let mut secret_key_seed = derive_seed(user_seed, 1);
        let mut secret_key_prf = derive_seed(user_seed, 2);
        let public_seed = derive_seed(user_seed, 3);

        let signing_key = SigningKey::from_parts(
            height,
            secret_key_seed,
            secret_key_prf,
            public_seed,
            0,
            0,
            0,
            default_proc_log2(),
        );
        secret_key_seed.zeroize();
        secret_key_prf.zeroize();
        let signing_key = signing_key?;

        let verifying_key = signing_key.public.clone();
        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    /// Returns a mutable reference to the signing key.
    pub fn signing_key(&mut self) -> &mut SigningKey {
        &mut self.signing_key
    }

    /// Returns a reference to the verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }
}
