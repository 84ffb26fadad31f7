//! XMSS (eXtended Merkle Signature Scheme) with amortised authentication-path
//! traversal.
//!
//! Implements the stateful hash-based signature construction of RFC 8391 for
//! the `SHA2_*_256` parameter family (`n = 32`, `w = 16`) with a caller-chosen
//! tree height. Per-signature cost is amortised to O(height) hash calls by
//! maintaining one treehash stack per tree level (BDS traversal); the first
//! tree build at key generation is parallelised across subtree workers.
//!
//! # Statefulness warning
//!
//! XMSS is a *stateful* scheme: each leaf index must be used at most once,
//! and signing twice with the same index leaks the corresponding WOTS+
//! private key. The signing key therefore mutates on every signature, is not
//! `Clone`, and refuses to sign once all `2^height` leaves are consumed.
//! Embedders that persist keys must commit the exported index to durable
//! storage *before* releasing a signature, and must never import the same
//! export into two live keys.
//!
//! # Example
//!
//! ```
//! use xmss_bds::KeyPair;
//!
//! let mut kp = KeyPair::generate(10, &mut rand::rng())?;
//! let sig = kp.signing_key().sign(b"example message")?;
//! kp.verifying_key().verify(b"example message", &sig)?;
//! # Ok::<(), xmss_bds::Error>(())
//! ```

mod address;
mod error;
mod hash;
mod merkle;
mod params;
mod sig;
mod wots;
mod xmss;

pub use error::{Error, XmssResult};
pub use params::{MAX_HEIGHT, N, WOTS_LEN, sig_len};
pub use sig::Signature;
pub use xmss::{KeyPair, SigningKey, SigningKeyExport, VerifyingKey, VerifyingKeyExport};

pub use signature;
