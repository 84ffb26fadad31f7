/// Errors used throughout this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The tree height is outside the supported range.
    #[error("invalid tree height {0}: supported range is 1..={max}", max = crate::params::MAX_HEIGHT)]
    InvalidHeight(u32),
    /// All one-time signature leaves have been consumed.
    #[error("key exhausted: all one-time signatures have been used")]
    KeyExhausted,
    /// The provided seed has an incorrect length.
    #[error("invalid seed length: expected {expected}, got {got}")]
    InvalidSeedLength {
        /// Expected seed length in bytes.
        expected: usize,
        /// Actual seed length in bytes.
        got: usize,
    },
    /// The next-leaf index of an exported key exceeds the key's capacity.
    #[error("invalid leaf index {index} for tree height {height}")]
    InvalidIndex {
        /// The exported next-leaf index.
        index: u32,
        /// The tree height the key is bound to.
        height: u32,
    },
    /// The byte string does not have the length of any supported signature.
    #[error("invalid signature length: {0} bytes")]
    InvalidSignatureLength(usize),
    /// Signature verification failed.
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Result type used by this crate.
pub type XmssResult<T> = Result<T, Error>;
