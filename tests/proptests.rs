//! Property-based tests on a small tree height.

use proptest::prelude::*;

use xmss_bds::{KeyPair, Signature, VerifyingKey, sig_len};

const HEIGHT: u32 = 2;

prop_compose! {
    fn keypair()(seed in any::<[u8; 32]>()) -> KeyPair {
        KeyPair::from_seed(HEIGHT, &seed).expect("height 2 is valid")
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sign_verify_round_trip(
        mut kp in keypair(),
        msg in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let sig = kp.signing_key().sign(&msg).unwrap();
        prop_assert!(kp.verifying_key().verify(&msg, &sig).is_ok());
        prop_assert_eq!(sig.to_bytes().len(), sig_len(HEIGHT));
    }

    #[test]
    fn indices_are_monotone_and_signatures_distinct(mut kp in keypair(), msg in any::<[u8; 16]>()) {
        let first = kp.signing_key().sign(&msg).unwrap();
        let second = kp.signing_key().sign(&msg).unwrap();
        prop_assert_eq!(first.index(), 0);
        prop_assert_eq!(second.index(), 1);
        prop_assert_ne!(first.to_bytes(), second.to_bytes());
        prop_assert!(kp.verifying_key().verify(&msg, &first).is_ok());
        prop_assert!(kp.verifying_key().verify(&msg, &second).is_ok());
    }

    #[test]
    fn bit_flip_in_signature_rejected(
        mut kp in keypair(),
        msg in any::<[u8; 16]>(),
        bit in 0usize..sig_len(HEIGHT) * 8,
    ) {
        let sig = kp.signing_key().sign(&msg).unwrap();
        let mut bytes = sig.to_bytes();
        bytes[bit / 8] ^= 1 << (bit % 8);
        let corrupt = Signature::try_from(bytes.as_slice()).unwrap();
        prop_assert!(kp.verifying_key().verify(&msg, &corrupt).is_err());
    }

    #[test]
    fn bit_flip_in_message_rejected(
        mut kp in keypair(),
        msg in any::<[u8; 16]>(),
        bit in 0usize..128,
    ) {
        let sig = kp.signing_key().sign(&msg).unwrap();
        let mut tampered = msg;
        tampered[bit / 8] ^= 1 << (bit % 8);
        prop_assert!(kp.verifying_key().verify(&tampered, &sig).is_err());
    }

    #[test]
    fn bit_flip_in_root_rejected(
        mut kp in keypair(),
        msg in any::<[u8; 16]>(),
        bit in 0usize..256,
    ) {
        let sig = kp.signing_key().sign(&msg).unwrap();
        let mut export = kp.verifying_key().export();
        export.root[bit / 8] ^= 1 << (bit % 8);
        let tampered = VerifyingKey::import(&export).unwrap();
        prop_assert!(tampered.verify(&msg, &sig).is_err());
    }
}
