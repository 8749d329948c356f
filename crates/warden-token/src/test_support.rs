//! Shared keypairs for unit tests; RSA generation is too slow to repeat per test.

use crate::keys::Keypair;
use std::sync::OnceLock;
use warden_core::KeyAlgorithm;

pub(crate) fn fixture_keypair() -> &'static Keypair {
    static KEYPAIR: OnceLock<Keypair> = OnceLock::new();
    KEYPAIR.get_or_init(|| Keypair::generate(KeyAlgorithm::Rsa, 2048).unwrap())
}

pub(crate) fn other_keypair() -> &'static Keypair {
    static KEYPAIR: OnceLock<Keypair> = OnceLock::new();
    KEYPAIR.get_or_init(|| Keypair::generate(KeyAlgorithm::Rsa, 2048).unwrap())
}
