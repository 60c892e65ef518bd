// crates/bulwark-core/src/crypto.rs
//
// SHA-256 helpers: plain hashing, a canonical field encoder used to hash
// configuration payloads, and deterministic address derivation.

use sha2::{Digest, Sha256};

use crate::identity::Address;

/// Compute SHA-256 hash of the given bytes.
///
/// Returns a 32-byte hash.
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Incremental hasher over a fixed, big-endian field encoding.
///
/// Each field is written with its width so that two different tuples
/// can never encode to the same byte stream. Variable-length sequences
/// must be prefixed with [`CanonicalHasher::len`].
pub struct CanonicalHasher {
    inner: Sha256,
}

impl CanonicalHasher {
    /// Start a hash under a domain tag.
    pub fn new(domain: &str) -> Self {
        let mut inner = Sha256::new();
        inner.update((domain.len() as u64).to_be_bytes());
        inner.update(domain.as_bytes());
        Self { inner }
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.inner.update([v]);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.inner.update(v.to_be_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.inner.update(v.to_be_bytes());
        self
    }

    pub fn u128(&mut self, v: u128) -> &mut Self {
        self.inner.update(v.to_be_bytes());
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(v as u8)
    }

    pub fn address(&mut self, v: &Address) -> &mut Self {
        self.inner.update(v.as_bytes());
        self
    }

    /// Length prefix for a sequence.
    pub fn len(&mut self, n: usize) -> &mut Self {
        self.u64(n as u64)
    }

    pub fn finish(self) -> [u8; 32] {
        let mut output = [0u8; 32];
        output.copy_from_slice(&self.inner.finalize());
        output
    }
}

/// Deterministically derive a child contract address.
///
/// The result is a pure function of `(deployer, index, tag)`, so third
/// parties can compute where a contract will live before it exists.
pub fn derive_address(deployer: &Address, index: u16, tag: u8) -> Address {
    let mut hasher = CanonicalHasher::new("bulwark.derive_address");
    hasher.address(deployer).u16(index).u8(tag);
    Address(hasher.finish())
}
