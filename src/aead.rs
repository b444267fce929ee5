//! C3 — authenticated encryption of per-peer share payloads.
//!
//! AES-256-GCM keyed by the pairwise [`crate::kx::SymmetricKey`]. A failed
//! decryption (authentication tag mismatch) is the "decrypt fail" branch of
//! spec phase 4 and is always treated as peer misbehavior, never a panic.

use aead::{generic_array::GenericArray, Aead, NewAead};
use aes_gcm::Aes256Gcm;

use crate::error::DomainError;
use crate::group::MemberIndex;
use crate::kx::SymmetricKey;

/// Ciphertext plus the nonce it was sealed under, so the receiver can
/// recompute and cross-check it during phase 5/9 justification.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Sealed {
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

/// Deterministic per-message nonce: `(sender, phase_tag)` never repeats
/// under one `K_ij`, since a sender emits at most one sealed payload to a
/// given peer per phase.
pub fn nonce_for(sender: MemberIndex, phase_tag: u8) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[0] = phase_tag;
    nonce[4..12].copy_from_slice(&sender.get().to_be_bytes());
    nonce
}

pub fn seal(key: &SymmetricKey, sender: MemberIndex, phase_tag: u8, plaintext: &[u8]) -> Sealed {
    let nonce = nonce_for(sender, phase_tag);
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
    let ciphertext = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .expect("AES-256-GCM encryption over a bounded plaintext cannot fail");
    Sealed {
        nonce,
        ciphertext,
    }
}

/// Opens a sealed payload. Returns [`DomainError::InvalidEncoding`] on
/// authentication failure — the caller (phase 4/8 validation) maps that into
/// a `PeerMisbehavior` against the sender, it is never propagated as a bug.
pub fn open(key: &SymmetricKey, sealed: &Sealed) -> Result<Vec<u8>, DomainError> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
    cipher
        .decrypt(GenericArray::from_slice(&sealed.nonce), sealed.ciphertext.as_ref())
        .map_err(|_| DomainError::InvalidEncoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SymmetricKey {
        SymmetricKey([7u8; 32])
    }

    #[test]
    fn roundtrip() {
        let k = key();
        let sender = MemberIndex::new(3).unwrap();
        let sealed = seal(&k, sender, 3, b"s_ij || t_ij");
        let opened = open(&k, &sealed).unwrap();
        assert_eq!(opened, b"s_ij || t_ij");
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let k = key();
        let sender = MemberIndex::new(3).unwrap();
        let mut sealed = seal(&k, sender, 3, b"payload");
        let last = sealed.ciphertext.len() - 1;
        sealed.ciphertext[last] ^= 0xff;
        assert!(open(&k, &sealed).is_err());
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let sender = MemberIndex::new(1).unwrap();
        let sealed = seal(&key(), sender, 3, b"payload");
        let wrong_key = SymmetricKey([9u8; 32]);
        assert!(open(&wrong_key, &sealed).is_err());
    }
}
