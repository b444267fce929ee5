//! C2 — per-pair ephemeral elliptic-curve key exchange.
//!
//! A distinct group from [`crate::bigmod`]: ephemeral keys live on Ristretto255
//! (`curve25519-dalek-ng`), matching the teacher's own EC backend choice,
//! while Pedersen commitments stay in the big-integer multiplicative group.

use curve25519_dalek_ng::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek_ng::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek_ng::scalar::Scalar as CurveScalar;
use hkdf::Hkdf;
use rand_core::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::DomainError;
use crate::group::MemberIndex;

/// Domain-separation context for the KDF, per spec §4.2.
const KX_CONTEXT: &[u8] = b"dkg-core/ephemeral-kx/v1";

/// A 256-bit symmetric key derived from one pair's ephemeral DH.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SymmetricKey(pub(crate) [u8; 32]);

impl SymmetricKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Per-pair ephemeral private key. Never leaves the owning member; zeroized
/// on drop and at run termination.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct EphemeralSecretKey(CurveScalar);

/// Broadcastable public half of an ephemeral key pair.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EphemeralPublicKey(#[serde(with = "compressed_point")] CompressedRistretto);

impl EphemeralSecretKey {
    /// Generates a fresh ephemeral key pair for one peer, per spec phase 1.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> (Self, EphemeralPublicKey) {
        let sk = CurveScalar::random(rng);
        let pk = RISTRETTO_BASEPOINT_POINT * sk;
        (EphemeralSecretKey(sk), EphemeralPublicKey(pk.compress()))
    }

    /// Computes the shared secret with a peer's public half and derives the
    /// pairwise symmetric key `K_ij` via HKDF-SHA256. `K_ij == K_ji` because
    /// both sides compute the same DH point and hash it with the same
    /// context, independent of message order.
    pub fn derive_symmetric_key(
        &self,
        peer_public: &EphemeralPublicKey,
        group_id: &[u8],
        run_nonce: u64,
        i: MemberIndex,
        j: MemberIndex,
    ) -> Result<SymmetricKey, DomainError> {
        let peer_point = peer_public
            .0
            .decompress()
            .ok_or(DomainError::InvalidEncoding)?;
        let shared_point = peer_point * self.0;

        let (lo, hi) = (i.get().min(j.get()), i.get().max(j.get()));
        let mut salt = Vec::with_capacity(group_id.len() + 24);
        salt.extend_from_slice(group_id);
        salt.extend_from_slice(&run_nonce.to_be_bytes());
        salt.extend_from_slice(&lo.to_be_bytes());
        salt.extend_from_slice(&hi.to_be_bytes());

        let hk = Hkdf::<Sha256>::new(Some(&salt), shared_point.compress().as_bytes());
        let mut okm = [0u8; 32];
        hk.expand(KX_CONTEXT, &mut okm)
            .map_err(|_| DomainError::InvalidEncoding)?;
        Ok(SymmetricKey(okm))
    }
}

mod compressed_point {
    use curve25519_dalek_ng::ristretto::CompressedRistretto;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(p: &CompressedRistretto, s: S) -> Result<S::Ok, S::Error> {
        p.as_bytes().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<CompressedRistretto, D::Error> {
        let bytes = <[u8; 32]>::deserialize(d)?;
        Ok(CompressedRistretto(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn both_sides_derive_the_same_key() {
        let mut rng = ChaCha20Rng::from_seed([9u8; 32]);
        let (sk_i, pk_i) = EphemeralSecretKey::generate(&mut rng);
        let (sk_j, pk_j) = EphemeralSecretKey::generate(&mut rng);

        let i = MemberIndex::new(1).unwrap();
        let j = MemberIndex::new(2).unwrap();

        let k_ij = sk_i.derive_symmetric_key(&pk_j, b"group-1", 42, i, j).unwrap();
        let k_ji = sk_j.derive_symmetric_key(&pk_i, b"group-1", 42, j, i).unwrap();

        assert_eq!(k_ij.as_bytes(), k_ji.as_bytes());
    }

    #[test]
    fn different_pairs_derive_different_keys() {
        let mut rng = ChaCha20Rng::from_seed([10u8; 32]);
        let (sk_i, _pk_i) = EphemeralSecretKey::generate(&mut rng);
        let (_sk_j, pk_j) = EphemeralSecretKey::generate(&mut rng);
        let (_sk_k, pk_k) = EphemeralSecretKey::generate(&mut rng);

        let i = MemberIndex::new(1).unwrap();
        let j = MemberIndex::new(2).unwrap();
        let k = MemberIndex::new(3).unwrap();

        let k_ij = sk_i.derive_symmetric_key(&pk_j, b"group-1", 42, i, j).unwrap();
        let k_ik = sk_i.derive_symmetric_key(&pk_k, b"group-1", 42, i, k).unwrap();
        assert_ne!(k_ij.as_bytes(), k_ik.as_bytes());
    }
}
