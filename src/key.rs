//! Private/public key container: WIF, mini-key and hex parsing, ECDSA
//! sign/verify, and Bitcoin-message-style compact recoverable signatures.
//!
//! A [Key] with no secret is public-key-only; signing such a key panics, as
//! does every "programmer error" case in this crate (see `error.rs`'s
//! module doc) rather than returning a typed error.

use bitcoin::hashes::{hash160, sha256, Hash};
use bitcoin::secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use bitcoin::secp256k1::{self, Message, PublicKey, SecretKey};
use zeroize::Zeroize;

use crate::config::Network;
use crate::error::{Error, Result};
use crate::SECP;

/// A private or public key, mirroring the upstream container: a possibly
/// absent secret, the (cached) serialized public key, and a compression
/// flag. The secret, once set, is wiped on drop.
#[derive(Clone)]
pub struct Key {
	secret: Option<SecretKey>,
	pub_key: Option<PublicKey>,
	compressed: bool,
}

impl Drop for Key {
	fn drop(&mut self) {
		// `SecretKey` itself does not implement zeroize; dropping it in
		// place doesn't scrub the stack slot, so the bytes are copied out,
		// wiped, and the copy dropped. The non-destructive API this crate
		// exposes (`secret_key()`) is the only other path that can leave a
		// copy on the stack, and callers are expected to wipe those too.
		if let Some(secret) = self.secret.take() {
			let mut bytes = secret.secret_bytes();
			bytes.zeroize();
		}
	}
}

impl Key {
	pub fn from_secret(secret: SecretKey, compressed: bool) -> Key {
		Key {
			secret: Some(secret),
			pub_key: None,
			compressed,
		}
	}

	pub fn from_public(pub_key: PublicKey, compressed: bool) -> Key {
		Key {
			secret: None,
			pub_key: Some(pub_key),
			compressed,
		}
	}

	pub fn secret_key(&self) -> Option<SecretKey> {
		self.secret
	}

	pub fn is_compressed(&self) -> bool {
		self.compressed
	}

	/// The cached or freshly computed serialized public key (33 bytes
	/// compressed, 65 uncompressed).
	pub fn pub_key_bytes(&self) -> Vec<u8> {
		let pk = self.public_key();
		if self.compressed {
			pk.serialize().to_vec()
		} else {
			pk.serialize_uncompressed().to_vec()
		}
	}

	pub fn public_key(&self) -> PublicKey {
		match (self.pub_key, self.secret) {
			(Some(pk), _) => pk,
			(None, Some(sk)) => PublicKey::from_secret_key(&SECP, &sk),
			(None, None) => unreachable!("a key always has a secret or a public component"),
		}
	}

	/// `hash160(pubKey)`.
	pub fn hash160(&self) -> hash160::Hash {
		hash160::Hash::hash(&self.pub_key_bytes())
	}

	/// Parses a hex-encoded 32-byte secret.
	pub fn from_hex(s: &str, compressed: bool) -> Result<Key> {
		let bytes = hex::decode(s).map_err(|_| Error::InvalidAddress("not valid hex".into()))?;
		let secret = SecretKey::from_slice(&bytes).map_err(Error::from)?;
		Ok(Key::from_secret(secret, compressed))
	}

	/// Parses a WIF-encoded private key for `network`.
	pub fn from_wif(wif: &str, network: Network) -> Result<Key> {
		let data = bs58::decode(wif)
			.with_check(None)
			.into_vec()
			.map_err(|e| Error::InvalidAddress(e.to_string()))?;
		if data.is_empty() || data[0] != network.wif_version() {
			return Err(Error::InvalidAddress("wrong WIF version byte".into()));
		}
		let (secret_bytes, compressed) = match data.len() {
			33 => (&data[1..33], false),
			34 if data[33] == 0x01 => (&data[1..33], true),
			_ => return Err(Error::InvalidAddress("unexpected WIF payload length".into())),
		};
		let secret = SecretKey::from_slice(secret_bytes).map_err(Error::from)?;
		Ok(Key::from_secret(secret, compressed))
	}

	pub fn to_wif(&self, network: Network) -> Option<String> {
		let secret = self.secret?;
		let mut data = Vec::with_capacity(34);
		data.push(network.wif_version());
		data.extend_from_slice(&secret.secret_bytes());
		if self.compressed {
			data.push(0x01);
		}
		let wif = bs58::encode(&data).with_check().into_string();
		data.zeroize();
		Some(wif)
	}

	/// True if `s` is a 22- or 30-character Casascius-style mini private
	/// key: `s` must start with `'S'` and `SHA256(s ++ "?")` must have a
	/// zero first byte. This exact construction (append a literal `?` byte
	/// before hashing) is preserved from the upstream check.
	pub fn is_valid_minikey(s: &str) -> bool {
		if !matches!(s.len(), 22 | 30) || !s.starts_with('S') {
			return false;
		}
		let mut check = String::with_capacity(s.len() + 1);
		check.push_str(s);
		check.push('?');
		sha256::Hash::hash(check.as_bytes())[0] == 0
	}

	/// Parses a mini private key (uncompressed, per the format's origin).
	pub fn from_minikey(s: &str) -> Result<Key> {
		if !Key::is_valid_minikey(s) {
			return Err(Error::InvalidAddress("not a valid mini private key".into()));
		}
		let hash = sha256::Hash::hash(s.as_bytes());
		let secret = SecretKey::from_slice(&hash[..]).map_err(Error::from)?;
		Ok(Key::from_secret(secret, false))
	}

	/// Accepts WIF, mini-key, or bare hex, in that order, matching the
	/// upstream parser's format sniffing.
	pub fn parse_priv_key(s: &str, network: Network) -> Result<Key> {
		if matches!(s.len(), 22 | 30) && s.starts_with('S') {
			return Key::from_minikey(s);
		}
		if let Ok(key) = Key::from_wif(s, network) {
			return Ok(key);
		}
		Key::from_hex(s, true)
	}

	pub fn sign_der(&self, digest: &[u8; 32]) -> Vec<u8> {
		let secret = self.secret.expect("signing requires a secret key");
		let msg = Message::from_digest(*digest);
		SECP.sign_ecdsa(&msg, &secret).serialize_der().to_vec()
	}

	pub fn verify_der(&self, digest: &[u8; 32], sig_der: &[u8]) -> bool {
		let Ok(sig) = secp256k1::ecdsa::Signature::from_der(sig_der) else {
			return false;
		};
		let msg = Message::from_digest(*digest);
		SECP.verify_ecdsa(&msg, &sig, &self.public_key()).is_ok()
	}

	/// Pieter Wuille's compact signature encoding for Bitcoin message
	/// signing: `[27 + recid + (4 if compressed)] ++ r(32) ++ s(32)`.
	pub fn compact_sign(&self, digest: &[u8; 32]) -> Vec<u8> {
		let secret = self.secret.expect("signing requires a secret key");
		let msg = Message::from_digest(*digest);
		let sig = SECP.sign_ecdsa_recoverable(&msg, &secret);
		let (recid, bytes) = sig.serialize_compact();
		let mut out = Vec::with_capacity(65);
		out.push(27 + recid.to_i32() as u8 + if self.compressed { 4 } else { 0 });
		out.extend_from_slice(&bytes);
		out
	}

	/// Recovers the public key (and whether it claims compression) from a
	/// compact signature over `digest`.
	pub fn recover_compact(digest: &[u8; 32], compact_sig: &[u8]) -> Result<Key> {
		if compact_sig.len() != 65 {
			return Err(Error::InvalidAddress("compact signature must be 65 bytes".into()));
		}
		let header = compact_sig[0];
		if header < 27 || header >= 35 {
			return Err(Error::InvalidAddress("invalid compact signature header byte".into()));
		}
		let compressed = (header - 27) >= 4;
		let recid = RecoveryId::from_i32(((header - 27) % 4) as i32).map_err(Error::from)?;
		let sig = RecoverableSignature::from_compact(&compact_sig[1..], recid).map_err(Error::from)?;
		let msg = Message::from_digest(*digest);
		let pubkey = SECP.recover_ecdsa(&msg, &sig).map_err(Error::from)?;
		Ok(Key::from_public(pubkey, compressed))
	}
}
