//! BIP32 HD derivation, narrowed to the four entry points the wallet engine
//! needs: a master public key fixed at a configurable account path
//! (`m/0'` by default), non-hardened child public keys off it, a bulk
//! private-key deriver for signing, and the API authentication key at a
//! configurable auth path (`m/1'/0` by default).
//!
//! This intentionally does not wrap `bitcoin::bip32`'s `Xpriv`/`Xpub`: the
//! wallet's notion of a "master public key" sits some number of hardened
//! steps below the seed (so it can be handed to watch-only contexts without
//! the seed itself), which doesn't match the generic extended-key API
//! upstream.

use bitcoin::bip32::{ChildNumber, DerivationPath};
use bitcoin::hashes::{hash160, Hash};
use bitcoin::secp256k1::{PublicKey, Scalar, SecretKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroize;

use crate::key::Key;
use crate::SECP;

const HARDENED: u32 = 0x8000_0000;

type HmacSha512 = Hmac<Sha512>;

fn hmac512(key: &[u8], data: &[u8]) -> [u8; 64] {
	let mut mac = HmacSha512::new_from_slice(key).expect("any key length is valid for HMAC");
	mac.update(data);
	let mut out = [0u8; 64];
	out.copy_from_slice(&mac.finalize().into_bytes());
	out
}

fn ser32(i: u32) -> [u8; 4] {
	i.to_be_bytes()
}

/// A BIP32 master public key fixed at the wallet's configured account
/// path. Signing requires the seed, never the key itself; this type only
/// derives further public keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterPublicKey {
	pub fingerprint: u32,
	pub chain_code: [u8; 32],
	pub pub_key: [u8; 33],
}

fn ckd_priv_hardened(parent_priv: &SecretKey, parent_chain_code: &[u8; 32], index: u32) -> (SecretKey, [u8; 32]) {
	debug_assert!(index & HARDENED != 0);
	let mut data = Vec::with_capacity(37);
	data.push(0x00);
	data.extend_from_slice(&parent_priv[..]);
	data.extend_from_slice(&ser32(index));
	let mut i = hmac512(parent_chain_code, &data);
	data.zeroize();

	let il = Scalar::from_be_bytes(i[..32].try_into().unwrap()).expect("negligible probability of hitting the curve order");
	let child_priv = parent_priv.add_tweak(&il).expect("negligible probability of an invalid child key");
	let mut chain_code = [0u8; 32];
	chain_code.copy_from_slice(&i[32..]);
	i.zeroize();
	(child_priv, chain_code)
}

fn ckd_priv_normal(parent_priv: &SecretKey, parent_chain_code: &[u8; 32], index: u32) -> (SecretKey, [u8; 32]) {
	debug_assert!(index & HARDENED == 0);
	let parent_pub = PublicKey::from_secret_key(&SECP, parent_priv);
	let mut data = Vec::with_capacity(37);
	data.extend_from_slice(&parent_pub.serialize());
	data.extend_from_slice(&ser32(index));
	let mut i = hmac512(parent_chain_code, &data);

	let il = Scalar::from_be_bytes(i[..32].try_into().unwrap()).expect("negligible probability of hitting the curve order");
	let child_priv = parent_priv.add_tweak(&il).expect("negligible probability of an invalid child key");
	let mut chain_code = [0u8; 32];
	chain_code.copy_from_slice(&i[32..]);
	i.zeroize();
	(child_priv, chain_code)
}

fn ckd_pub_normal(parent_pub: &PublicKey, parent_chain_code: &[u8; 32], index: u32) -> (PublicKey, [u8; 32]) {
	debug_assert!(index & HARDENED == 0);
	let mut data = Vec::with_capacity(37);
	data.extend_from_slice(&parent_pub.serialize());
	data.extend_from_slice(&ser32(index));
	let mut i = hmac512(parent_chain_code, &data);

	let il = Scalar::from_be_bytes(i[..32].try_into().unwrap()).expect("negligible probability of hitting the curve order");
	let child_pub = parent_pub.add_exp_tweak(&SECP, &il).expect("negligible probability of an invalid child key");
	let mut chain_code = [0u8; 32];
	chain_code.copy_from_slice(&i[32..]);
	i.zeroize();
	(child_pub, chain_code)
}

fn master_from_seed(seed: &[u8]) -> (SecretKey, [u8; 32]) {
	let i = hmac512(b"Bitcoin seed", seed);
	let secret = SecretKey::from_slice(&i[..32]).expect("negligible probability of an invalid master key");
	let mut chain_code = [0u8; 32];
	chain_code.copy_from_slice(&i[32..]);
	(secret, chain_code)
}

/// Walks `path` from `(secret, chain_code)`, applying a hardened or normal
/// CKD step for each component depending on its kind.
fn derive_path(secret: &SecretKey, chain_code: &[u8; 32], path: &DerivationPath) -> (SecretKey, [u8; 32]) {
	let mut secret = *secret;
	let mut chain_code = *chain_code;
	for child in path.into_iter() {
		let (next_secret, next_cc) = match *child {
			ChildNumber::Hardened { .. } => ckd_priv_hardened(&secret, &chain_code, child.to_u32()),
			ChildNumber::Normal { .. } => ckd_priv_normal(&secret, &chain_code, child.to_u32()),
		};
		secret = next_secret;
		chain_code = next_cc;
	}
	(secret, chain_code)
}

/// `deriveMasterPubKey`: HMAC-SHA512("Bitcoin seed", seed) yields the BIP32
/// master key; this wallet's "master public key" is `account_path` steps
/// below that (by default one hardened step, `m/0'`), with `fingerprint`
/// set to the identifier of the true root (`m`) so it still serializes as
/// a proper child key.
pub fn derive_master_pub_key(seed: &[u8], account_path: &DerivationPath) -> MasterPublicKey {
	let (master_secret, master_chain_code) = master_from_seed(seed);
	let master_pub = PublicKey::from_secret_key(&SECP, &master_secret);
	let identifier = hash160::Hash::hash(&master_pub.serialize());
	let fingerprint = u32::from_be_bytes(identifier[..4].try_into().unwrap());

	let (child_secret, chain_code) = derive_path(&master_secret, &master_chain_code, account_path);
	let child_pub = PublicKey::from_secret_key(&SECP, &child_secret);

	MasterPublicKey {
		fingerprint,
		chain_code,
		pub_key: child_pub.serialize(),
	}
}

/// `childPubKey`: the non-hardened public key at `account_path/chain/index`.
pub fn child_pub_key(mpk: &MasterPublicKey, chain: u32, index: u32) -> [u8; 33] {
	let base_pub = PublicKey::from_slice(&mpk.pub_key).expect("stored master pubkey is always valid");
	let (chain_pub, chain_cc) = ckd_pub_normal(&base_pub, &mpk.chain_code, chain);
	let (index_pub, _) = ckd_pub_normal(&chain_pub, &chain_cc, index);
	index_pub.serialize()
}

/// `childPrivKeyList`: private keys at `account_path/chain/index` for each
/// of `indices` (by default `m/0'/chain/index`), derived in bulk from `seed`
/// so the path to the account is only walked once.
pub fn child_priv_key_list(seed: &[u8], account_path: &DerivationPath, chain: u32, indices: &[u32]) -> Vec<Key> {
	let (master_secret, master_chain_code) = master_from_seed(seed);
	let (base_secret, base_cc) = derive_path(&master_secret, &master_chain_code, account_path);
	let (chain_secret, chain_cc) = ckd_priv_normal(&base_secret, &base_cc, chain);

	indices
		.iter()
		.map(|&index| {
			let (secret, _) = ckd_priv_normal(&chain_secret, &chain_cc, index);
			Key::from_secret(secret, true)
		})
		.collect()
}

/// `apiAuthKey`: the private key at `auth_path` (by default `m/1'/0`), used
/// for authenticated API calls (bitauth-style).
pub fn api_auth_key(seed: &[u8], auth_path: &DerivationPath) -> Key {
	let (master_secret, master_chain_code) = master_from_seed(seed);
	let (secret, _) = derive_path(&master_secret, &master_chain_code, auth_path);
	Key::from_secret(secret, true)
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::str::FromStr;

	const SEED: &[u8] = b"000102030405060708090a0b0c0d0e0f";

	fn account_path() -> DerivationPath {
		DerivationPath::from_str("m/0'").unwrap()
	}

	fn auth_path() -> DerivationPath {
		DerivationPath::from_str("m/1'/0").unwrap()
	}

	#[test]
	fn master_pub_key_is_deterministic() {
		let a = derive_master_pub_key(SEED, &account_path());
		let b = derive_master_pub_key(SEED, &account_path());
		assert_eq!(a, b);
	}

	#[test]
	fn child_pub_key_matches_priv_key_derivation() {
		let mpk = derive_master_pub_key(SEED, &account_path());
		let pub_from_chain = child_pub_key(&mpk, 0, 0);
		let priv_keys = child_priv_key_list(SEED, &account_path(), 0, &[0]);
		let pub_from_priv = PublicKey::from_secret_key(&SECP, &priv_keys[0].secret_key().unwrap()).serialize();
		assert_eq!(pub_from_chain, pub_from_priv);
	}

	#[test]
	fn different_chains_diverge() {
		let mpk = derive_master_pub_key(SEED, &account_path());
		assert_ne!(child_pub_key(&mpk, 0, 0), child_pub_key(&mpk, 1, 0));
	}

	#[test]
	fn different_account_paths_diverge() {
		let a = derive_master_pub_key(SEED, &account_path());
		let b = derive_master_pub_key(SEED, &DerivationPath::from_str("m/1'").unwrap());
		assert_ne!(a.pub_key, b.pub_key);
	}

	#[test]
	fn auth_key_is_deterministic() {
		let a = api_auth_key(SEED, &auth_path());
		let b = api_auth_key(SEED, &auth_path());
		assert_eq!(a.secret_key().unwrap(), b.secret_key().unwrap());
	}
}
