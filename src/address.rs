//! Address encoding and script templates.
//!
//! Litecoin reuses Bitcoin's script templates but has its own Base58Check
//! version bytes (see [crate::config::Network]), so addresses are encoded
//! here directly rather than through `bitcoin::Address`, which is hardwired
//! to Bitcoin's own network set.

use bitcoin::blockdata::opcodes::all as opcodes;
use bitcoin::blockdata::script::{Builder, ScriptBuf};
use bitcoin::hashes::{hash160, Hash};

use crate::config::Network;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptTemplate {
	P2pkh,
	P2sh,
}

/// A short textual address plus its implicit script template. Equality and
/// hashing are by the encoded string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
	encoded: String,
	template: AddressTemplate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AddressTemplate {
	P2pkh(hash160::Hash),
	P2sh(hash160::Hash),
}

impl Address {
	pub fn p2pkh(pubkey_hash: hash160::Hash, network: Network) -> Address {
		Address {
			encoded: encode(network.p2pkh_version(), &pubkey_hash[..]),
			template: AddressTemplate::P2pkh(pubkey_hash),
		}
	}

	pub fn p2sh(script_hash: hash160::Hash, network: Network) -> Address {
		Address {
			encoded: encode(network.p2sh_version(), &script_hash[..]),
			template: AddressTemplate::P2sh(script_hash),
		}
	}

	/// Parses a Base58Check-encoded address for `network`. The 74-character
	/// ceiling (including the terminator) mirrors the upstream fixed buffer
	/// size; this implementation doesn't need a static cap but rejects
	/// anything implausibly long early.
	pub fn parse(s: &str, network: Network) -> Result<Address> {
		if s.len() >= 74 {
			return Err(Error::InvalidAddress("address string too long".into()));
		}
		let data = bs58::decode(s)
			.with_check(None)
			.into_vec()
			.map_err(|e| Error::InvalidAddress(e.to_string()))?;
		if data.len() != 21 {
			return Err(Error::InvalidAddress("unexpected payload length".into()));
		}
		let hash = hash160::Hash::from_slice(&data[1..]).expect("20 bytes checked above");
		if data[0] == network.p2pkh_version() {
			Ok(Address::p2pkh(hash, network))
		} else if data[0] == network.p2sh_version() {
			Ok(Address::p2sh(hash, network))
		} else {
			Err(Error::InvalidAddress("unrecognized version byte".into()))
		}
	}

	pub fn as_str(&self) -> &str {
		&self.encoded
	}

	pub fn template(&self) -> ScriptTemplate {
		match self.template {
			AddressTemplate::P2pkh(_) => ScriptTemplate::P2pkh,
			AddressTemplate::P2sh(_) => ScriptTemplate::P2sh,
		}
	}

	/// The scriptPubKey this address implies.
	pub fn script_pubkey(&self) -> ScriptBuf {
		match self.template {
			AddressTemplate::P2pkh(hash) => Builder::new()
				.push_opcode(opcodes::OP_DUP)
				.push_opcode(opcodes::OP_HASH160)
				.push_slice(hash.to_byte_array())
				.push_opcode(opcodes::OP_EQUALVERIFY)
				.push_opcode(opcodes::OP_CHECKSIG)
				.into_script(),
			AddressTemplate::P2sh(hash) => Builder::new()
				.push_opcode(opcodes::OP_HASH160)
				.push_slice(hash.to_byte_array())
				.push_opcode(opcodes::OP_EQUAL)
				.into_script(),
		}
	}

	/// Tries to recognize `script` as a P2PKH or P2SH scriptPubKey this
	/// crate produces, recovering the address that generated it.
	pub fn from_script_pubkey(script: &ScriptBuf, network: Network) -> Result<Address> {
		let bytes = script.as_bytes();
		if bytes.len() == 25
			&& bytes[0] == opcodes::OP_DUP.to_u8()
			&& bytes[1] == opcodes::OP_HASH160.to_u8()
			&& bytes[2] == 20
			&& bytes[23] == opcodes::OP_EQUALVERIFY.to_u8()
			&& bytes[24] == opcodes::OP_CHECKSIG.to_u8()
		{
			let hash = hash160::Hash::from_slice(&bytes[3..23]).expect("20 bytes checked above");
			return Ok(Address::p2pkh(hash, network));
		}
		if bytes.len() == 23
			&& bytes[0] == opcodes::OP_HASH160.to_u8()
			&& bytes[1] == 20
			&& bytes[22] == opcodes::OP_EQUAL.to_u8()
		{
			let hash = hash160::Hash::from_slice(&bytes[2..22]).expect("20 bytes checked above");
			return Ok(Address::p2sh(hash, network));
		}
		Err(Error::InvalidScript)
	}
}

impl std::fmt::Display for Address {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(&self.encoded)
	}
}

fn encode(version: u8, hash: &[u8]) -> String {
	let mut data = Vec::with_capacity(1 + hash.len());
	data.push(version);
	data.extend_from_slice(hash);
	bs58::encode(&data).with_check().into_string()
}
