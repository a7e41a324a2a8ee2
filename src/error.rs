//! The crate's flat error type.
//!
//! Every fallible operation in this crate returns [Result], which wraps the
//! single [Error] enum below rather than a per-module error type. This
//! mirrors the taxonomy of failure kinds the engine actually distinguishes:
//! parse errors (malformed wire data), policy errors (the builder refusing
//! to produce a transaction) and cryptographic failures. Programmer errors
//! (null/out-of-range arguments, signing an already-signed input) are not
//! represented here; they are `assert!`/`debug_assert!` panics at the call
//! site, same as upstream.

use std::{error, fmt, result};

use bitcoin::bip32;
use bitcoin::secp256k1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
	Secp256k1(secp256k1::Error),
	/// A BIP32 derivation path failed to parse, or a derivation step
	/// produced an invalid key.
	Bip32(bip32::Error),
	/// A BIP39 mnemonic failed validation: bad word count, unknown word or
	/// checksum mismatch.
	InvalidMnemonic(String),
	/// A Base58Check or scriptPubKey string did not decode to a valid address.
	InvalidAddress(String),
	/// A script did not match any template this crate understands.
	InvalidScript,
	/// A built transaction would exceed `TX_MAX_SIZE` even after shedding
	/// every output fee economics allow shedding.
	TxTooLarge,
	/// A requested output is below the dust floor for the current fee rate.
	OutputTooSmall,
	/// The wallet's UTXO set cannot cover the requested amount plus fee.
	InsufficientFunds,
	/// A chain tip update does not follow the wallet's last known block.
	BlockFork,
	/// An outpoint referenced by a call is not tracked by this wallet.
	UtxoNotInWallet,
	/// The same outpoint was supplied more than once to a single call.
	DuplicateUtxo,
	/// A public API was called before the wallet finished initializing.
	WalletNotFullyInitialized,
	/// A payment-protocol message did not parse as valid protobuf, or a
	/// required field was absent.
	ProtobufDecode(String),
	/// An AEAD seal or open operation failed (wrong key, tampered ciphertext).
	Aead,
	/// Neither `receiverPublicKey` nor `senderPublicKey` on an encrypted
	/// envelope matches the public key of the private key handed to
	/// `encrypt`/`decrypt`.
	KeyNotInMessage,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			Error::Secp256k1(ref e) => write!(f, "secp256k1 error: {}", e),
			Error::Bip32(ref e) => write!(f, "BIP-32 error: {}", e),
			Error::InvalidMnemonic(ref s) => write!(f, "invalid mnemonic: {}", s),
			Error::InvalidAddress(ref s) => write!(f, "invalid address: {}", s),
			Error::InvalidScript => f.write_str("script did not match a known template"),
			Error::TxTooLarge => f.write_str("transaction exceeds the maximum size even after trimming outputs"),
			Error::OutputTooSmall => f.write_str("output amount is below the dust floor"),
			Error::InsufficientFunds => f.write_str("not enough funds to fund the given transaction"),
			Error::BlockFork => f.write_str("block forks off the last known block"),
			Error::UtxoNotInWallet => f.write_str("a UTXO was used that is not part of the wallet"),
			Error::DuplicateUtxo => f.write_str("a UTXO has been provided more than once"),
			Error::WalletNotFullyInitialized => f.write_str("the wallet is not fully initialized yet"),
			Error::ProtobufDecode(ref s) => write!(f, "payment protocol decode error: {}", s),
			Error::Aead => f.write_str("AEAD seal/open failed"),
			Error::KeyNotInMessage => f.write_str("given key matches neither party on the encrypted envelope"),
		}
	}
}

impl error::Error for Error {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		match *self {
			Error::Secp256k1(ref e) => Some(e),
			Error::Bip32(ref e) => Some(e),
			_ => None,
		}
	}
}

impl From<secp256k1::Error> for Error {
	fn from(e: secp256k1::Error) -> Error {
		Error::Secp256k1(e)
	}
}

impl From<bip32::Error> for Error {
	fn from(e: bip32::Error) -> Error {
		Error::Bip32(e)
	}
}

pub type Result<T> = result::Result<T, Error>;
