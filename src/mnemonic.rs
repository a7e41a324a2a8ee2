//! BIP39 mnemonic phrases.
//!
//! Word list validation, checksum verification and the PBKDF2-HMAC-SHA512
//! seed stretch are delegated to the `bip39` crate; this module just narrows
//! its API down to the two entry points the wallet engine actually needs
//! and maps its errors onto ours.

use bip39::Mnemonic;

use crate::error::{Error, Result};

/// Validates `phrase` and stretches it into the 64-byte seed that feeds HD
/// derivation (`"mnemonic" ∥ passphrase` salt, 2048 PBKDF2-HMAC-SHA512
/// rounds). Fails if the word count is not a multiple of 3, any word is
/// not in the wordlist, or the trailing checksum bits do not match.
pub fn seed_from_phrase(phrase: &str, passphrase: &str) -> Result<[u8; 64]> {
	let mnemonic = parse(phrase)?;
	Ok(mnemonic.to_seed(passphrase))
}

/// Parses and validates `phrase` without deriving a seed.
pub fn parse(phrase: &str) -> Result<Mnemonic> {
	Mnemonic::parse_normalized(phrase).map_err(|e| Error::InvalidMnemonic(e.to_string()))
}

/// Encodes raw entropy (16-32 bytes, a multiple of 4) into a checksummed
/// mnemonic phrase.
pub fn generate(entropy: &[u8]) -> Result<Mnemonic> {
	Mnemonic::from_entropy(entropy).map_err(|e| Error::InvalidMnemonic(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	const CANONICAL: &str =
		"abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

	#[test]
	fn canonical_phrase_parses() {
		assert!(parse(CANONICAL).is_ok());
	}

	#[test]
	fn seed_is_deterministic() {
		let a = seed_from_phrase(CANONICAL, "").unwrap();
		let b = seed_from_phrase(CANONICAL, "").unwrap();
		assert_eq!(a, b);
		let c = seed_from_phrase(CANONICAL, "tresor").unwrap();
		assert_ne!(a, c);
	}

	#[test]
	fn bad_word_count_rejected() {
		assert!(parse("abandon abandon").is_err());
	}

	#[test]
	fn unknown_word_rejected() {
		assert!(parse(
			"zzzzz abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"
		)
		.is_err());
	}

	#[test]
	fn bad_checksum_rejected() {
		// Same word count and wordlist membership as the canonical phrase,
		// but the last word does not satisfy the checksum for this entropy.
		assert!(parse(
			"abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon"
		)
		.is_err());
	}
}
