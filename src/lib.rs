// Rust Litecoin Wallet
// Written in 2019 by
//   Steven Roose <steven@stevenroose.org>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the CC0 Public Domain Dedication
// along with this software.
// If not, see <http://creativecommons.org/publicdomain/zero/1.0/>.
//

//! # Rust Litecoin Wallet
//!
//! The transaction-graph bookkeeping core of a self-custodial Litecoin SPV
//! wallet: a deterministic HD keyset, a live UTXO set, coin selection and
//! the BIP70/75 payment protocol. Peer-to-peer networking, persistence and
//! UI are deliberately out of scope; see [wallet::Wallet] for the entry
//! point.

#![crate_name = "litecoin_wallet"]
#![crate_type = "rlib"]

// Coding conventions
#![forbid(unsafe_code)]
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

extern crate bitcoin;
extern crate bip39;
extern crate bs58;
extern crate byteorder;
extern crate chacha20poly1305;
extern crate hex;
extern crate hmac;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
extern crate rand;
extern crate ripemd;
extern crate secp256k1;
extern crate serde;
extern crate sha1;
extern crate sha2;
extern crate zeroize;

pub mod address;
pub mod bloom;
pub mod builder;
pub mod config;
pub mod crypto;
pub mod error;
pub mod key;
pub mod mnemonic;
pub mod payment_protocol;
pub mod seq;
pub mod set;
pub mod varint;
pub mod wallet;

lazy_static! {
	static ref SECP: secp256k1::Secp256k1<secp256k1::All> = secp256k1::Secp256k1::new();
}
