//! Coin selection and fee-adjusting transaction construction.
//!
//! `create_tx_for_outputs` walks the wallet's UTXOs in stored order,
//! appending inputs until the requested outputs, a change output and the
//! fee they imply all fit inside `TX_MAX_SIZE`; `sign` then fills in every
//! input's scriptSig against the wallet's derived keys.

use std::collections::HashMap;

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash as _;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Amount, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

use crate::address::Address;
use crate::config;
use crate::error::{Error, Result};
use crate::seq;
use crate::wallet::Wallet;

/// A requested payment: an address and an amount in satoshi.
#[derive(Debug, Clone)]
pub struct Output {
	pub address: Address,
	pub amount: u64,
}

/// `fee(n) = max(ceil(n/1000)*TX_FEE_PER_KB, ceil(n*feePerKb/1000/100)*100)`.
fn fee(size: usize, fee_per_kb: u64) -> u64 {
	let size = size as u64;
	let floor = div_ceil(size, 1000) * config::TX_FEE_PER_KB;
	let scaled = div_ceil(size * fee_per_kb, 1000);
	let rounded = div_ceil(scaled, 100) * 100;
	floor.max(rounded)
}

fn div_ceil(a: u64, b: u64) -> u64 {
	(a + b - 1) / b
}

/// `minOutputAmount`: the dust floor, scaled up from the protocol minimum if
/// the wallet's fee rate exceeds `MIN_FEE_PER_KB`.
pub fn min_output_amount(fee_per_kb: u64) -> u64 {
	let scaled = div_ceil(config::TX_MIN_OUTPUT_AMOUNT * fee_per_kb, config::MIN_FEE_PER_KB);
	config::TX_MIN_OUTPUT_AMOUNT.max(scaled)
}

/// `maxOutputAmount`: everything the wallet owns, minus the fee a
/// single-output sweep spending every UTXO would cost.
pub fn max_output_amount(wallet: &Wallet) -> u64 {
	let utxos = wallet.utxos();
	let total: u64 = utxos
		.iter()
		.filter_map(|o| {
			wallet.get_tx(&o.txid).and_then(|t| t.output.get(o.vout as usize).map(|out| out.value.to_sat()))
		})
		.sum();

	let n = utxos.len() as u64;
	let size = 8 + crate::varint::encode(n).len() as u64
		+ config::TX_INPUT_SIZE as u64 * n
		+ crate::varint::encode(2).len() as u64
		+ 2 * config::TX_OUTPUT_SIZE as u64;
	total.saturating_sub(fee(size as usize, wallet.fee_per_kb()))
}

fn unsigned_input(outpoint: bitcoin::OutPoint) -> TxIn {
	TxIn {
		previous_output: outpoint,
		script_sig: ScriptBuf::new(),
		sequence: Sequence(config::TXIN_SEQUENCE),
		witness: Witness::new(),
	}
}

fn draft_size(inputs: &[TxIn], outputs: &[TxOut]) -> usize {
	Transaction {
		version: Version(1),
		lock_time: LockTime::ZERO,
		input: inputs.to_vec(),
		output: outputs.to_vec(),
	}
	.vsize()
}

/// Builds an unsigned transaction paying `requested`, selecting UTXOs in
/// the wallet's stored order and appending a change output back to a
/// fresh internal address when the leftover exceeds the dust floor.
pub fn create_tx_for_outputs(wallet: &Wallet, requested: &[Output]) -> Result<Transaction> {
	if requested.is_empty() {
		return Err(Error::InsufficientFunds);
	}
	build(wallet, requested.to_vec(), 0)
}

fn build(wallet: &Wallet, mut outputs: Vec<Output>, depth: usize) -> Result<Transaction> {
	if outputs.is_empty() {
		return Err(Error::InsufficientFunds);
	}
	// The only recursion here is the fee-loop restart on an oversized draft,
	// bounded by shedding at most one output per level.
	debug_assert!(depth <= outputs.len() + 1);

	let fee_per_kb = wallet.fee_per_kb();
	let amount: u64 = outputs.iter().map(|o| o.amount).sum();
	let mut tx_outputs: Vec<TxOut> = outputs
		.iter()
		.map(|o| TxOut {
			value: Amount::from_sat(o.amount),
			script_pubkey: o.address.script_pubkey(),
		})
		.collect();
	let mut tx_inputs: Vec<TxIn> = Vec::new();

	let mut fee_amount = fee(draft_size(&tx_inputs, &tx_outputs) + config::TX_OUTPUT_SIZE, fee_per_kb);
	let mut balance = 0u64;

	for outpoint in wallet.utxos() {
		let Some(parent) = wallet.get_tx(&outpoint.txid) else { continue };
		let Some(parent_out) = parent.output.get(outpoint.vout as usize) else { continue };

		tx_inputs.push(unsigned_input(outpoint));
		balance += parent_out.value.to_sat();

		let size = draft_size(&tx_inputs, &tx_outputs);
		if size + config::TX_OUTPUT_SIZE > config::TX_MAX_SIZE {
			let all_utxos = wallet.utxos().len() as u64;
			let projected_fee = fee(
				(10 + all_utxos * config::TX_INPUT_SIZE as u64 + (outputs.len() as u64 + 1) * config::TX_OUTPUT_SIZE as u64)
					as usize,
				fee_per_kb,
			);
			if wallet.balance() < amount + projected_fee {
				return Err(Error::TxTooLarge);
			}

			let deficit = (size + config::TX_OUTPUT_SIZE - config::TX_MAX_SIZE) as u64;
			let last = outputs.len() - 1;
			let floor = min_output_amount(fee_per_kb);
			if outputs[last].amount > floor + deficit {
				outputs[last].amount -= deficit;
			} else {
				outputs.pop();
			}
			return build(wallet, outputs, depth + 1);
		}

		fee_amount = fee(size + config::TX_OUTPUT_SIZE, fee_per_kb);
		if balance > amount + fee_amount {
			let remainder = balance - amount - fee_amount;
			let rounding = (100 - remainder % 100) % 100;
			fee_amount += rounding;
		}

		if balance == amount + fee_amount || balance >= amount + fee_amount + min_output_amount(fee_per_kb) {
			break;
		}
	}

	if outputs.is_empty() || balance < amount + fee_amount {
		return Err(Error::InsufficientFunds);
	}

	let change = balance - amount - fee_amount;
	if change > min_output_amount(fee_per_kb) {
		let change_addr = wallet.unused_addrs(1, true).into_iter().next().expect("gapLimit 1 always returns one address");
		tx_outputs.push(TxOut {
			value: Amount::from_sat(change),
			script_pubkey: change_addr.script_pubkey(),
		});
	}

	// Deterministic "shuffle": ordering by scriptPubkey bytes hides which
	// output index is the change without needing an RNG in the builder.
	tx_outputs.sort_by(|a, b| a.script_pubkey.as_bytes().cmp(b.script_pubkey.as_bytes()));

	Ok(Transaction {
		version: Version(1),
		lock_time: LockTime::ZERO,
		input: tx_inputs,
		output: tx_outputs,
	})
}

/// `sign`: resolves each input's owning chain/index, derives private keys in
/// bulk per chain, and fills in legacy P2PKH scriptSigs. `fork_id` folds
/// into the upper bits of the sighash type for chains that use replay
/// protection; Litecoin itself does not, so production callers pass `0`.
/// Returns whether every input ended up signed.
pub fn sign(wallet: &Wallet, tx: &mut Transaction, fork_id: u32, seed: &[u8]) -> Result<bool> {
	let network = wallet.network();

	let mut by_chain: HashMap<u32, Vec<u32>> = HashMap::new();
	let mut input_chain_index: Vec<Option<(u32, u32)>> = Vec::with_capacity(tx.input.len());
	let mut script_codes: Vec<Option<ScriptBuf>> = Vec::with_capacity(tx.input.len());

	for input in &tx.input {
		let Some(parent) = wallet.get_tx(&input.previous_output.txid) else {
			input_chain_index.push(None);
			script_codes.push(None);
			continue;
		};
		let Some(parent_out) = parent.output.get(input.previous_output.vout as usize) else {
			input_chain_index.push(None);
			script_codes.push(None);
			continue;
		};
		let Ok(addr) = Address::from_script_pubkey(&parent_out.script_pubkey, network) else {
			input_chain_index.push(None);
			script_codes.push(None);
			continue;
		};
		match wallet.address_chain_index(&addr) {
			Some((internal, index)) => {
				let chain = if internal { 1 } else { 0 };
				by_chain.entry(chain).or_default().push(index);
				input_chain_index.push(Some((chain, index)));
				script_codes.push(Some(parent_out.script_pubkey.clone()));
			}
			None => {
				input_chain_index.push(None);
				script_codes.push(None);
			}
		}
	}

	let account_path = wallet.account_path();
	let mut keys_by_chain: HashMap<u32, HashMap<u32, crate::key::Key>> = HashMap::new();
	for (&chain, indices) in &by_chain {
		let keys = seq::child_priv_key_list(seed, &account_path, chain, indices);
		let mut by_index = HashMap::new();
		for (index, key) in indices.iter().zip(keys) {
			by_index.insert(*index, key);
		}
		keys_by_chain.insert(chain, by_index);
	}

	let sighash_type = EcdsaSighashType::All;
	let mut digests = Vec::with_capacity(tx.input.len());
	{
		let cache = SighashCache::new(&*tx);
		for (i, script_code) in script_codes.iter().enumerate() {
			let Some(script_code) = script_code else {
				digests.push(None);
				continue;
			};
			let hash_type = sighash_type.to_u32() | (fork_id << 8);
			let digest = cache
				.legacy_signature_hash(i, script_code, hash_type)
				.map_err(|_| Error::InvalidScript)?;
			digests.push(Some(digest.to_byte_array()));
		}
	}

	let mut all_signed = true;
	for (i, digest) in digests.into_iter().enumerate() {
		let (Some((chain, index)), Some(digest)) = (input_chain_index[i], digest) else {
			all_signed = false;
			continue;
		};
		let Some(key) = keys_by_chain.get(&chain).and_then(|m| m.get(&index)) else {
			all_signed = false;
			continue;
		};

		let mut sig = key.sign_der(&digest);
		sig.push(sighash_type.to_u32() as u8);
		let script_sig = bitcoin::blockdata::script::Builder::new()
			.push_slice(bitcoin::script::PushBytesBuf::try_from(sig).expect("DER signature plus hash type byte fits a push"))
			.push_slice(
				bitcoin::script::PushBytesBuf::try_from(key.pub_key_bytes()).expect("compressed or uncompressed pubkey fits a push"),
			)
			.into_script();
		tx.input[i].script_sig = script_sig;
	}

	Ok(all_signed)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{Network, WalletConfig};
	use crate::mnemonic;

	const CANONICAL: &str =
		"abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

	#[test]
	fn fee_is_monotonic_in_fee_per_kb() {
		let low = fee(1000, 1_000);
		let high = fee(1000, 10_000);
		assert!(high >= low);
	}

	#[test]
	fn fee_never_drops_below_the_floor() {
		assert_eq!(fee(500, 0), config::TX_FEE_PER_KB);
	}

	#[test]
	fn insufficient_funds_on_empty_wallet() {
		let seed = mnemonic::seed_from_phrase(CANONICAL, "").unwrap();
		let wallet = Wallet::from_seed(WalletConfig::new(Network::Mainnet), &seed);
		let out = Output {
			address: wallet.receive_address(),
			amount: 1_000,
		};
		assert_eq!(create_tx_for_outputs(&wallet, &[out]), Err(Error::InsufficientFunds));
	}

	#[test]
	fn no_outputs_is_rejected() {
		let seed = mnemonic::seed_from_phrase(CANONICAL, "").unwrap();
		let wallet = Wallet::from_seed(WalletConfig::new(Network::Mainnet), &seed);
		assert!(create_tx_for_outputs(&wallet, &[]).is_err());
	}

	#[test]
	fn signed_input_verifies_against_the_derived_pubkey() {
		let seed = mnemonic::seed_from_phrase(CANONICAL, "").unwrap();
		let wallet = Wallet::from_seed(WalletConfig::new(Network::Mainnet), &seed);
		let addr = wallet.receive_address();

		let deposit = Transaction {
			version: bitcoin::transaction::Version(1),
			lock_time: bitcoin::absolute::LockTime::ZERO,
			input: vec![TxIn {
				previous_output: bitcoin::OutPoint::null(),
				script_sig: ScriptBuf::new(),
				sequence: Sequence(config::TXIN_SEQUENCE),
				witness: Witness::new(),
			}],
			output: vec![TxOut {
				value: Amount::from_sat(100_000_000),
				script_pubkey: addr.script_pubkey(),
			}],
		};
		let mut deposit_signed = deposit.clone();
		deposit_signed.input[0].script_sig = ScriptBuf::from_bytes(vec![0x00]);
		wallet.register(deposit_signed, config::TX_UNCONFIRMED, 0).unwrap();

		let other = wallet.unused_addrs(1, false).into_iter().next().unwrap();
		let mut tx = create_tx_for_outputs(
			&wallet,
			&[Output {
				address: other,
				amount: 50_000_000,
			}],
		)
		.unwrap();
		assert!(sign(&wallet, &mut tx, 0, &seed).unwrap());

		let script_code = &deposit.output[0].script_pubkey;
		let digest = SighashCache::new(&tx)
			.legacy_signature_hash(0, script_code, EcdsaSighashType::All.to_u32())
			.unwrap();

		let push_bytes = tx.input[0].script_sig.instructions().collect::<Result<Vec<_>, _>>().unwrap();
		let (sig_push, pk_push) = match &push_bytes[..] {
			[bitcoin::script::Instruction::PushBytes(sig), bitcoin::script::Instruction::PushBytes(pk)] => (sig.as_bytes(), pk.as_bytes()),
			_ => panic!("expected a two-push P2PKH scriptSig"),
		};
		let der_sig = &sig_push[..sig_push.len() - 1];
		let pubkey = bitcoin::secp256k1::PublicKey::from_slice(pk_push).unwrap();
		assert!(crate::crypto::ecdsa_verify_der(&pubkey, &digest.to_byte_array(), der_sig));
	}
}
