//! The wallet state engine: address chains, the UTXO set, a topologically
//! ordered transaction history, and the balance/pending/invalid
//! classification that must stay consistent under out-of-order arrival,
//! height updates and reorgs.
//!
//! Every public operation on [Wallet] locks the whole state for its
//! duration and returns the [Event]s a host
//! would otherwise receive through callbacks; the caller dispatches them
//! after the lock (which this call already released) rather than the
//! wallet invoking a registered callback itself. Nested logic (gap-limit
//! growth during registration, cascading removal) runs against the
//! already-locked state directly instead of re-entering the public API, so
//! there is no re-entrant locking to reason about.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use bitcoin::hashes::Hash as _;
use bitcoin::{OutPoint, Transaction, Txid};

use crate::address::Address;
use crate::config::{self, Network, WalletConfig};
use crate::error::Result;
use crate::seq::{self, MasterPublicKey};
use crate::set::Set;

const EXTERNAL_CHAIN: u32 = 0;
const INTERNAL_CHAIN: u32 = 1;

/// A known transaction plus the chain-height/timestamp bookkeeping the
/// engine needs; hashed and compared by txid so it can live in a [Set].
#[derive(Debug, Clone)]
pub struct WalletTx {
	pub tx: Transaction,
	pub block_height: u32,
	pub timestamp: u32,
	txid: Txid,
}

impl WalletTx {
	pub fn new(tx: Transaction, block_height: u32, timestamp: u32) -> WalletTx {
		let txid = tx.compute_txid();
		WalletTx {
			tx,
			block_height,
			timestamp,
			txid,
		}
	}

	pub fn txid(&self) -> Txid {
		self.txid
	}

	pub fn is_confirmed(&self) -> bool {
		self.block_height != config::TX_UNCONFIRMED
	}

	fn is_signed(&self) -> bool {
		self.tx.input.iter().all(|i| !i.script_sig.is_empty() || !i.witness.is_empty())
	}

	fn is_rbf(&self) -> bool {
		self.tx.input.iter().any(|i| i.sequence.0 < 0xffff_fffe)
	}
}

impl PartialEq for WalletTx {
	fn eq(&self, other: &WalletTx) -> bool {
		self.txid == other.txid
	}
}
impl Eq for WalletTx {}

impl Hash for WalletTx {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.txid.hash(state);
	}
}

impl Borrow<Txid> for WalletTx {
	fn borrow(&self) -> &Txid {
		&self.txid
	}
}

/// Notifications a host would receive through the upstream callback
/// surface (`balanceChanged`, `txAdded`, `txUpdated`, `txDeleted`),
/// returned from each public operation instead of pushed through a
/// registered trait object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	BalanceChanged(u64),
	TxAdded(Txid),
	TxUpdated { txids: Vec<Txid>, height: u32, timestamp: u32 },
	TxDeleted { txid: Txid, notify_user: bool, recommend_rescan: bool },
}

struct WalletState {
	config: WalletConfig,
	master_pub_key: MasterPublicKey,

	external_chain: Vec<Address>,
	internal_chain: Vec<Address>,
	address_index: HashMap<Address, (bool, u32)>,

	all_tx: Set<WalletTx>,
	transactions: Vec<Txid>,
	utxos: Vec<OutPoint>,
	spent_outputs: Set<OutPoint>,
	used_addrs: Set<Address>,
	all_addrs: Set<Address>,
	invalid_tx: Set<Txid>,
	pending_tx: Set<Txid>,

	balance: u64,
	total_sent: u64,
	total_received: u64,
	balance_hist: Vec<u64>,

	block_height: u32,
}

/// The wallet: a deterministic HD keyset plus everything derived from the
/// transactions registered against it.
pub struct Wallet {
	inner: Mutex<WalletState>,
}

impl Wallet {
	pub fn new(config: WalletConfig, master_pub_key: MasterPublicKey) -> Wallet {
		let state = WalletState {
			config,
			master_pub_key,
			external_chain: Vec::new(),
			internal_chain: Vec::new(),
			address_index: HashMap::new(),
			all_tx: Set::new(),
			transactions: Vec::new(),
			utxos: Vec::new(),
			spent_outputs: Set::new(),
			used_addrs: Set::new(),
			all_addrs: Set::new(),
			invalid_tx: Set::new(),
			pending_tx: Set::new(),
			balance: 0,
			total_sent: 0,
			total_received: 0,
			balance_hist: Vec::new(),
			block_height: 0,
		};
		let mut wallet = Wallet { inner: Mutex::new(state) };
		// Pre-extend both chains by their gap limits so a fresh wallet
		// already has a receive address.
		{
			let mut state = wallet.inner.lock().unwrap();
			let (ext, int) = (state.config.gap_limit_external, state.config.gap_limit_internal);
			grow_chain(&mut state, false, ext);
			grow_chain(&mut state, true, int);
		}
		wallet
	}

	pub fn from_seed(config: WalletConfig, seed: &[u8]) -> Wallet {
		let mpk = seq::derive_master_pub_key(seed, &config.account_path);
		Wallet::new(config, mpk)
	}

	pub fn network(&self) -> Network {
		self.inner.lock().unwrap().config.network
	}

	pub fn master_pub_key(&self) -> MasterPublicKey {
		self.inner.lock().unwrap().master_pub_key
	}

	pub fn account_path(&self) -> bitcoin::bip32::DerivationPath {
		self.inner.lock().unwrap().config.account_path.clone()
	}

	/// The next unused external address; this is `unusedAddrs(1, false)`'s
	/// first entry, which for a fresh wallet with the default account path
	/// is `m/0'/0/0`.
	pub fn receive_address(&self) -> Address {
		self.unused_addrs(1, false)[0].clone()
	}

	/// Returns `gap_limit` fresh, never-before-returned addresses from the
	/// external (`internal = false`) or internal chain.
	pub fn unused_addrs(&self, gap_limit: usize, internal: bool) -> Vec<Address> {
		let mut state = self.inner.lock().unwrap();
		grow_chain(&mut state, internal, gap_limit);
		let chain = if internal { &state.internal_chain } else { &state.external_chain };
		chain[chain.len() - gap_limit..].to_vec()
	}

	pub fn balance(&self) -> u64 {
		self.inner.lock().unwrap().balance
	}

	pub fn total_sent(&self) -> u64 {
		self.inner.lock().unwrap().total_sent
	}

	pub fn total_received(&self) -> u64 {
		self.inner.lock().unwrap().total_received
	}

	pub fn block_height(&self) -> u32 {
		self.inner.lock().unwrap().block_height
	}

	pub fn fee_per_kb(&self) -> u64 {
		self.inner.lock().unwrap().config.fee_per_kb
	}

	pub fn set_fee_per_kb(&self, fee_per_kb: u64) {
		self.inner.lock().unwrap().config.fee_per_kb = fee_per_kb;
	}

	pub fn utxos(&self) -> Vec<OutPoint> {
		self.inner.lock().unwrap().utxos.clone()
	}

	pub fn transactions(&self) -> Vec<Txid> {
		self.inner.lock().unwrap().transactions.clone()
	}

	pub fn balance_hist(&self) -> Vec<u64> {
		self.inner.lock().unwrap().balance_hist.clone()
	}

	pub fn get_tx(&self, txid: &Txid) -> Option<Transaction> {
		self.inner.lock().unwrap().all_tx.get(txid).map(|w| w.tx.clone())
	}

	/// The chain (`false` = external, `true` = internal) and BIP32 index an
	/// address was derived at, if this wallet generated it.
	pub fn address_chain_index(&self, addr: &Address) -> Option<(bool, u32)> {
		self.inner.lock().unwrap().address_index.get(addr).copied()
	}

	pub fn is_valid(&self, txid: &Txid) -> bool {
		let state = self.inner.lock().unwrap();
		is_valid(&state, txid)
	}

	pub fn is_pending(&self, txid: &Txid) -> bool {
		let state = self.inner.lock().unwrap();
		state.pending_tx.contains(txid)
	}

	pub fn is_verified(&self, txid: &Txid) -> bool {
		let state = self.inner.lock().unwrap();
		is_verified(&state, txid)
	}

	/// Registers `tx` with the wallet. `tx` must already be signed; passing
	/// an unsigned transaction is a programmer error (see the crate's
	/// error-handling convention) and trips a debug assertion rather than
	/// returning [Error]. Returns no event if the tx was already known and
	/// wasn't relevant to this wallet.
	pub fn register(&self, tx: Transaction, block_height: u32, timestamp: u32) -> Result<Vec<Event>> {
		let mut state = self.inner.lock().unwrap();
		let wtx = WalletTx::new(tx, block_height, timestamp);
		if !wtx.is_signed() {
			debug_assert!(false, "register called with an unsigned transaction");
			return Ok(Vec::new());
		}
		let txid = wtx.txid();
		if state.all_tx.contains(&txid) {
			return Ok(Vec::new());
		}

		let relevant = wtx.tx.output.iter().any(|o| {
			Address::from_script_pubkey(&o.script_pubkey, state.config.network)
				.map(|a| state.all_addrs.contains(&a))
				.unwrap_or(false)
		}) || wtx.tx.input.iter().any(|i| {
			state
				.all_tx
				.get(&i.previous_output.txid)
				.and_then(|parent| parent.tx.output.get(i.previous_output.vout as usize))
				.and_then(|out| Address::from_script_pubkey(&out.script_pubkey, state.config.network).ok())
				.map(|a| state.all_addrs.contains(&a))
				.unwrap_or(false)
		});

		if !relevant {
			if !wtx.is_confirmed() {
				state.all_tx.add(wtx);
			}
			return Ok(Vec::new());
		}

		state.all_tx.add(wtx);
		insert_sorted(&mut state, txid);

		let (ext, int) = (state.config.gap_limit_external, state.config.gap_limit_internal);
		grow_chain(&mut state, false, ext);
		grow_chain(&mut state, true, int);

		recompute_derived_state(&mut state);
		info!("registered tx {} into the wallet, balance now {}", txid, state.balance);

		let mut events = vec![Event::BalanceChanged(state.balance)];
		events.push(Event::TxAdded(txid));
		Ok(events)
	}

	/// Removes `txid` and every transaction that (transitively) spends one
	/// of its outputs.
	pub fn remove(&self, txid: Txid) -> Result<Vec<Event>> {
		let mut state = self.inner.lock().unwrap();
		if !state.all_tx.contains(&txid) {
			return Ok(Vec::new());
		}

		let was_valid = is_valid(&state, &txid);
		let amount_sent = spent_by_wallet(&state, &txid);
		let all_inputs_confirmed = state
			.all_tx
			.get(&txid)
			.map(|w| {
				w.tx.input.iter().all(|i| {
					state.all_tx.get(&i.previous_output.txid).map(|p| p.is_confirmed()).unwrap_or(true)
				})
			})
			.unwrap_or(true);

		remove_recursive(&mut state, txid);
		recompute_derived_state(&mut state);
		info!("removed tx {} from the wallet, balance now {}", txid, state.balance);

		let mut events = vec![Event::BalanceChanged(state.balance)];
		events.push(Event::TxDeleted {
			txid,
			notify_user: was_valid && amount_sent > 0,
			recommend_rescan: was_valid && amount_sent > 0 && all_inputs_confirmed,
		});
		Ok(events)
	}

	/// Applies new `(height, timestamp)` for each known tx in `updates`,
	/// then recomputes derived state if membership in `pendingTx`/
	/// `invalidTx` changed for any of them.
	pub fn update_transactions(&self, updates: &[(Txid, u32, u32)], block_height: u32) -> Result<Vec<Event>> {
		let mut state = self.inner.lock().unwrap();
		state.block_height = state.block_height.max(block_height);

		let mut touched = Vec::new();
		for &(txid, height, timestamp) in updates {
			let Some(mut existing) = state.all_tx.remove(&txid) else { continue };
			if existing.block_height == height && existing.timestamp == timestamp {
				state.all_tx.add(existing);
				continue;
			}
			existing.block_height = height;
			existing.timestamp = timestamp;
			let in_history = state.transactions.contains(&txid);
			state.all_tx.add(existing);

			if in_history {
				resort(&mut state, txid);
				touched.push(txid);
			} else if height != config::TX_UNCONFIRMED {
				// A non-wallet tx we were only watching for conflicts became
				// confirmed; no longer worth tracking.
				state.all_tx.remove(&txid);
			}
		}

		if touched.is_empty() {
			return Ok(Vec::new());
		}
		recompute_derived_state(&mut state);

		Ok(vec![
			Event::BalanceChanged(state.balance),
			Event::TxUpdated {
				txids: touched,
				height: block_height,
				timestamp: updates.last().map(|u| u.2).unwrap_or(0),
			},
		])
	}

	/// A reorg rolled the chain back to `height`; every tx confirmed above
	/// it is now unconfirmed.
	pub fn set_tx_unconfirmed_after(&self, height: u32) -> Result<Vec<Event>> {
		let mut state = self.inner.lock().unwrap();
		let rolled_back: Vec<Txid> = state
			.all_tx
			.iter()
			.filter(|w| w.block_height > height && w.block_height != config::TX_UNCONFIRMED)
			.map(|w| w.txid())
			.collect();

		for txid in &rolled_back {
			if let Some(mut wtx) = state.all_tx.remove(txid) {
				wtx.block_height = config::TX_UNCONFIRMED;
				state.all_tx.add(wtx);
			}
			if state.transactions.contains(txid) {
				resort(&mut state, *txid);
			}
		}
		state.block_height = height;
		recompute_derived_state(&mut state);
		info!("reorg: {} tx unconfirmed after rollback to height {}", rolled_back.len(), height);

		let mut events = vec![Event::BalanceChanged(state.balance)];
		if !rolled_back.is_empty() {
			events.push(Event::TxUpdated {
				txids: rolled_back,
				height: config::TX_UNCONFIRMED,
				timestamp: 0,
			});
		}
		Ok(events)
	}
}

fn spent_by_wallet(state: &WalletState, txid: &Txid) -> u64 {
	let Some(wtx) = state.all_tx.get(txid) else { return 0 };
	wtx
		.tx
		.output
		.iter()
		.filter(|o| {
			Address::from_script_pubkey(&o.script_pubkey, state.config.network)
				.map(|a| !state.all_addrs.contains(&a))
				.unwrap_or(true)
		})
		.map(|o| o.value.to_sat())
		.sum()
}

fn remove_recursive(state: &mut WalletState, txid: Txid) {
	let descendants: Vec<Txid> = state
		.transactions
		.iter()
		.filter(|&&other| other != txid)
		.filter(|&&other| {
			state
				.all_tx
				.get(&other)
				.map(|w| w.tx.input.iter().any(|i| i.previous_output.txid == txid))
				.unwrap_or(false)
		})
		.cloned()
		.collect();

	for d in descendants {
		remove_recursive(state, d);
	}

	state.all_tx.remove(&txid);
	state.transactions.retain(|&t| t != txid);
}

fn insert_sorted(state: &mut WalletState, txid: Txid) {
	let pos = state
		.transactions
		.iter()
		.position(|&other| cmp(state, txid, other) == Ordering::Less)
		.unwrap_or(state.transactions.len());
	state.transactions.insert(pos, txid);
}

fn resort(state: &mut WalletState, txid: Txid) {
	state.transactions.retain(|&t| t != txid);
	insert_sorted(state, txid);
}

/// Orders two transactions by topological precedence, then block height
/// (with `TX_UNCONFIRMED` last), then chain index of the first output
/// address.
fn cmp(state: &WalletState, a: Txid, b: Txid) -> Ordering {
	if depends_on(state, b, a) {
		return Ordering::Less;
	}
	if depends_on(state, a, b) {
		return Ordering::Greater;
	}

	let (ha, hb) = (height_of(state, a), height_of(state, b));
	if ha != hb {
		return ha.cmp(&hb);
	}

	let (ia, ib) = (chain_index_of(state, a), chain_index_of(state, b));
	match (ia, ib) {
		(Some(ia), Some(ib)) => ia.cmp(&ib),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	}
}

fn height_of(state: &WalletState, txid: Txid) -> u32 {
	state.all_tx.get(&txid).map(|w| w.block_height).unwrap_or(config::TX_UNCONFIRMED)
}

/// True if `dependent` spends (directly or transitively) an output of
/// `ancestor`, chased through `allTx`.
fn depends_on(state: &WalletState, dependent: Txid, ancestor: Txid) -> bool {
	let mut stack = vec![dependent];
	let mut visited: Set<Txid> = Set::new();
	while let Some(txid) = stack.pop() {
		if visited.add(txid).is_some() {
			continue;
		}
		let Some(wtx) = state.all_tx.get(&txid) else { continue };
		for input in &wtx.tx.input {
			let parent = input.previous_output.txid;
			if parent == ancestor {
				return true;
			}
			stack.push(parent);
		}
	}
	false
}

/// Internal-chain-preferred, then external-chain, index of the first
/// output address of `txid` that appears in either chain.
fn chain_index_of(state: &WalletState, txid: Txid) -> Option<u32> {
	let wtx = state.all_tx.get(&txid)?;
	let addrs: Vec<Address> = wtx
		.tx
		.output
		.iter()
		.filter_map(|o| Address::from_script_pubkey(&o.script_pubkey, state.config.network).ok())
		.collect();

	addrs
		.iter()
		.filter_map(|a| state.address_index.get(a))
		.filter(|(internal, _)| *internal)
		.map(|(_, idx)| *idx)
		.min()
		.or_else(|| {
			addrs
				.iter()
				.filter_map(|a| state.address_index.get(a))
				.filter(|(internal, _)| !*internal)
				.map(|(_, idx)| *idx)
				.min()
		})
}

/// Clears and recomputes every derived field by scanning `transactions`
/// in order.
fn recompute_derived_state(state: &mut WalletState) {
	state.utxos.clear();
	state.balance_hist.clear();
	state.spent_outputs.clear();
	state.invalid_tx.clear();
	state.pending_tx.clear();
	state.used_addrs.clear();
	state.balance = 0;
	state.total_sent = 0;
	state.total_received = 0;

	let txids = state.transactions.clone();
	for txid in txids {
		let Some(wtx) = state.all_tx.get(&txid).cloned() else { continue };
		let prev_balance = state.balance;

		if !wtx.is_confirmed() {
			let conflicted = wtx.tx.input.iter().any(|i| {
				state.spent_outputs.contains(&i.previous_output)
					|| state.invalid_tx.contains(&i.previous_output.txid)
			});
			if conflicted {
				warn!("tx {} classified invalid: conflicts with an earlier spend", txid);
				state.invalid_tx.add(txid);
				state.balance_hist.push(prev_balance);
				continue;
			}
		}

		for input in &wtx.tx.input {
			state.spent_outputs.add(input.previous_output);
		}

		if !wtx.is_confirmed() {
			let pending = is_pending_classification(state, &wtx);
			if pending {
				warn!("tx {} classified pending", txid);
				state.pending_tx.add(txid);
				state.balance_hist.push(prev_balance);
				continue;
			}
		}

		for (vout, output) in wtx.tx.output.iter().enumerate() {
			let Ok(addr) = Address::from_script_pubkey(&output.script_pubkey, state.config.network) else {
				continue;
			};
			state.used_addrs.add(addr.clone());
			if state.all_addrs.contains(&addr) {
				state.utxos.push(OutPoint {
					txid,
					vout: vout as u32,
				});
				state.balance += output.value.to_sat();
			}
		}

		// Backward scan: drop any outpoint that turned out to already be
		// spent by a transaction earlier in the order.
		let mut i = state.utxos.len();
		while i > 0 {
			i -= 1;
			if state.spent_outputs.contains(&state.utxos[i]) {
				let removed = state.utxos.remove(i);
				if let Some(parent) = state.all_tx.get(&removed.txid) {
					if let Some(out) = parent.tx.output.get(removed.vout as usize) {
						state.balance -= out.value.to_sat();
					}
				}
			}
		}

		if state.balance >= prev_balance {
			state.total_received += state.balance - prev_balance;
		} else {
			state.total_sent += prev_balance - state.balance;
		}
		state.balance_hist.push(state.balance);
	}
}

/// Decides whether `wtx` belongs in the pending set given the rest of the
/// wallet's current derived state.
fn is_pending_classification(state: &WalletState, wtx: &WalletTx) -> bool {
	if wtx.tx.vsize() > config::TX_MAX_SIZE {
		return true;
	}
	if wtx.tx.output.iter().any(|o| o.value.to_sat() < config::TX_MIN_OUTPUT_AMOUNT) {
		return true;
	}
	if wtx.is_rbf() {
		return true;
	}
	// Height-based locktimes in the future make the tx non-final; epoch-based
	// locktimes would need a wall-clock reading the core deliberately has no
	// access to, so a tx using one is treated as pending until it confirms.
	let lock_time = wtx.tx.lock_time.to_consensus_u32();
	if lock_time != 0 {
		let non_final = if lock_time < config::TX_MAX_LOCK_HEIGHT {
			lock_time > state.block_height + 1
		} else {
			true
		};
		if non_final && wtx.tx.input.iter().any(|i| i.sequence.0 < 0xffff_ffff) {
			return true;
		}
	}
	wtx.tx.input.iter().any(|i| state.pending_tx.contains(&i.previous_output.txid))
}

fn is_valid(state: &WalletState, txid: &Txid) -> bool {
	let Some(wtx) = state.all_tx.get(txid) else { return false };
	if wtx.is_confirmed() {
		return true;
	}
	if state.invalid_tx.contains(txid) {
		return false;
	}
	wtx.tx.input.iter().all(|i| is_valid(state, &i.previous_output.txid))
}

fn is_verified(state: &WalletState, txid: &Txid) -> bool {
	let Some(wtx) = state.all_tx.get(txid) else { return false };
	if wtx.is_confirmed() {
		return true;
	}
	wtx.timestamp > 0
		&& is_valid(state, txid)
		&& !state.pending_tx.contains(txid)
		&& wtx.tx.input.iter().all(|i| is_verified(state, &i.previous_output.txid))
}

/// Gap-limit growth: walk from the tail of `chain` while addresses are
/// unused, extend until at least `gap_limit` fresh addresses follow the
/// last used one.
fn grow_chain(state: &mut WalletState, internal: bool, gap_limit: usize) {
	trace!("growing {} chain to a gap limit of {}", if internal { "internal" } else { "external" }, gap_limit);
	loop {
		let chain_len = if internal { state.internal_chain.len() } else { state.external_chain.len() };
		let first_used_from_tail = {
			let chain = if internal { &state.internal_chain } else { &state.external_chain };
			let mut i = chain_len;
			while i > 0 && !state.used_addrs.contains(&chain[i - 1]) {
				i -= 1;
			}
			i
		};

		if chain_len >= first_used_from_tail + gap_limit {
			break;
		}

		let chain_const = if internal { INTERNAL_CHAIN } else { EXTERNAL_CHAIN };
		let index = chain_len as u32;
		let pubkey = seq::child_pub_key(&state.master_pub_key, chain_const, index);
		let hash = bitcoin::hashes::hash160::Hash::hash(&pubkey);
		let address = Address::p2pkh(hash, state.config.network);

		debug!("derived address {} at chain {} index {}", address, chain_const, index);
		state.all_addrs.add(address.clone());
		state.address_index.insert(address.clone(), (internal, index));
		if internal {
			state.internal_chain.push(address);
		} else {
			state.external_chain.push(address);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::WalletConfig;
	use crate::mnemonic;
	use bitcoin::{Amount, ScriptBuf, Sequence, TxOut, Witness};

	const CANONICAL: &str =
		"abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

	fn fresh_wallet() -> Wallet {
		let seed = mnemonic::seed_from_phrase(CANONICAL, "").unwrap();
		Wallet::from_seed(WalletConfig::new(Network::Mainnet), &seed)
	}

	fn pay_to(addr: &Address, amount: u64) -> Transaction {
		Transaction {
			version: bitcoin::transaction::Version(1),
			lock_time: bitcoin::absolute::LockTime::ZERO,
			input: vec![bitcoin::TxIn {
				previous_output: OutPoint::null(),
				script_sig: ScriptBuf::new(),
				sequence: Sequence(config::TXIN_SEQUENCE),
				witness: Witness::new(),
			}],
			output: vec![TxOut {
				value: Amount::from_sat(amount),
				script_pubkey: addr.script_pubkey(),
			}],
		}
	}

	#[test]
	fn s1_fresh_wallet_has_zero_balance_and_receive_address() {
		let wallet = fresh_wallet();
		assert_eq!(wallet.balance(), 0);
		let addr = wallet.receive_address();
		assert_eq!(addr.template(), crate::address::ScriptTemplate::P2pkh);
	}

	#[test]
	fn s2_deposit_is_registered_and_counted() {
		let wallet = fresh_wallet();
		let addr = wallet.receive_address();
		let mut deposit = pay_to(&addr, 100_000_000);
		// Mark the input as "signed" so `register` accepts it.
		deposit.input[0].script_sig = ScriptBuf::from_bytes(vec![0x00]);

		let events = wallet.register(deposit, config::TX_UNCONFIRMED, 0).unwrap();
		assert!(events.iter().any(|e| matches!(e, Event::BalanceChanged(100_000_000))));
		assert_eq!(wallet.balance(), 100_000_000);
		assert_eq!(wallet.utxos().len(), 1);
		assert_eq!(wallet.total_received(), 100_000_000);
	}

	#[test]
	fn p5_reregistering_known_tx_is_a_no_op() {
		let wallet = fresh_wallet();
		let addr = wallet.receive_address();
		let mut deposit = pay_to(&addr, 100_000_000);
		deposit.input[0].script_sig = ScriptBuf::from_bytes(vec![0x00]);

		wallet.register(deposit.clone(), 10, 0).unwrap();
		let balance_before = wallet.balance();
		let events = wallet.register(deposit, 10, 0).unwrap();
		assert!(events.is_empty());
		assert_eq!(wallet.balance(), balance_before);
	}

	#[test]
	fn p6_register_then_remove_restores_balance() {
		let wallet = fresh_wallet();
		let addr = wallet.receive_address();
		let mut deposit = pay_to(&addr, 100_000_000);
		deposit.input[0].script_sig = ScriptBuf::from_bytes(vec![0x00]);
		let txid = deposit.compute_txid();

		wallet.register(deposit, config::TX_UNCONFIRMED, 0).unwrap();
		assert_eq!(wallet.balance(), 100_000_000);

		wallet.remove(txid).unwrap();
		assert_eq!(wallet.balance(), 0);
		assert_eq!(wallet.total_received(), 0);
		assert_eq!(wallet.utxos().len(), 0);
	}

	#[test]
	fn p1_p2_p3_p4_hold_after_deposit_and_spend() {
		let wallet = fresh_wallet();
		let addr = wallet.receive_address();
		let mut deposit = pay_to(&addr, 100_000_000);
		deposit.input[0].script_sig = ScriptBuf::from_bytes(vec![0x00]);
		let deposit_txid = deposit.compute_txid();
		wallet.register(deposit, 10, 0).unwrap();

		let other = wallet.unused_addrs(1, false).into_iter().next().unwrap();
		let spend = Transaction {
			version: bitcoin::transaction::Version(1),
			lock_time: bitcoin::absolute::LockTime::ZERO,
			input: vec![bitcoin::TxIn {
				previous_output: OutPoint {
					txid: deposit_txid,
					vout: 0,
				},
				script_sig: ScriptBuf::from_bytes(vec![0x00]),
				sequence: Sequence(config::TXIN_SEQUENCE),
				witness: Witness::new(),
			}],
			output: vec![TxOut {
				value: Amount::from_sat(40_000_000),
				script_pubkey: other.script_pubkey(),
			}],
		};
		let spend_txid = spend.compute_txid();
		wallet.register(spend.clone(), 20, 0).unwrap();

		// P1: one balance-history entry per recorded transaction.
		assert_eq!(wallet.balance_hist().len(), wallet.transactions().len());

		// P2: balance equals the sum of UTXO amounts.
		let utxo_sum: u64 = wallet
			.utxos()
			.iter()
			.map(|o| wallet.get_tx(&o.txid).unwrap().output[o.vout as usize].value.to_sat())
			.sum();
		assert_eq!(wallet.balance(), utxo_sum);

		// P3: every UTXO's owning tx is known and its outpoint isn't spent.
		for outpoint in wallet.utxos() {
			let owner = wallet.get_tx(&outpoint.txid);
			assert!(owner.is_some());
			assert!(owner.unwrap().output.get(outpoint.vout as usize).is_some());
		}

		// P4: the spend is ordered after the deposit it spends.
		let order = wallet.transactions();
		let deposit_pos = order.iter().position(|t| *t == deposit_txid).unwrap();
		let spend_pos = order.iter().position(|t| *t == spend_txid).unwrap();
		assert!(deposit_pos < spend_pos);
	}

	#[test]
	fn s5_rbf_signaled_tx_is_pending_not_balance_affecting() {
		let wallet = fresh_wallet();
		let addr = wallet.receive_address();
		let mut deposit = pay_to(&addr, 100_000_000);
		deposit.input[0].script_sig = ScriptBuf::from_bytes(vec![0x00]);
		deposit.input[0].sequence = Sequence(0xffff_fffd);
		let txid = deposit.compute_txid();

		wallet.register(deposit, config::TX_UNCONFIRMED, 0).unwrap();
		assert!(wallet.is_pending(&txid));
		assert_eq!(wallet.balance(), 0);
	}
}
