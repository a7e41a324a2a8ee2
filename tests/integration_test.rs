//! In-memory scenario tests exercising the public wallet API end to end,
//! with no network or external process involved.

use bitcoin::hashes::Hash as _;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

use litecoin_wallet::address::Address;
use litecoin_wallet::builder::{self, Output as BuilderOutput};
use litecoin_wallet::config::{self, Network, WalletConfig};
use litecoin_wallet::key::Key;
use litecoin_wallet::mnemonic;
use litecoin_wallet::payment_protocol::protobuf::varint_field;
use litecoin_wallet::payment_protocol::{self, Details, MessageType, PaymentRequest};
use litecoin_wallet::seq;
use litecoin_wallet::wallet::{Event, Wallet};

const CANONICAL: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn fresh_wallet() -> (Wallet, [u8; 64]) {
	let _ = env_logger::try_init();
	let seed = mnemonic::seed_from_phrase(CANONICAL, "").unwrap();
	(Wallet::from_seed(WalletConfig::new(Network::Mainnet), &seed), seed)
}

fn unsigned_deposit(addr: &Address, amount: u64) -> Transaction {
	Transaction {
		version: bitcoin::transaction::Version(1),
		lock_time: bitcoin::absolute::LockTime::ZERO,
		input: vec![TxIn {
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

fn mark_signed(tx: &mut Transaction) {
	for input in &mut tx.input {
		input.script_sig = ScriptBuf::from_bytes(vec![0x00]);
	}
}

#[test]
fn s1_fresh_wallet_receive_address_matches_m_0h_0_0() {
	let (wallet, seed) = fresh_wallet();
	assert_eq!(wallet.balance(), 0);

	let mpk = seq::derive_master_pub_key(&seed, &WalletConfig::new(Network::Mainnet).account_path);
	let expected_pubkey = seq::child_pub_key(&mpk, 0, 0);
	let expected_hash = bitcoin::hashes::hash160::Hash::hash(&expected_pubkey);
	let expected_addr = Address::p2pkh(expected_hash, Network::Mainnet);

	assert_eq!(wallet.receive_address(), expected_addr);
}

#[test]
fn s2_deposit_is_registered_and_counted() {
	let (wallet, _) = fresh_wallet();
	let addr = wallet.receive_address();
	let mut deposit = unsigned_deposit(&addr, 100_000_000);
	mark_signed(&mut deposit);

	let events = wallet.register(deposit, config::TX_UNCONFIRMED, 0).unwrap();
	assert!(events.iter().any(|e| matches!(e, Event::BalanceChanged(100_000_000))));
	assert_eq!(wallet.balance(), 100_000_000);
	assert_eq!(wallet.utxos().len(), 1);
	assert_eq!(wallet.total_received(), 100_000_000);
}

#[test]
fn s3_spend_produces_change_and_debits_amount_plus_fee() {
	let (wallet, seed) = fresh_wallet();
	let addr = wallet.receive_address();
	let mut deposit = unsigned_deposit(&addr, 100_000_000);
	mark_signed(&mut deposit);
	wallet.register(deposit, config::TX_UNCONFIRMED, 0).unwrap();

	let other = wallet.unused_addrs(1, false).into_iter().next().unwrap();
	let balance_before = wallet.balance();
	let receive_script = wallet.receive_address().script_pubkey();

	let mut tx = builder::create_tx_for_outputs(
		&wallet,
		&[BuilderOutput {
			address: other,
			amount: 50_000_000,
		}],
	)
	.unwrap();
	assert_eq!(tx.input.len(), 1);
	assert_eq!(tx.output.len(), 2);

	let all_signed = builder::sign(&wallet, &mut tx, 0, &seed).unwrap();
	assert!(all_signed);

	let spent_amount: u64 = tx.output.iter().filter(|o| o.script_pubkey != receive_script).map(|o| o.value.to_sat()).sum();
	assert_eq!(spent_amount, 50_000_000);

	wallet.register(tx, 100, 0).unwrap();
	let fee = balance_before - wallet.balance() - 50_000_000;
	assert!(fee > 0);
	assert_eq!(wallet.balance(), balance_before - 50_000_000 - fee);
}

#[test]
fn s4_reorg_unconfirms_spend_above_rollback_height() {
	let (wallet, seed) = fresh_wallet();
	let addr = wallet.receive_address();
	let mut deposit = unsigned_deposit(&addr, 100_000_000);
	mark_signed(&mut deposit);
	wallet.register(deposit, 50, 0).unwrap();

	let other = wallet.unused_addrs(1, false).into_iter().next().unwrap();
	let mut tx = builder::create_tx_for_outputs(
		&wallet,
		&[BuilderOutput {
			address: other,
			amount: 50_000_000,
		}],
	)
	.unwrap();
	builder::sign(&wallet, &mut tx, 0, &seed).unwrap();
	let spend_txid = tx.compute_txid();
	wallet.register(tx, 100, 0).unwrap();
	assert!(wallet.is_valid(&spend_txid));

	wallet.set_tx_unconfirmed_after(99).unwrap();
	assert_eq!(wallet.block_height(), 99);
	assert!(!wallet.is_verified(&spend_txid));
}

#[test]
fn s5_rbf_signaled_tx_enters_pending_tx_and_does_not_move_balance() {
	let (wallet, _) = fresh_wallet();
	let addr = wallet.receive_address();
	let mut deposit = unsigned_deposit(&addr, 100_000_000);
	mark_signed(&mut deposit);
	deposit.input[0].sequence = Sequence(0xffff_fffd);
	let txid = deposit.compute_txid();

	wallet.register(deposit, config::TX_UNCONFIRMED, 0).unwrap();
	assert!(wallet.is_pending(&txid));
	assert_eq!(wallet.balance(), 0);
}

#[test]
fn s6_payment_request_round_trips_with_unknown_field() {
	let details = Details {
		network: "main".to_string(),
		time: 1_700_000_000,
		..Details::default()
	};
	let mut req = PaymentRequest {
		pki_type: "x509+sha256".to_string(),
		serialized_payment_details: details.to_bytes(),
		..PaymentRequest::default()
	};
	// Inject an unknown field (field 999, VARINT, value 42) the way a newer
	// protocol version's extension would appear on the wire, then parse it
	// back in so `unknown` picks it up exactly like any other unrecognized
	// field.
	let mut bytes = req.to_bytes();
	bytes.extend(varint_field(999, 42).1);
	req = PaymentRequest::from_bytes(&bytes).unwrap();

	let bytes1 = req.to_bytes();
	let parsed = PaymentRequest::from_bytes(&bytes1).unwrap();
	let bytes2 = parsed.to_bytes();
	assert_eq!(bytes1, bytes2);
}

#[test]
fn s7_encrypted_message_round_trip_and_tamper_detection() {
	let receiver_key = Key::from_secret(bitcoin::secp256k1::SecretKey::from_slice(&[0x11; 32]).unwrap(), true);
	let sender_key = Key::from_secret(bitcoin::secp256k1::SecretKey::from_slice(&[0x22; 32]).unwrap(), true);

	let mut msg = payment_protocol::EncryptedProtocolMessage::new(MessageType::Payment, 1);
	msg.receiver_public_key = Some(receiver_key.public_key());
	msg.sender_public_key = Some(sender_key.public_key());

	let plaintext = vec![0x7au8; 100];
	payment_protocol::encrypt(&mut msg, &plaintext, &sender_key).unwrap();
	payment_protocol::sign(&mut msg, &sender_key).unwrap();

	assert!(payment_protocol::verify(&msg, &sender_key.public_key()));
	let decrypted = payment_protocol::decrypt(&msg, &receiver_key).unwrap();
	assert_eq!(decrypted, plaintext);

	let mut tampered = msg.clone();
	tampered.message[0] ^= 0x01;
	assert!(payment_protocol::decrypt(&tampered, &receiver_key).is_err());

	let mut bad_sig = msg.clone();
	bad_sig.signature[0] ^= 0x01;
	assert!(!payment_protocol::verify(&bad_sig, &sender_key.public_key()));
}
