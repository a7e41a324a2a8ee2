//! BIP70 payment requests and the BIP75 ECDH-AEAD encrypted envelope built
//! on top of them.
//!
//! [ProtocolMessage] carries one of the message types in [messages] by type
//! tag plus raw bytes; [EncryptedProtocolMessage] wraps an encrypted (or
//! about-to-be-encrypted) payload of the same shape, bound to a sender and
//! receiver public key pair and a nonce.

pub mod messages;
pub mod protobuf;

pub use messages::{Details, InvoiceRequest, Output, Payment, PaymentACK, PaymentRequest};

use bitcoin::secp256k1::PublicKey;

use self::protobuf::{bytes_field, parse_fields, string_field, varint_field, FieldValue, UnknownFields};
use crate::crypto;
use crate::error::{Error, Result};
use crate::key::Key;

fn require_bytes(value: &FieldValue, what: &str) -> Result<Vec<u8>> {
	match value {
		FieldValue::Bytes(b) => Ok(b.clone()),
		_ => Err(Error::ProtobufDecode(format!("{} is not a length-delimited field", what))),
	}
}

fn require_varint(value: &FieldValue, what: &str) -> Result<u64> {
	match value {
		FieldValue::Varint(v) => Ok(*v),
		_ => Err(Error::ProtobufDecode(format!("{} is not a varint field", what))),
	}
}

fn require_string(value: &FieldValue, what: &str) -> Result<String> {
	String::from_utf8(require_bytes(value, what)?).map_err(|_| Error::ProtobufDecode(format!("{} is not valid UTF-8", what)))
}

fn parse_pubkey(bytes: &[u8]) -> Result<PublicKey> {
	PublicKey::from_slice(bytes).map_err(Error::from)
}

/// Which [messages] struct `ProtocolMessage::serialized_message` (or the
/// plaintext an [EncryptedProtocolMessage] wraps) holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
	InvoiceRequest,
	PaymentRequest,
	Payment,
	PaymentAck,
}

impl MessageType {
	fn to_i64(self) -> i64 {
		match self {
			MessageType::InvoiceRequest => 1,
			MessageType::PaymentRequest => 2,
			MessageType::Payment => 3,
			MessageType::PaymentAck => 4,
		}
	}

	fn from_i64(v: i64) -> Result<MessageType> {
		match v {
			1 => Ok(MessageType::InvoiceRequest),
			2 => Ok(MessageType::PaymentRequest),
			3 => Ok(MessageType::Payment),
			4 => Ok(MessageType::PaymentAck),
			_ => Err(Error::ProtobufDecode(format!("unknown message type {}", v))),
		}
	}
}

/// BIP70's unencrypted envelope: a tagged, versioned carrier for one of the
/// five message families plus merchant-visible status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMessage {
	pub version: u32,
	pub message_type: MessageType,
	pub serialized_message: Vec<u8>,
	pub status_code: u32,
	pub status_message: String,
	pub identifier: Vec<u8>,
	unknown: UnknownFields,
}

impl ProtocolMessage {
	pub fn new(message_type: MessageType, serialized_message: Vec<u8>) -> ProtocolMessage {
		ProtocolMessage {
			version: 1,
			message_type,
			serialized_message,
			status_code: 1,
			status_message: String::new(),
			identifier: Vec::new(),
			unknown: UnknownFields::new(),
		}
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		let mut known = Vec::new();
		if self.version != 1 {
			known.push(varint_field(1, self.version as u64));
		}
		known.push(varint_field(2, self.message_type.to_i64() as u64));
		known.push(bytes_field(3, &self.serialized_message));
		if self.status_code != 1 {
			known.push(varint_field(4, self.status_code as u64));
		}
		if !self.status_message.is_empty() {
			known.push(string_field(5, &self.status_message));
		}
		if !self.identifier.is_empty() {
			known.push(bytes_field(6, &self.identifier));
		}
		protobuf::serialize_fields(known, &self.unknown)
	}

	pub fn from_bytes(data: &[u8]) -> Result<ProtocolMessage> {
		let mut out = ProtocolMessage {
			version: 1,
			message_type: MessageType::Payment,
			serialized_message: Vec::new(),
			status_code: 1,
			status_message: String::new(),
			identifier: Vec::new(),
			unknown: UnknownFields::new(),
		};
		let mut saw_type = false;
		let mut saw_message = false;
		for field in parse_fields(data)? {
			match field.number {
				1 => out.version = require_varint(&field.value, "ProtocolMessage.version")? as u32,
				2 => {
					out.message_type = MessageType::from_i64(require_varint(&field.value, "ProtocolMessage.message_type")? as i64)?;
					saw_type = true;
				}
				3 => {
					out.serialized_message = require_bytes(&field.value, "ProtocolMessage.serialized_message")?;
					saw_message = true;
				}
				4 => out.status_code = require_varint(&field.value, "ProtocolMessage.status_code")? as u32,
				5 => out.status_message = require_string(&field.value, "ProtocolMessage.status_message")?,
				6 => out.identifier = require_bytes(&field.value, "ProtocolMessage.identifier")?,
				n => out.unknown.insert(n, field.raw),
			}
		}
		if !saw_type || !saw_message {
			return Err(Error::ProtobufDecode("ProtocolMessage missing message_type or serialized_message".into()));
		}
		Ok(out)
	}
}

/// BIP75's encrypted envelope: an (eventually) AEAD-sealed [ProtocolMessage]
/// bound to the sender/receiver key pair and a nonce that, together with
/// ECDH, derives the content-encryption key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedProtocolMessage {
	pub message_type: MessageType,
	pub message: Vec<u8>,
	pub status_code: u32,
	pub status_message: String,
	pub identifier: Vec<u8>,
	pub receiver_public_key: Option<PublicKey>,
	pub sender_public_key: Option<PublicKey>,
	pub nonce: u64,
	pub signature: Vec<u8>,
	/// Whether `status_code` was carried on the wire (or set directly on a
	/// freshly built message), as opposed to recovered as the field's
	/// absence default during a parse. Mirrors a `defaults` bitmap entry in
	/// the original implementation: a message built with [new] always
	/// counts as explicit, even if `status_code` is never touched, while one
	/// recovered with [from_bytes] is explicit only if field 3 was present.
	status_code_explicit: bool,
	unknown: UnknownFields,
}

impl EncryptedProtocolMessage {
	pub fn new(message_type: MessageType, nonce: u64) -> EncryptedProtocolMessage {
		EncryptedProtocolMessage {
			message_type,
			message: Vec::new(),
			status_code: 200,
			status_message: String::new(),
			identifier: Vec::new(),
			receiver_public_key: None,
			sender_public_key: None,
			nonce,
			signature: Vec::new(),
			status_code_explicit: true,
			unknown: UnknownFields::new(),
		}
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		let mut known = Vec::new();
		known.push(varint_field(1, self.message_type.to_i64() as u64));
		known.push(bytes_field(2, &self.message));
		if self.status_code_explicit {
			known.push(varint_field(3, self.status_code as u64));
		}
		if !self.status_message.is_empty() {
			known.push(string_field(4, &self.status_message));
		}
		if !self.identifier.is_empty() {
			known.push(bytes_field(5, &self.identifier));
		}
		if let Some(pk) = &self.receiver_public_key {
			known.push(bytes_field(6, &pk.serialize()));
		}
		if let Some(pk) = &self.sender_public_key {
			known.push(bytes_field(7, &pk.serialize()));
		}
		known.push(varint_field(8, self.nonce));
		if !self.signature.is_empty() {
			known.push(bytes_field(9, &self.signature));
		}
		protobuf::serialize_fields(known, &self.unknown)
	}

	pub fn from_bytes(data: &[u8]) -> Result<EncryptedProtocolMessage> {
		let mut out = EncryptedProtocolMessage::new(MessageType::Payment, 0);
		out.status_code_explicit = false;
		let mut saw_type = false;
		let mut saw_message = false;
		for field in parse_fields(data)? {
			match field.number {
				1 => {
					out.message_type = MessageType::from_i64(require_varint(&field.value, "EncryptedProtocolMessage.message_type")? as i64)?;
					saw_type = true;
				}
				2 => {
					out.message = require_bytes(&field.value, "EncryptedProtocolMessage.message")?;
					saw_message = true;
				}
				3 => {
					out.status_code = require_varint(&field.value, "EncryptedProtocolMessage.status_code")? as u32;
					out.status_code_explicit = true;
				}
				4 => out.status_message = require_string(&field.value, "EncryptedProtocolMessage.status_message")?,
				5 => out.identifier = require_bytes(&field.value, "EncryptedProtocolMessage.identifier")?,
				6 => out.receiver_public_key = Some(parse_pubkey(&require_bytes(&field.value, "EncryptedProtocolMessage.receiver_public_key")?)?),
				7 => out.sender_public_key = Some(parse_pubkey(&require_bytes(&field.value, "EncryptedProtocolMessage.sender_public_key")?)?),
				8 => out.nonce = require_varint(&field.value, "EncryptedProtocolMessage.nonce")?,
				9 => out.signature = require_bytes(&field.value, "EncryptedProtocolMessage.signature")?,
				n => out.unknown.insert(n, field.raw),
			}
		}
		if !saw_type || !saw_message {
			return Err(Error::ProtobufDecode("EncryptedProtocolMessage missing message_type or message".into()));
		}
		Ok(out)
	}
}

/// Temporarily blanks `signature`, serializes, and hashes according to
/// `pki_type`: `"x509+sha256"` -> SHA-256, `"x509+sha1"` -> SHA-1, anything
/// else -> an empty digest.
pub fn request_digest(req: &PaymentRequest) -> Vec<u8> {
	let mut blanked = req.clone();
	blanked.signature = Vec::new();
	let bytes = blanked.to_bytes();
	match req.pki_type.as_str() {
		"x509+sha256" => crypto::sha256(&bytes).to_vec(),
		"x509+sha1" => crypto::sha1(&bytes).to_vec(),
		_ => Vec::new(),
	}
}

/// Same scheme as [request_digest], but only `"x509+sha256"` is recognized.
pub fn invoice_request_digest(req: &InvoiceRequest) -> Vec<u8> {
	if req.pki_type != "x509+sha256" {
		return Vec::new();
	}
	let mut blanked = req.clone();
	blanked.signature = Vec::new();
	crypto::sha256(&blanked.to_bytes()).to_vec()
}

/// The peer's public key for ECDH: whichever of `receiver_public_key` /
/// `sender_public_key` does *not* byte-equal `priv_key`'s public key.
fn peer_public_key(msg: &EncryptedProtocolMessage, priv_key: &Key) -> Result<PublicKey> {
	let ours = priv_key.public_key();
	match (msg.receiver_public_key, msg.sender_public_key) {
		(Some(receiver), _) if receiver == ours => {
			msg.sender_public_key.ok_or(Error::KeyNotInMessage)
		}
		(_, Some(sender)) if sender == ours => {
			msg.receiver_public_key.ok_or(Error::KeyNotInMessage)
		}
		_ => Err(Error::KeyNotInMessage),
	}
}

/// `deriveCEK`: `seed = SHA-512(ECDH(privKey, peer))`, then an HMAC-DRBG
/// seeded with `seed` and the message's big-endian nonce yields 32 bytes of
/// CEK followed by 12 bytes of IV.
pub fn derive_cek(msg: &EncryptedProtocolMessage, priv_key: &Key) -> Result<([u8; 32], [u8; 12])> {
	let peer = peer_public_key(msg, priv_key)?;
	let secret = priv_key.secret_key().ok_or(Error::KeyNotInMessage)?;
	Ok(crypto::derive_cek_iv(&secret, &peer, msg.nonce))
}

fn associated_data(status_code: u32, status_message: &str) -> Vec<u8> {
	let mut ad = status_code.to_string().into_bytes();
	ad.extend_from_slice(status_message.as_bytes());
	ad
}

/// Seals `plaintext` into `msg.message` under a CEK/IV derived from
/// `msg.nonce` and whichever of `receiver_public_key`/`sender_public_key`
/// `priv_key` corresponds to. Associated data is `decimal(statusCode) ++
/// statusMessage`.
pub fn encrypt(msg: &mut EncryptedProtocolMessage, plaintext: &[u8], priv_key: &Key) -> Result<()> {
	let (mut cek, mut iv) = derive_cek(msg, priv_key)?;
	let ad = associated_data(msg.status_code, &msg.status_message);
	let ciphertext = crypto::aead_encrypt(&cek, &iv, plaintext, &ad)?;
	crypto::secret_wipe(&mut cek);
	crypto::secret_wipe(&mut iv);
	msg.message = ciphertext;
	Ok(())
}

/// Opens `msg.message`. Reconstructs `ad` from the status fields carried on
/// `msg` when `status_code` was present on the wire, but falls back to
/// `status_message` alone (status code digits omitted) when the field was
/// absent from the parse — this is not symmetric with [encrypt], which
/// always folds `status_code` into `ad` regardless of presence. A message
/// whose `status_code` field got stripped or never written onto the wire
/// decrypts against a different `ad` than it was sealed under.
pub fn decrypt(msg: &EncryptedProtocolMessage, priv_key: &Key) -> Result<Vec<u8>> {
	let (mut cek, mut iv) = derive_cek(msg, priv_key)?;
	let ad = if msg.status_code_explicit {
		associated_data(msg.status_code, &msg.status_message)
	} else if !msg.status_message.is_empty() {
		msg.status_message.clone().into_bytes()
	} else {
		Vec::new()
	};
	let plaintext = crypto::aead_decrypt(&cek, &iv, &msg.message, &ad);
	crypto::secret_wipe(&mut cek);
	crypto::secret_wipe(&mut iv);
	plaintext
}

/// Nulls `signature`, serializes the whole envelope, SHA-256s it, and
/// installs a DER ECDSA signature over the digest.
pub fn sign(msg: &mut EncryptedProtocolMessage, priv_key: &Key) -> Result<()> {
	msg.signature = Vec::new();
	let bytes = msg.to_bytes();
	let digest = crypto::sha256(&bytes);
	let secret = priv_key.secret_key().ok_or(Error::KeyNotInMessage)?;
	msg.signature = crypto::ecdsa_sign_der(&secret, &digest);
	Ok(())
}

/// Verifies `msg.signature` against `pub_key`, treating the signature field
/// as blanked during digesting (matching [sign]).
pub fn verify(msg: &EncryptedProtocolMessage, pub_key: &PublicKey) -> bool {
	let mut unsigned = msg.clone();
	let sig = std::mem::take(&mut unsigned.signature);
	let digest = crypto::sha256(&unsigned.to_bytes());
	crypto::ecdsa_verify_der(pub_key, &digest, &sig)
}
