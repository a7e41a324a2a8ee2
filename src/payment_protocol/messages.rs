//! BIP70/BIP75 message types: field layouts, parsing and serialization.

use super::protobuf::{bytes_field, message_field, parse_fields, string_field, varint_field, FieldValue, UnknownFields};
use crate::error::{Error, Result};

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

/// `Output`: an amount and the scriptPubkey that pays it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Output {
	pub amount: u64,
	pub script: Vec<u8>,
	unknown: UnknownFields,
}

impl Output {
	pub fn new(amount: u64, script: Vec<u8>) -> Output {
		Output {
			amount,
			script,
			unknown: UnknownFields::new(),
		}
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		let mut known = Vec::new();
		if self.amount != 0 {
			known.push(varint_field(1, self.amount));
		}
		known.push(bytes_field(2, &self.script));
		super::protobuf::serialize_fields(known, &self.unknown)
	}

	pub fn from_bytes(data: &[u8]) -> Result<Output> {
		let mut out = Output::default();
		for field in parse_fields(data)? {
			match field.number {
				1 => out.amount = require_varint(&field.value, "Output.amount")?,
				2 => out.script = require_bytes(&field.value, "Output.script")?,
				n => out.unknown.insert(n, field.raw),
			}
		}
		Ok(out)
	}
}

/// `Details`: the payee's requested outputs plus memo/expiry metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Details {
	pub network: String,
	pub outputs: Vec<Output>,
	pub time: u64,
	pub expires: u64,
	pub memo: String,
	pub payment_url: String,
	pub merchant_data: Vec<u8>,
	unknown: UnknownFields,
}

impl Details {
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut known = Vec::new();
		if !self.network.is_empty() {
			known.push(string_field(1, &self.network));
		}
		for output in &self.outputs {
			known.push(message_field(2, &output.to_bytes()));
		}
		known.push(varint_field(3, self.time));
		if self.expires != 0 {
			known.push(varint_field(4, self.expires));
		}
		if !self.memo.is_empty() {
			known.push(string_field(5, &self.memo));
		}
		if !self.payment_url.is_empty() {
			known.push(string_field(6, &self.payment_url));
		}
		if !self.merchant_data.is_empty() {
			known.push(bytes_field(7, &self.merchant_data));
		}
		super::protobuf::serialize_fields(known, &self.unknown)
	}

	pub fn from_bytes(data: &[u8]) -> Result<Details> {
		let mut out = Details::default();
		for field in parse_fields(data)? {
			match field.number {
				1 => out.network = require_string(&field.value, "Details.network")?,
				2 => out.outputs.push(Output::from_bytes(&require_bytes(&field.value, "Details.outputs")?)?),
				3 => out.time = require_varint(&field.value, "Details.time")?,
				4 => out.expires = require_varint(&field.value, "Details.expires")?,
				5 => out.memo = require_string(&field.value, "Details.memo")?,
				6 => out.payment_url = require_string(&field.value, "Details.payment_url")?,
				7 => out.merchant_data = require_bytes(&field.value, "Details.merchant_data")?,
				n => out.unknown.insert(n, field.raw),
			}
		}
		Ok(out)
	}
}

/// `PaymentRequest`: the signed envelope a payee hands a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
	pub payment_details_version: u32,
	pub pki_type: String,
	pub pki_data: Vec<u8>,
	pub serialized_payment_details: Vec<u8>,
	pub signature: Vec<u8>,
	unknown: UnknownFields,
}

impl Default for PaymentRequest {
	fn default() -> PaymentRequest {
		PaymentRequest {
			payment_details_version: 1,
			pki_type: "none".to_string(),
			pki_data: Vec::new(),
			serialized_payment_details: Vec::new(),
			signature: Vec::new(),
			unknown: UnknownFields::new(),
		}
	}
}

impl PaymentRequest {
	/// Serializes the message with `signature` set to whatever it currently
	/// holds (used as-is for transmission; `sign`/`verify` special-case a
	/// transiently blanked signature for digesting).
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut known = Vec::new();
		if self.payment_details_version != 1 {
			known.push(varint_field(1, self.payment_details_version as u64));
		}
		if self.pki_type != "none" {
			known.push(string_field(2, &self.pki_type));
		}
		if !self.pki_data.is_empty() {
			known.push(bytes_field(3, &self.pki_data));
		}
		known.push(bytes_field(4, &self.serialized_payment_details));
		if !self.signature.is_empty() {
			known.push(bytes_field(5, &self.signature));
		}
		super::protobuf::serialize_fields(known, &self.unknown)
	}

	pub fn from_bytes(data: &[u8]) -> Result<PaymentRequest> {
		let mut out = PaymentRequest::default();
		let mut saw_details = false;
		for field in parse_fields(data)? {
			match field.number {
				1 => out.payment_details_version = require_varint(&field.value, "PaymentRequest.payment_details_version")? as u32,
				2 => out.pki_type = require_string(&field.value, "PaymentRequest.pki_type")?,
				3 => out.pki_data = require_bytes(&field.value, "PaymentRequest.pki_data")?,
				4 => {
					out.serialized_payment_details = require_bytes(&field.value, "PaymentRequest.serialized_payment_details")?;
					saw_details = true;
				}
				5 => out.signature = require_bytes(&field.value, "PaymentRequest.signature")?,
				n => out.unknown.insert(n, field.raw),
			}
		}
		if !saw_details {
			return Err(Error::ProtobufDecode("PaymentRequest missing serialized_payment_details".into()));
		}
		Ok(out)
	}
}

/// `Payment`: the wallet's response, carrying signed transactions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payment {
	pub merchant_data: Vec<u8>,
	pub transactions: Vec<Vec<u8>>,
	pub refund_to: Vec<Output>,
	pub memo: String,
	unknown: UnknownFields,
}

impl Payment {
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut known = Vec::new();
		if !self.merchant_data.is_empty() {
			known.push(bytes_field(1, &self.merchant_data));
		}
		for tx in &self.transactions {
			known.push(bytes_field(2, tx));
		}
		for output in &self.refund_to {
			known.push(message_field(3, &output.to_bytes()));
		}
		if !self.memo.is_empty() {
			known.push(string_field(4, &self.memo));
		}
		super::protobuf::serialize_fields(known, &self.unknown)
	}

	pub fn from_bytes(data: &[u8]) -> Result<Payment> {
		let mut out = Payment::default();
		for field in parse_fields(data)? {
			match field.number {
				1 => out.merchant_data = require_bytes(&field.value, "Payment.merchant_data")?,
				2 => out.transactions.push(require_bytes(&field.value, "Payment.transactions")?),
				3 => out.refund_to.push(Output::from_bytes(&require_bytes(&field.value, "Payment.refund_to")?)?),
				4 => out.memo = require_string(&field.value, "Payment.memo")?,
				n => out.unknown.insert(n, field.raw),
			}
		}
		Ok(out)
	}
}

/// `PaymentACK`: the payee's acknowledgement of a received [Payment].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentACK {
	pub payment: Payment,
	pub memo: String,
	unknown: UnknownFields,
}

impl PaymentACK {
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut known = vec![message_field(1, &self.payment.to_bytes())];
		if !self.memo.is_empty() {
			known.push(string_field(2, &self.memo));
		}
		super::protobuf::serialize_fields(known, &self.unknown)
	}

	pub fn from_bytes(data: &[u8]) -> Result<PaymentACK> {
		let mut payment = None;
		let mut memo = String::new();
		let mut unknown = UnknownFields::new();
		for field in parse_fields(data)? {
			match field.number {
				1 => payment = Some(Payment::from_bytes(&require_bytes(&field.value, "PaymentACK.payment")?)?),
				2 => memo = require_string(&field.value, "PaymentACK.memo")?,
				n => unknown.insert(n, field.raw),
			}
		}
		Ok(PaymentACK {
			payment: payment.ok_or_else(|| Error::ProtobufDecode("PaymentACK missing payment".into()))?,
			memo,
			unknown,
		})
	}
}

/// `InvoiceRequest` (BIP75): a payer's request for a signed payment request
/// tied to their own public key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvoiceRequest {
	pub sender_public_key: Vec<u8>,
	pub amount: u64,
	pub pki_type: String,
	pub pki_data: Vec<u8>,
	pub memo: String,
	pub notification_url: String,
	pub signature: Vec<u8>,
	unknown: UnknownFields,
}

impl InvoiceRequest {
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut known = vec![bytes_field(1, &self.sender_public_key)];
		if self.amount != 0 {
			known.push(varint_field(2, self.amount));
		}
		let pki_type = if self.pki_type.is_empty() { "none" } else { &self.pki_type };
		if pki_type != "none" {
			known.push(string_field(3, pki_type));
		}
		if !self.pki_data.is_empty() {
			known.push(bytes_field(4, &self.pki_data));
		}
		if !self.memo.is_empty() {
			known.push(string_field(5, &self.memo));
		}
		if !self.notification_url.is_empty() {
			known.push(string_field(6, &self.notification_url));
		}
		if !self.signature.is_empty() {
			known.push(bytes_field(7, &self.signature));
		}
		super::protobuf::serialize_fields(known, &self.unknown)
	}

	pub fn from_bytes(data: &[u8]) -> Result<InvoiceRequest> {
		let mut out = InvoiceRequest {
			pki_type: "none".to_string(),
			..InvoiceRequest::default()
		};
		let mut saw_key = false;
		for field in parse_fields(data)? {
			match field.number {
				1 => {
					out.sender_public_key = require_bytes(&field.value, "InvoiceRequest.sender_public_key")?;
					saw_key = true;
				}
				2 => out.amount = require_varint(&field.value, "InvoiceRequest.amount")?,
				3 => out.pki_type = require_string(&field.value, "InvoiceRequest.pki_type")?,
				4 => out.pki_data = require_bytes(&field.value, "InvoiceRequest.pki_data")?,
				5 => out.memo = require_string(&field.value, "InvoiceRequest.memo")?,
				6 => out.notification_url = require_string(&field.value, "InvoiceRequest.notification_url")?,
				7 => out.signature = require_bytes(&field.value, "InvoiceRequest.signature")?,
				n => out.unknown.insert(n, field.raw),
			}
		}
		if !saw_key {
			return Err(Error::ProtobufDecode("InvoiceRequest missing sender_public_key".into()));
		}
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn output_round_trips() {
		let o = Output::new(1_000, vec![0xab; 20]);
		let parsed = Output::from_bytes(&o.to_bytes()).unwrap();
		assert_eq!(o, parsed);
	}

	#[test]
	fn details_round_trips_with_nested_outputs() {
		let mut d = Details {
			network: "main".to_string(),
			time: 12345,
			memo: "thanks".to_string(),
			..Details::default()
		};
		d.outputs.push(Output::new(500_000, vec![1, 2, 3]));
		let parsed = Details::from_bytes(&d.to_bytes()).unwrap();
		assert_eq!(d, parsed);
	}

	#[test]
	fn payment_request_round_trips_and_preserves_unknown_field() {
		let details = Details {
			network: "main".to_string(),
			time: 1,
			..Details::default()
		};
		let mut req = PaymentRequest {
			pki_type: "x509+sha256".to_string(),
			serialized_payment_details: details.to_bytes(),
			..PaymentRequest::default()
		};
		req.unknown.insert(999, varint_field(999, 42).1);

		let bytes1 = req.to_bytes();
		let parsed = PaymentRequest::from_bytes(&bytes1).unwrap();
		let bytes2 = parsed.to_bytes();
		assert_eq!(bytes1, bytes2);
		assert_eq!(req, parsed);
	}

	#[test]
	fn payment_request_requires_serialized_details() {
		let bytes = string_field(2, "x509+sha256").1;
		assert!(PaymentRequest::from_bytes(&bytes).is_err());
	}
}
