//! A handwritten protobuf subset: only the VARINT, 64BIT, LENDELIM and
//! 32BIT wire types, which is all BIP70/75 messages use.
//!
//! Messages built on this module keep every unrecognized field's raw wire
//! bytes around (sorted by field number) instead of dropping them, so that
//! `parse(serialize(m)) == m` byte-for-byte even across fields a newer
//! protocol version added that this crate doesn't know about. A generic
//! protobuf library would silently discard those; this one doesn't.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
	Varint,
	Fixed64,
	LengthDelimited,
	Fixed32,
}

impl WireType {
	fn from_tag(tag: u64) -> Result<WireType> {
		match tag {
			0 => Ok(WireType::Varint),
			1 => Ok(WireType::Fixed64),
			2 => Ok(WireType::LengthDelimited),
			5 => Ok(WireType::Fixed32),
			_ => Err(Error::ProtobufDecode(format!("unsupported wire type {}", tag))),
		}
	}

	fn tag(self) -> u64 {
		match self {
			WireType::Varint => 0,
			WireType::Fixed64 => 1,
			WireType::LengthDelimited => 2,
			WireType::Fixed32 => 5,
		}
	}
}

pub fn encode_varint(mut v: u64) -> Vec<u8> {
	let mut out = Vec::with_capacity(4);
	loop {
		let byte = (v & 0x7f) as u8;
		v >>= 7;
		if v == 0 {
			out.push(byte);
			break;
		}
		out.push(byte | 0x80);
	}
	out
}

pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
	let mut value = 0u64;
	let mut shift = 0u32;
	for (i, &byte) in data.iter().enumerate() {
		if shift >= 64 {
			return Err(Error::ProtobufDecode("varint too long".into()));
		}
		value |= ((byte & 0x7f) as u64) << shift;
		if byte & 0x80 == 0 {
			return Ok((value, i + 1));
		}
		shift += 7;
	}
	Err(Error::ProtobufDecode("truncated varint".into()))
}

fn encode_key(field: u32, wire: WireType) -> Vec<u8> {
	encode_varint(((field as u64) << 3) | wire.tag())
}

/// One wire-format field as decoded from a byte stream: its field number,
/// typed value, and the exact raw bytes (key + value) it occupied, so an
/// unrecognized field can be replayed verbatim.
#[derive(Debug, Clone)]
pub struct Field {
	pub number: u32,
	pub value: FieldValue,
	pub raw: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum FieldValue {
	Varint(u64),
	Fixed64([u8; 8]),
	Bytes(Vec<u8>),
	Fixed32([u8; 4]),
}

/// Walks `data` yielding every field in wire order.
pub fn parse_fields(data: &[u8]) -> Result<Vec<Field>> {
	let mut fields = Vec::new();
	let mut pos = 0;
	while pos < data.len() {
		let start = pos;
		let (key, used) = decode_varint(&data[pos..])?;
		pos += used;
		let number = (key >> 3) as u32;
		let wire = WireType::from_tag(key & 0x7)?;

		let value = match wire {
			WireType::Varint => {
				let (v, used) = decode_varint(&data[pos..])?;
				pos += used;
				FieldValue::Varint(v)
			}
			WireType::Fixed64 => {
				let bytes: [u8; 8] = data
					.get(pos..pos + 8)
					.ok_or_else(|| Error::ProtobufDecode("truncated fixed64".into()))?
					.try_into()
					.unwrap();
				pos += 8;
				FieldValue::Fixed64(bytes)
			}
			WireType::Fixed32 => {
				let bytes: [u8; 4] = data
					.get(pos..pos + 4)
					.ok_or_else(|| Error::ProtobufDecode("truncated fixed32".into()))?
					.try_into()
					.unwrap();
				pos += 4;
				FieldValue::Fixed32(bytes)
			}
			WireType::LengthDelimited => {
				let (len, used) = decode_varint(&data[pos..])?;
				pos += used;
				let len = len as usize;
				let bytes = data
					.get(pos..pos + len)
					.ok_or_else(|| Error::ProtobufDecode("truncated length-delimited field".into()))?
					.to_vec();
				pos += len;
				FieldValue::Bytes(bytes)
			}
		};

		fields.push(Field {
			number,
			value,
			raw: data[start..pos].to_vec(),
		});
	}
	Ok(fields)
}

pub fn varint_field(field: u32, v: u64) -> (u32, Vec<u8>) {
	let mut out = encode_key(field, WireType::Varint);
	out.extend(encode_varint(v));
	(field, out)
}

pub fn bytes_field(field: u32, data: &[u8]) -> (u32, Vec<u8>) {
	let mut out = encode_key(field, WireType::LengthDelimited);
	out.extend(encode_varint(data.len() as u64));
	out.extend_from_slice(data);
	(field, out)
}

pub fn string_field(field: u32, s: &str) -> (u32, Vec<u8>) {
	bytes_field(field, s.as_bytes())
}

pub fn message_field(field: u32, encoded: &[u8]) -> (u32, Vec<u8>) {
	bytes_field(field, encoded)
}

/// A sorted-by-field-number collection of fields a message type doesn't
/// recognize, kept as raw bytes so it can be replayed unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownFields(Vec<(u32, Vec<u8>)>);

impl UnknownFields {
	pub fn new() -> UnknownFields {
		UnknownFields(Vec::new())
	}

	pub fn insert(&mut self, field: u32, raw: Vec<u8>) {
		let pos = self.0.partition_point(|(f, _)| *f < field);
		self.0.insert(pos, (field, raw));
	}

	fn entries(&self) -> impl Iterator<Item = &(u32, Vec<u8>)> {
		self.0.iter()
	}
}

/// Merges `known` (already-encoded `(field, bytes)` pairs for recognized,
/// non-default fields) with `unknown`, producing the final wire bytes in
/// ascending field-number order.
pub fn serialize_fields(mut known: Vec<(u32, Vec<u8>)>, unknown: &UnknownFields) -> Vec<u8> {
	known.extend(unknown.entries().cloned());
	known.sort_by_key(|(field, _)| *field);
	known.into_iter().flat_map(|(_, bytes)| bytes).collect()
}
