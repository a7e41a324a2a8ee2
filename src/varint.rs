//! Bitcoin-style CompactSize varint codec, used by the bloom filter's
//! length-prefixed byte array. Not to be confused with the payment
//! protocol's protobuf varints, which use LEB128 (see
//! `payment_protocol::protobuf`).

pub fn encode(n: u64) -> Vec<u8> {
	let mut out = Vec::new();
	if n < 0xfd {
		out.push(n as u8);
	} else if n <= 0xffff {
		out.push(0xfd);
		out.extend_from_slice(&(n as u16).to_le_bytes());
	} else if n <= 0xffff_ffff {
		out.push(0xfe);
		out.extend_from_slice(&(n as u32).to_le_bytes());
	} else {
		out.push(0xff);
		out.extend_from_slice(&n.to_le_bytes());
	}
	out
}

/// Decodes a CompactSize at the start of `data`, returning the value and the
/// number of bytes consumed.
pub fn decode(data: &[u8]) -> Option<(u64, usize)> {
	let first = *data.first()?;
	match first {
		0..=0xfc => Some((first as u64, 1)),
		0xfd => {
			let b = data.get(1..3)?;
			Some((u16::from_le_bytes(b.try_into().ok()?) as u64, 3))
		}
		0xfe => {
			let b = data.get(1..5)?;
			Some((u32::from_le_bytes(b.try_into().ok()?) as u64, 5))
		}
		0xff => {
			let b = data.get(1..9)?;
			Some((u64::from_le_bytes(b.try_into().ok()?), 9))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_across_size_boundaries() {
		for n in [0u64, 1, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, 0x1_0000_0000] {
			let encoded = encode(n);
			let (decoded, used) = decode(&encoded).unwrap();
			assert_eq!(decoded, n);
			assert_eq!(used, encoded.len());
		}
	}
}
