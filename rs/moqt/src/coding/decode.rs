use std::string::FromUtf8Error;
use thiserror::Error;

/// Read a value from the buffer.
///
/// If [DecodeError::Short] is returned, the caller should try again with more data.
pub trait Decode: Sized {
	/// Decode the value from the given buffer.
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError>;
}

/// A decode error.
#[derive(Error, Debug, Clone)]
pub enum DecodeError {
	#[error("short buffer")]
	Short,

	#[error("long buffer")]
	Long,

	#[error("invalid string")]
	InvalidString(#[from] FromUtf8Error),

	#[error("unknown message: {0:?}")]
	UnknownMessage(u64),

	#[error("invalid value")]
	InvalidValue,

	#[error("invalid path")]
	InvalidPath,

	#[error("too many")]
	TooMany,

	#[error("expected end")]
	ExpectedEnd,

	#[error("duplicate")]
	Duplicate,
}

impl Decode for bool {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		match u8::decode(buf)? {
			0 => Ok(false),
			1 => Ok(true),
			_ => Err(DecodeError::InvalidValue),
		}
	}
}

impl Decode for u8 {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		match buf.has_remaining() {
			true => Ok(buf.get_u8()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for u64 {
	/// Decode a QUIC variable-length integer; 1/2/4/8 bytes selected by the top two bits.
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		if !buf.has_remaining() {
			return Err(DecodeError::Short);
		}

		let first = buf.get_u8();
		let size = 1usize << (first >> 6);
		let mut value = (first & 0b0011_1111) as u64;

		if buf.remaining() < size - 1 {
			return Err(DecodeError::Short);
		}

		for _ in 1..size {
			value = (value << 8) | buf.get_u8() as u64;
		}

		Ok(value)
	}
}

impl Decode for usize {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let value = u64::decode(buf)?;
		value.try_into().map_err(|_| DecodeError::InvalidValue)
	}
}

impl Decode for String {
	/// Decode a string with a varint length prefix.
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let v = Vec::<u8>::decode(buf)?;
		let str = String::from_utf8(v)?;

		Ok(str)
	}
}

impl Decode for Vec<u8> {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let size = usize::decode(buf)?;

		if buf.remaining() < size {
			return Err(DecodeError::Short);
		}

		let bytes = buf.copy_to_bytes(size);
		Ok(bytes.to_vec())
	}
}

impl Decode for bytes::Bytes {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let size = usize::decode(buf)?;
		if buf.remaining() < size {
			return Err(DecodeError::Short);
		}

		Ok(buf.copy_to_bytes(size))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn decode_u64(bytes: &[u8]) -> Result<u64, DecodeError> {
		let mut buf = bytes::Bytes::copy_from_slice(bytes);
		u64::decode(&mut buf)
	}

	#[test]
	fn varint_forms() {
		assert_eq!(decode_u64(&[0x25]).unwrap(), 37);
		assert_eq!(decode_u64(&[0x7b, 0xbd]).unwrap(), 15293);
		assert_eq!(decode_u64(&[0x9d, 0x7f, 0x3e, 0x7d]).unwrap(), 494_878_333);
		assert_eq!(
			decode_u64(&[0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c]).unwrap(),
			151_288_809_941_952_652
		);
	}

	#[test]
	fn varint_short() {
		assert!(matches!(decode_u64(&[]), Err(DecodeError::Short)));
		assert!(matches!(decode_u64(&[0x7b]), Err(DecodeError::Short)));
		assert!(matches!(decode_u64(&[0xc2, 0x19]), Err(DecodeError::Short)));
	}

	#[test]
	fn string_short() {
		let mut buf = bytes::Bytes::copy_from_slice(&[0x05, b'a', b'b']);
		assert!(matches!(String::decode(&mut buf), Err(DecodeError::Short)));
	}
}
