use std::collections::HashMap;

use bytes::Bytes;

use crate::coding::{Decode, DecodeError, Encode};
use crate::ParameterError;

/// A typed key/value map carried by setup, announce, subscribe and info messages.
///
/// Values are stored as opaque byte strings; callers decode with an expected
/// type and fail with [ParameterError::TypeMismatch] when the bytes disagree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Parameters(HashMap<u64, Bytes>);

impl Parameters {
	/// The session path; mandatory on raw-QUIC sessions.
	pub const PATH: u64 = 0x01;
	pub const MAX_SUBSCRIBE_ID: u64 = 0x02;
	pub const AUTHORIZATION_INFO: u64 = 0x03;
	/// Delivery timeout in milliseconds.
	pub const DELIVERY_TIMEOUT: u64 = 0x04;
	/// Maximum cache duration in milliseconds.
	pub const MAX_CACHE_DURATION: u64 = 0x05;

	pub fn set_bytes(&mut self, key: u64, value: Bytes) {
		self.0.insert(key, value);
	}

	pub fn set_string<T: AsRef<str>>(&mut self, key: u64, value: T) {
		self.0.insert(key, Bytes::copy_from_slice(value.as_ref().as_bytes()));
	}

	pub fn set_uint(&mut self, key: u64, value: u64) {
		self.0.insert(key, value.encode_bytes());
	}

	pub fn set_bool(&mut self, key: u64, value: bool) {
		self.0.insert(key, value.encode_bytes());
	}

	pub fn get_bytes(&self, key: u64) -> Result<Bytes, ParameterError> {
		self.0.get(&key).cloned().ok_or(ParameterError::NotFound)
	}

	pub fn get_string(&self, key: u64) -> Result<String, ParameterError> {
		let bytes = self.get_bytes(key)?;
		String::from_utf8(bytes.to_vec()).map_err(|_| ParameterError::TypeMismatch)
	}

	pub fn get_uint(&self, key: u64) -> Result<u64, ParameterError> {
		let mut bytes = self.get_bytes(key)?;
		let value = u64::decode(&mut bytes).map_err(|_| ParameterError::TypeMismatch)?;
		if !bytes.is_empty() {
			return Err(ParameterError::TypeMismatch);
		}
		Ok(value)
	}

	pub fn get_bool(&self, key: u64) -> Result<bool, ParameterError> {
		let mut bytes = self.get_bytes(key)?;
		let value = bool::decode(&mut bytes).map_err(|_| ParameterError::TypeMismatch)?;
		if !bytes.is_empty() {
			return Err(ParameterError::TypeMismatch);
		}
		Ok(value)
	}

	pub fn contains(&self, key: u64) -> bool {
		self.0.contains_key(&key)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl Decode for Parameters {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let count = u64::decode(buf)?;
		if count > 1024 {
			return Err(DecodeError::TooMany);
		}

		let mut params = HashMap::with_capacity(count as usize);
		for _ in 0..count {
			let key = u64::decode(buf)?;
			let value = Bytes::decode(buf)?;
			if params.insert(key, value).is_some() {
				return Err(DecodeError::Duplicate);
			}
		}

		Ok(Self(params))
	}
}

impl Encode for Parameters {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.0.len().encode(w);

		// Sorted so the encoding is canonical; peers cannot observe map order.
		let mut keys: Vec<_> = self.0.keys().copied().collect();
		keys.sort_unstable();

		for key in keys {
			key.encode(w);
			self.0[&key].encode(w);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn typed_round_trip() {
		let mut params = Parameters::default();
		params.set_string(Parameters::PATH, "/relay");
		params.set_uint(Parameters::MAX_SUBSCRIBE_ID, 1024);
		params.set_bool(0x42, true);
		params.set_bytes(0x43, Bytes::from_static(b"\x00\x01"));

		let encoded = params.encode_bytes();
		let mut read = encoded.clone();
		let decoded = Parameters::decode(&mut read).unwrap();

		assert_eq!(decoded, params);
		assert_eq!(decoded.get_string(Parameters::PATH).unwrap(), "/relay");
		assert_eq!(decoded.get_uint(Parameters::MAX_SUBSCRIBE_ID).unwrap(), 1024);
		assert!(decoded.get_bool(0x42).unwrap());
		assert_eq!(decoded.get_bytes(0x43).unwrap(), Bytes::from_static(b"\x00\x01"));
	}

	#[test]
	fn missing_and_mismatched() {
		let mut params = Parameters::default();
		params.set_string(Parameters::PATH, "/relay");

		assert_eq!(params.get_uint(0x99), Err(ParameterError::NotFound));
		// "/relay" is not a valid varint encoding once fully consumed.
		assert_eq!(params.get_uint(Parameters::PATH), Err(ParameterError::TypeMismatch));
	}

	#[test]
	fn canonical_encoding() {
		let mut a = Parameters::default();
		a.set_uint(3, 7);
		a.set_uint(1, 5);

		let mut b = Parameters::default();
		b.set_uint(1, 5);
		b.set_uint(3, 7);

		assert_eq!(a.encode_bytes(), b.encode_bytes());
	}

	#[test]
	fn duplicate_keys_rejected() {
		let mut buf = bytes::BytesMut::new();
		2u64.encode(&mut buf);
		1u64.encode(&mut buf);
		Bytes::from_static(b"a").encode(&mut buf);
		1u64.encode(&mut buf);
		Bytes::from_static(b"b").encode(&mut buf);

		let mut read = buf.freeze();
		assert!(matches!(Parameters::decode(&mut read), Err(DecodeError::Duplicate)));
	}
}
