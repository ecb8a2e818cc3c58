use std::fmt;

use crate::coding::{Decode, DecodeError, Encode};
use crate::message::{Message, Parameters};

/// An opaque protocol version identifier negotiated during setup.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub u32);

impl Version {
	/// The only version this crate speaks, pending a published draft.
	pub const DEVELOP: Self = Self(0xff00_0001);
}

impl fmt::Debug for Version {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{:08x}", self.0)
	}
}

impl Decode for Version {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let v = u64::decode(buf)?;
		let v = u32::try_from(v).map_err(|_| DecodeError::InvalidValue)?;
		Ok(Self(v))
	}
}

impl Encode for Version {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		(self.0 as u64).encode(w);
	}
}

/// A list of versions in preferred order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Versions(pub Vec<Version>);

impl Versions {
	pub fn contains(&self, version: &Version) -> bool {
		self.0.contains(version)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Version> {
		self.0.iter()
	}
}

impl Decode for Versions {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let count = u64::decode(buf)?;
		if count > 64 {
			return Err(DecodeError::TooMany);
		}

		let mut versions = Vec::with_capacity(count as usize);
		for _ in 0..count {
			versions.push(Version::decode(buf)?);
		}
		Ok(Self(versions))
	}
}

impl Encode for Versions {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.0.len().encode(w);
		for version in &self.0 {
			version.encode(w);
		}
	}
}

impl<const N: usize> From<[Version; N]> for Versions {
	fn from(versions: [Version; N]) -> Self {
		Self(versions.to_vec())
	}
}

/// Sent by the session initiator: the versions it supports and its parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionClient {
	pub versions: Versions,
	pub parameters: Parameters,
}

impl Message for SessionClient {
	const TYPE: u64 = 0x00;

	fn encode_payload<W: bytes::BufMut>(&self, w: &mut W) {
		self.versions.encode(w);
		self.parameters.encode(w);
	}

	fn decode_payload<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self {
			versions: Versions::decode(buf)?,
			parameters: Parameters::decode(buf)?,
		})
	}
}

/// Sent by the session responder: the selected version and its parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionServer {
	pub version: Version,
	pub parameters: Parameters,
}

impl Message for SessionServer {
	const TYPE: u64 = 0x01;

	fn encode_payload<W: bytes::BufMut>(&self, w: &mut W) {
		self.version.encode(w);
		self.parameters.encode(w);
	}

	fn decode_payload<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self {
			version: Version::decode(buf)?,
			parameters: Parameters::decode(buf)?,
		})
	}
}

/// Advisory flow information, sent by either side at any time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionUpdate {
	pub bitrate: u64,
}

impl Message for SessionUpdate {
	const TYPE: u64 = 0x02;

	fn encode_payload<W: bytes::BufMut>(&self, w: &mut W) {
		self.bitrate.encode(w);
	}

	fn decode_payload<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self {
			bitrate: u64::decode(buf)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::tests::{decode_message, encode_message};

	#[test]
	fn session_client_round_trip() {
		let mut parameters = Parameters::default();
		parameters.set_string(Parameters::PATH, "/relay");

		let msg = SessionClient {
			versions: [Version::DEVELOP].into(),
			parameters,
		};

		let encoded = encode_message(&msg);
		let decoded: SessionClient = decode_message(&encoded).unwrap();

		assert_eq!(decoded, msg);
		assert!(decoded.versions.contains(&Version::DEVELOP));
	}

	#[test]
	fn session_server_round_trip() {
		let msg = SessionServer {
			version: Version::DEVELOP,
			parameters: Parameters::default(),
		};

		let encoded = encode_message(&msg);
		let decoded: SessionServer = decode_message(&encoded).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn session_update_round_trip() {
		let msg = SessionUpdate { bitrate: 2_500_000 };
		let encoded = encode_message(&msg);
		let decoded: SessionUpdate = decode_message(&encoded).unwrap();
		assert_eq!(decoded, msg);
	}
}
