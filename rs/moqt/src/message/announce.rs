use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding::{Decode, DecodeError, Encode};
use crate::message::{Message, Parameters};

/// Sent by the subscriber to request the announcement feed for a pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnouncePlease {
	/// The glob pattern; announced paths are sent as suffixes relative to its literal prefix.
	pub prefix: String,
	pub parameters: Parameters,
}

impl Message for AnnouncePlease {
	const TYPE: u64 = 0x10;

	fn encode_payload<W: bytes::BufMut>(&self, w: &mut W) {
		self.prefix.encode(w);
		self.parameters.encode(w);
	}

	fn decode_payload<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self {
			prefix: String::decode(buf)?,
			parameters: Parameters::decode(buf)?,
		})
	}
}

/// The status of an announced path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AnnounceStatus {
	Ended = 0x00,
	Active = 0x01,
	/// A one-shot marker: the initial snapshot is complete, live deltas follow.
	Live = 0x02,
}

impl Decode for AnnounceStatus {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		u8::decode(buf)?.try_into().map_err(|_| DecodeError::InvalidValue)
	}
}

impl Encode for AnnounceStatus {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		u8::from(*self).encode(w);
	}
}

/// Sent by the publisher: one delta of the announcement feed.
///
/// The suffix is relative to the [AnnouncePlease] prefix; it is empty for [AnnounceStatus::Live].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announce {
	pub status: AnnounceStatus,
	pub suffix: String,
	pub parameters: Parameters,
}

impl Announce {
	pub fn live() -> Self {
		Self {
			status: AnnounceStatus::Live,
			suffix: String::new(),
			parameters: Parameters::default(),
		}
	}
}

impl Message for Announce {
	const TYPE: u64 = 0x11;

	fn encode_payload<W: bytes::BufMut>(&self, w: &mut W) {
		self.status.encode(w);
		self.suffix.encode(w);
		self.parameters.encode(w);
	}

	fn decode_payload<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self {
			status: AnnounceStatus::decode(buf)?,
			suffix: String::decode(buf)?,
			parameters: Parameters::decode(buf)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::tests::{decode_message, encode_message};

	#[test]
	fn announce_please_round_trip() {
		let msg = AnnouncePlease {
			prefix: "/room/**".to_string(),
			parameters: Parameters::default(),
		};

		let encoded = encode_message(&msg);
		let decoded: AnnouncePlease = decode_message(&encoded).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn announce_round_trip() {
		for status in [AnnounceStatus::Active, AnnounceStatus::Ended] {
			let msg = Announce {
				status,
				suffix: "/alice/camera".to_string(),
				parameters: Parameters::default(),
			};

			let encoded = encode_message(&msg);
			let decoded: Announce = decode_message(&encoded).unwrap();
			assert_eq!(decoded, msg);
		}

		let live = Announce::live();
		let decoded: Announce = decode_message(&encode_message(&live)).unwrap();
		assert_eq!(decoded.status, AnnounceStatus::Live);
		assert!(decoded.suffix.is_empty());
	}

	#[test]
	fn announce_rejects_invalid_status() {
		// type, length, then an invalid status byte.
		let encoded = [0x11, 0x03, 0x07, 0x00, 0x00];
		let result: Result<Announce, _> = decode_message(&encoded);
		assert!(matches!(result, Err(DecodeError::InvalidValue)));
	}
}
