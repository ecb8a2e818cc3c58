use crate::coding::{Decode, DecodeError, Encode};
use crate::message::{Message, Parameters};
use crate::{BroadcastPath, GroupSequence, TrackPriority};

/// Sent by the subscriber to request a single group, one-shot.
///
/// Unlike a subscription, a fetch names exactly one group and receives no
/// updates; the publisher responds with one group stream or an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fetch {
	pub subscribe_id: u64,
	pub broadcast_path: BroadcastPath,
	pub track_name: String,
	pub priority: TrackPriority,
	pub sequence: GroupSequence,
	pub parameters: Parameters,
}

impl Message for Fetch {
	const TYPE: u64 = 0x40;

	fn encode_payload<W: bytes::BufMut>(&self, w: &mut W) {
		self.subscribe_id.encode(w);
		self.broadcast_path.encode(w);
		self.track_name.encode(w);
		self.priority.encode(w);
		self.sequence.encode(w);
		self.parameters.encode(w);
	}

	fn decode_payload<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self {
			subscribe_id: u64::decode(buf)?,
			broadcast_path: BroadcastPath::decode(buf)?,
			track_name: String::decode(buf)?,
			priority: u8::decode(buf)?,
			sequence: GroupSequence::decode(buf)?,
			parameters: Parameters::decode(buf)?,
		})
	}
}

/// Reprioritize an in-flight fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchUpdate {
	pub priority: TrackPriority,
}

impl Message for FetchUpdate {
	const TYPE: u64 = 0x41;

	fn encode_payload<W: bytes::BufMut>(&self, w: &mut W) {
		self.priority.encode(w);
	}

	fn decode_payload<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		Ok(Self {
			priority: u8::decode(buf)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::tests::{decode_message, encode_message};

	#[test]
	fn fetch_round_trip() {
		let msg = Fetch {
			subscribe_id: 3,
			broadcast_path: BroadcastPath::new("/room/alice"),
			track_name: "camera".to_string(),
			priority: 200,
			sequence: GroupSequence(17),
			parameters: Parameters::default(),
		};

		let decoded: Fetch = decode_message(&encode_message(&msg)).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn fetch_update_round_trip() {
		let msg = FetchUpdate { priority: 5 };
		let decoded: FetchUpdate = decode_message(&encode_message(&msg)).unwrap();
		assert_eq!(decoded, msg);
	}
}
